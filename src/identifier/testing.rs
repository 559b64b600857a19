//! In-memory collaborators for orchestrator tests.
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::http::{HeaderMap, HeaderValue, header::COOKIE};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use super::{Identifier, IdentifierConfig, ResponseCookies};
use crate::backends::{
    Backend, BackendError, BackendResult, BackendUser, Claims, IDENTIFIED_USER_ID_CLAIM,
    LogonOutcome, ScopeDefinition, ScopesMeta,
};
use crate::clients::StaticClientRegistry;
use crate::tickets::{SealedTicketCodec, key_from_secret};

pub const TRUSTED_CLIENT: &str = "portal";
pub const TRUSTED_REDIRECT: &str = "https://portal.example.org/cb";
pub const UNTRUSTED_CLIENT: &str = "thirdparty";
pub const UNTRUSTED_REDIRECT: &str = "https://app.example.com/cb";
pub const AUTHORIZATION_ENDPOINT: &str = "https://id.example.org/authorize";

#[derive(Default)]
pub struct FakeBackend {
    users: HashMap<String, (String, BackendUser)>,
    unavailable: bool,
    logons: AtomicUsize,
    destroyed: Mutex<Vec<Option<String>>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
            .with_user("alice", "secret", "Alice Liddell")
            .with_user("bob", "builder", "Bob")
    }

    pub fn with_user(mut self, username: &str, password: &str, name: &str) -> Self {
        let subject = format!("sub-{username}");
        let mut claims = Claims::new();
        claims.insert(IDENTIFIED_USER_ID_CLAIM.to_string(), json!(subject));
        let user = BackendUser {
            subject,
            username: username.to_string(),
            name: Some(name.to_string()),
            email: Some(format!("{username}@example.org")),
            claims,
            ..BackendUser::default()
        };
        self.users
            .insert(username.to_string(), (password.to_string(), user));
        self
    }

    /// Every backend call fails as if the directory were unreachable.
    pub fn down(self) -> Self {
        Self {
            unavailable: true,
            ..self
        }
    }

    pub fn logon_calls(&self) -> usize {
        self.logons.load(Ordering::SeqCst)
    }

    pub fn destroyed(&self) -> Vec<Option<String>> {
        self.destroyed.lock().unwrap().clone()
    }

    fn check(&self) -> BackendResult<()> {
        if self.unavailable {
            return Err(BackendError::Unavailable("directory down".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl Backend for FakeBackend {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn run_with_context(&self, cancel: CancellationToken) -> BackendResult<()> {
        cancel.cancelled().await;
        Ok(())
    }

    async fn logon(
        &self,
        _audience: &str,
        username: &str,
        password: &str,
    ) -> BackendResult<LogonOutcome> {
        self.logons.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok(match self.users.get(username) {
            Some((expected, user)) if expected == password => LogonOutcome::Accepted {
                subject: user.subject.clone(),
                session_ref: Some(format!("session-{username}")),
                claims: user.claims.clone(),
            },
            _ => LogonOutcome::Rejected,
        })
    }

    async fn resolve_user_by_username(&self, username: &str) -> BackendResult<Option<BackendUser>> {
        self.check()?;
        Ok(self.users.get(username).map(|(_, user)| user.clone()))
    }

    async fn get_user(
        &self,
        subject: &str,
        _session_ref: Option<&str>,
    ) -> BackendResult<Option<BackendUser>> {
        self.check()?;
        Ok(self
            .users
            .values()
            .find(|(_, user)| user.subject == subject)
            .map(|(_, user)| user.clone()))
    }

    async fn refresh_session(
        &self,
        _subject: &str,
        _session_ref: Option<&str>,
        _claims: &Claims,
    ) -> BackendResult<()> {
        Ok(())
    }

    async fn destroy_session(&self, session_ref: Option<&str>) -> BackendResult<()> {
        self.destroyed
            .lock()
            .unwrap()
            .push(session_ref.map(str::to_string));
        Ok(())
    }

    fn user_claims(&self, _subject: &str, _authorized_scopes: &HashSet<String>) -> Claims {
        Claims::new()
    }

    fn scopes_supported(&self) -> Vec<String> {
        vec!["profile".into(), "email".into()]
    }

    fn scopes_meta(&self) -> Option<ScopesMeta> {
        let mut meta = ScopesMeta::default();
        meta.definitions.insert(
            "profile".into(),
            ScopeDefinition {
                priority: 10,
                description: "Basic profile".into(),
            },
        );
        Some(meta)
    }
}

pub fn clients() -> StaticClientRegistry {
    StaticClientRegistry::from_json(&format!(
        r#"[
            {{"id": "{TRUSTED_CLIENT}", "name": "Portal", "trusted": true,
              "redirect_uris": ["{TRUSTED_REDIRECT}"]}},
            {{"id": "{UNTRUSTED_CLIENT}", "name": "Third Party",
              "redirect_uris": ["{UNTRUSTED_REDIRECT}"]}}
        ]"#
    ))
    .unwrap()
}

pub fn identifier(backend: Arc<FakeBackend>) -> Identifier {
    Identifier::new(
        IdentifierConfig::new(AUTHORIZATION_ENDPOINT),
        backend,
        Arc::new(clients()),
        Arc::new(SealedTicketCodec::new(&key_from_secret("identifier tests"))),
    )
}

/// Request headers carrying back every cookie set in `cookies`.
pub fn returning(cookies: &ResponseCookies) -> HeaderMap {
    let pairs: Vec<&str> = cookies
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|value| value.split(';').next())
        .collect();

    let mut headers = HeaderMap::new();
    if !pairs.is_empty() {
        headers.insert(COOKIE, HeaderValue::from_str(&pairs.join("; ")).unwrap());
    }
    headers
}
