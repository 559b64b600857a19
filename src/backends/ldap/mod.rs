//! Directory (LDAP) identity backend.
//!
//! Every operation opens its own connection: limiter token and dial share one
//! deadline, then an optional admin bind, one search (plus a user bind for
//! logon) and an unbind. Dropping the calling future drops the connection.
use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use ldap3::ldap_escape;
use tokio::time::{error::Elapsed, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{
    Backend, BackendError, BackendResult, BackendUser, Claims, LogonOutcome, SCOPE_EMAIL,
    SCOPE_PROFILE, SCOPE_RAW_SUBJECT, SCOPE_UNIQUE_USER_ID, ScopesMeta,
};

pub mod attributes;
pub mod config;
pub mod connection;
pub mod directory;
pub mod entry_id;
pub mod limiter;

use attributes::{DirectoryUser, UserAttribute};
use config::LdapSettings;
use connection::Ldap3Connector;
use directory::{
    DirectoryConnection, DirectoryConnector, DirectoryEntry, DirectoryError, RESULT_INVALID_CREDENTIALS,
    RESULT_NO_SUCH_OBJECT, RESULT_SIZE_LIMIT_EXCEEDED, SearchRequest, SearchScope,
};
use limiter::RateLimiter;

const BACKEND_NAME: &str = "identifier-ldap";

/// Two results are enough to tell a unique match from an ambiguous one.
const SEARCH_SIZE_LIMIT: i32 = 2;

pub struct LdapBackend {
    settings: LdapSettings,
    connector: Arc<dyn DirectoryConnector>,
    limiter: RateLimiter,
}

impl LdapBackend {
    pub fn new(settings: LdapSettings, connector: Arc<dyn DirectoryConnector>) -> Self {
        let limiter = RateLimiter::new(settings.rate_limit, settings.rate_burst);
        Self {
            settings,
            connector,
            limiter,
        }
    }

    pub fn from_settings(settings: LdapSettings) -> Self {
        let connector = Ldap3Connector::new(
            settings.url.clone(),
            settings.timeout,
            settings.tls_insecure_skip_verify,
        );
        info!(
            url = %settings.url,
            tls = settings.is_tls,
            base_dn = %settings.base_dn,
            filter = %settings.filter,
            "ldap identifier backend configured"
        );
        Self::new(settings, Arc::new(connector))
    }

    async fn connect(&self) -> BackendResult<Box<dyn DirectoryConnection>> {
        let dial = async {
            self.limiter.acquire().await;
            let mut conn = self.connector.connect().await?;
            if let Some(bind) = &self.settings.bind {
                if let Err(err) = conn.simple_bind(&bind.dn, &bind.password).await {
                    conn.close().await;
                    return Err(err);
                }
            }
            Ok::<_, DirectoryError>(conn)
        };

        match timeout(self.settings.timeout, dial).await {
            Ok(res) => res.map_err(BackendError::from),
            Err(_) => Err(BackendError::Timeout),
        }
    }

    fn login_attribute(&self) -> BackendResult<&str> {
        self.settings
            .mapping
            .wire_name(UserAttribute::Login)
            .ok_or(BackendError::Misconfigured("no login attribute is set"))
    }

    /// Mapped attributes plus whatever the entry ID is built from.
    fn requested_attributes(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.settings
            .mapping
            .iter()
            .map(|(_, mapped)| mapped.wire_name.clone())
            .chain(self.settings.entry_ids.attributes().iter().cloned())
            .filter(|name| !name.is_empty() && seen.insert(name.to_ascii_lowercase()))
            .collect()
    }

    fn username_filter(&self, login_attribute: &str, username: &str) -> String {
        format!(
            "(&{}({}={}))",
            self.settings.filter,
            login_attribute,
            ldap_escape(username)
        )
    }

    async fn search_single(
        &self,
        conn: &mut dyn DirectoryConnection,
        base: String,
        scope: SearchScope,
        filter: String,
    ) -> BackendResult<Option<DirectoryEntry>> {
        let request = SearchRequest {
            base,
            scope,
            filter,
            attributes: self.requested_attributes(),
            size_limit: SEARCH_SIZE_LIMIT,
            time_limit: self.settings.timeout,
        };

        match conn.search(&request).await {
            Ok(mut entries) => match entries.len() {
                0 => Ok(None),
                1 => Ok(entries.pop()),
                _ => Err(BackendError::Ambiguous(request.filter)),
            },
            Err(err) if err.is_code(RESULT_NO_SUCH_OBJECT) => Ok(None),
            Err(err) if err.is_code(RESULT_SIZE_LIMIT_EXCEEDED) => {
                Err(BackendError::Ambiguous(request.filter))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn search_username(
        &self,
        conn: &mut dyn DirectoryConnection,
        login_attribute: &str,
        username: &str,
    ) -> BackendResult<Option<DirectoryEntry>> {
        let entry = self
            .search_single(
                conn,
                self.settings.base_dn.clone(),
                self.settings.scope,
                self.username_filter(login_attribute, username),
            )
            .await?;

        if let Some(entry) = &entry {
            let login = entry.first_text(login_attribute).unwrap_or_default();
            if login.to_lowercase() != username.to_lowercase() {
                return Err(BackendError::WrongUser);
            }
        }
        Ok(entry)
    }

    async fn logon_with(
        &self,
        conn: &mut dyn DirectoryConnection,
        login_attribute: &str,
        username: &str,
        password: &str,
    ) -> BackendResult<LogonOutcome> {
        let Some(entry) = self.search_username(conn, login_attribute, username).await? else {
            debug!(username, "ldap identifier backend logon unknown user");
            return Ok(LogonOutcome::Rejected);
        };

        match conn.simple_bind(&entry.dn, password).await {
            Ok(()) => {}
            Err(err) if err.is_code(RESULT_INVALID_CREDENTIALS) => {
                debug!(username, "ldap identifier backend logon invalid credentials");
                return Ok(LogonOutcome::Rejected);
            }
            Err(err) => return Err(err.into()),
        }

        let entry_id = self.settings.entry_ids.encode(&entry);
        if entry_id.is_empty() {
            return Err(BackendError::InvalidSubject(entry.dn));
        }

        let user = DirectoryUser::from_entry(entry_id.clone(), &self.settings.mapping, &entry);
        debug!(username, id = %entry_id, "ldap identifier backend logon");

        Ok(LogonOutcome::Accepted {
            subject: entry_id,
            session_ref: None,
            claims: user.backend_claims(),
        })
    }

    async fn resolve_with(
        &self,
        conn: &mut dyn DirectoryConnection,
        login_attribute: &str,
        username: &str,
    ) -> BackendResult<Option<BackendUser>> {
        let Some(entry) = self.search_username(conn, login_attribute, username).await? else {
            return Ok(None);
        };

        let entry_id = self.settings.entry_ids.encode(&entry);
        if entry_id.is_empty() {
            return Err(BackendError::InvalidSubject(entry.dn));
        }
        Ok(Some(
            DirectoryUser::from_entry(entry_id, &self.settings.mapping, &entry).into_backend_user(),
        ))
    }

    async fn get_with(
        &self,
        conn: &mut dyn DirectoryConnection,
        subject: &str,
    ) -> BackendResult<Option<BackendUser>> {
        let location = self
            .settings
            .entry_ids
            .locate(
                subject,
                &self.settings.base_dn,
                self.settings.scope,
                &self.settings.filter,
            )
            .ok_or_else(|| BackendError::InvalidSubject(subject.to_string()))?;

        let Some(entry) = self
            .search_single(conn, location.base, location.scope, location.filter)
            .await?
        else {
            return Ok(None);
        };

        let entry_id = self.settings.entry_ids.encode(&entry);
        if !entry_id.eq_ignore_ascii_case(subject) {
            return Err(BackendError::WrongUser);
        }
        Ok(Some(
            DirectoryUser::from_entry(entry_id, &self.settings.mapping, &entry).into_backend_user(),
        ))
    }
}

/// Close the connection whatever happened, then fold the deadline into the result.
async fn finish<T>(
    mut conn: Box<dyn DirectoryConnection>,
    res: Result<BackendResult<T>, Elapsed>,
) -> BackendResult<T> {
    conn.close().await;
    res.unwrap_or(Err(BackendError::Timeout))
}

#[async_trait]
impl Backend for LdapBackend {
    fn name(&self) -> &'static str {
        BACKEND_NAME
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
        let login_attribute = self.login_attribute()?;
        // An empty password would be an unauthenticated bind, which servers accept.
        if password.is_empty() {
            return Ok(LogonOutcome::Rejected);
        }

        let mut conn = self.connect().await?;
        let res = timeout(
            self.settings.timeout,
            self.logon_with(conn.as_mut(), login_attribute, username, password),
        )
        .await;
        finish(conn, res).await
    }

    async fn resolve_user_by_username(&self, username: &str) -> BackendResult<Option<BackendUser>> {
        let login_attribute = self.login_attribute()?;

        let mut conn = self.connect().await?;
        let res = timeout(
            self.settings.timeout,
            self.resolve_with(conn.as_mut(), login_attribute, username),
        )
        .await;
        finish(conn, res).await
    }

    async fn get_user(
        &self,
        subject: &str,
        _session_ref: Option<&str>,
    ) -> BackendResult<Option<BackendUser>> {
        let mut conn = self.connect().await?;
        let res = timeout(self.settings.timeout, self.get_with(conn.as_mut(), subject)).await;
        finish(conn, res).await
    }

    async fn refresh_session(
        &self,
        _subject: &str,
        _session_ref: Option<&str>,
        _claims: &Claims,
    ) -> BackendResult<()> {
        Ok(())
    }

    async fn destroy_session(&self, _session_ref: Option<&str>) -> BackendResult<()> {
        Ok(())
    }

    fn user_claims(&self, _subject: &str, _authorized_scopes: &HashSet<String>) -> Claims {
        Claims::new()
    }

    fn scopes_supported(&self) -> Vec<String> {
        [
            SCOPE_PROFILE,
            SCOPE_EMAIL,
            SCOPE_UNIQUE_USER_ID,
            SCOPE_RAW_SUBJECT,
        ]
        .into_iter()
        .map(String::from)
        .collect()
    }

    fn scopes_meta(&self) -> Option<ScopesMeta> {
        None
    }
}
