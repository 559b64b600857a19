use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::backends::{BackendUser, Claims};

/// A verified principal. Built once, changed only through `with_*` copies.
#[derive(Debug, Clone, PartialEq)]
pub struct IdentifiedUser {
    subject: String,
    username: String,
    name: Option<String>,
    email: Option<String>,
    session_ref: Option<String>,
    claims: Claims,
    logon_at: DateTime<Utc>,
}

/// What goes into the session ticket.
#[derive(Serialize, Deserialize)]
struct LogonTicket {
    sub: String,
    username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    #[serde(default, rename = "ref", skip_serializing_if = "Option::is_none")]
    session_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Claims::is_empty")]
    claims: Claims,
    #[serde(with = "chrono::serde::ts_seconds")]
    logon_at: DateTime<Utc>,
}

impl IdentifiedUser {
    pub fn new(subject: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            username: username.into(),
            name: None,
            email: None,
            session_ref: None,
            claims: Claims::new(),
            logon_at: Utc::now(),
        }
    }

    pub fn with_name(self, name: Option<String>) -> Self {
        Self { name, ..self }
    }

    pub fn with_session_ref(self, session_ref: Option<String>) -> Self {
        Self {
            session_ref,
            ..self
        }
    }

    pub fn with_claims(self, claims: Claims) -> Self {
        Self { claims, ..self }
    }

    /// Overlay profile data from the backend. Subject and username stay.
    pub fn with_profile(self, profile: &BackendUser) -> Self {
        let mut claims = self.claims;
        claims.extend(profile.claims.clone());
        Self {
            name: profile.name.clone().or(self.name),
            email: profile.email.clone().or(self.email),
            claims,
            ..self
        }
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn session_ref(&self) -> Option<&str> {
        self.session_ref.as_deref()
    }

    pub fn claims(&self) -> &Claims {
        &self.claims
    }

    pub fn logon_at(&self) -> DateTime<Utc> {
        self.logon_at
    }

    pub fn to_ticket(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(LogonTicket {
            sub: self.subject.clone(),
            username: self.username.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            session_ref: self.session_ref.clone(),
            claims: self.claims.clone(),
            logon_at: self.logon_at,
        })
    }

    pub fn from_ticket(ticket: Value) -> Result<Self, serde_json::Error> {
        let ticket: LogonTicket = serde_json::from_value(ticket)?;
        Ok(Self {
            subject: ticket.sub,
            username: ticket.username,
            name: ticket.name,
            email: ticket.email,
            session_ref: ticket.session_ref,
            claims: ticket.claims,
            logon_at: ticket.logon_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn ticket_keeps_identity() -> anyhow::Result<()> {
        let mut claims = Claims::new();
        claims.insert("identifier/id".into(), json!("uid=alice"));
        let user = IdentifiedUser::new("uid=alice", "alice")
            .with_name(Some("Alice".into()))
            .with_session_ref(Some("s1".into()))
            .with_claims(claims);

        let restored = IdentifiedUser::from_ticket(user.to_ticket()?)?;
        assert_eq!(restored.subject(), "uid=alice");
        assert_eq!(restored.username(), "alice");
        assert_eq!(restored.name(), Some("Alice"));
        assert_eq!(restored.session_ref(), Some("s1"));
        assert_eq!(restored.claims(), user.claims());
        assert_eq!(restored.logon_at().timestamp(), user.logon_at().timestamp());
        Ok(())
    }

    #[test]
    fn profile_overlays_but_keeps_username() {
        let user = IdentifiedUser::new("sub", "ALICE").with_name(Some("old".into()));
        let profile = BackendUser {
            subject: "sub".into(),
            username: "alice".into(),
            email: Some("alice@example.org".into()),
            ..BackendUser::default()
        };

        let user = user.with_profile(&profile);
        assert_eq!(user.username(), "ALICE");
        assert_eq!(user.name(), Some("old"));
        assert_eq!(user.email(), Some("alice@example.org"));
    }

    #[test]
    fn garbage_ticket_is_rejected() {
        assert!(IdentifiedUser::from_ticket(json!({"sub": 1})).is_err());
    }
}
