//! Identity backends.
//!
//! Every identity source implements [`Backend`]. Exactly one backend is chosen
//! at startup and shared read-only as `Arc<dyn Backend>`.
//!
//! Responsibility:
//! - Credential verification (`logon`)
//! - User lookup by login name and by stable subject
//! - Backend specific session hooks and claim projection
use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

pub mod ldap;

/// Free-form claims attached to a user by a backend.
pub type Claims = Map<String, Value>;

pub const SCOPE_OPENID: &str = "openid";
pub const SCOPE_PROFILE: &str = "profile";
pub const SCOPE_EMAIL: &str = "email";
pub const SCOPE_UNIQUE_USER_ID: &str = "identifier/uuid";
pub const SCOPE_RAW_SUBJECT: &str = "identifier/raw_sub";

/// Claim carrying the backend-local identifier of the user.
pub const IDENTIFIED_USER_ID_CLAIM: &str = "identifier/id";

#[derive(Debug, Error)]
pub enum BackendError {
    /// The backend could not be reached or the transport broke down.
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    /// The backend answered, but not in a way we can work with.
    #[error("backend protocol error: {0}")]
    Protocol(String),
    #[error("more than one user matches {0:?}")]
    Ambiguous(String),
    #[error("backend returned wrong user")]
    WrongUser,
    #[error("invalid user id: {0:?}")]
    InvalidSubject(String),
    #[error("backend misconfigured: {0}")]
    Misconfigured(&'static str),
    #[error("timed out waiting for backend")]
    Timeout,
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Result of a credential check.
///
/// `Rejected` means the backend was asked and said no. Anything that prevented
/// asking is reported as `Err(BackendError)` instead.
#[derive(Debug, Clone, PartialEq)]
pub enum LogonOutcome {
    Accepted {
        subject: String,
        session_ref: Option<String>,
        claims: Claims,
    },
    Rejected,
}

/// User profile as seen by a backend.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BackendUser {
    pub subject: String,
    pub username: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub email_verified: bool,
    pub family_name: Option<String>,
    pub given_name: Option<String>,
    pub unique_id: Option<String>,
    pub claims: Claims,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ScopeDefinition {
    pub priority: i32,
    pub description: String,
}

/// Human readable scope metadata, shown on the consent screen.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ScopesMeta {
    pub mapping: BTreeMap<String, String>,
    pub definitions: BTreeMap<String, ScopeDefinition>,
}

#[async_trait]
pub trait Backend: Send + Sync {
    /// Stable backend name for logs.
    fn name(&self) -> &'static str;

    /// Long running maintenance hook. Must return promptly once `cancel` fires.
    async fn run_with_context(&self, cancel: CancellationToken) -> BackendResult<()>;

    async fn logon(
        &self,
        audience: &str,
        username: &str,
        password: &str,
    ) -> BackendResult<LogonOutcome>;

    /// Look up a user by login name. An unknown user is `Ok(None)`.
    async fn resolve_user_by_username(&self, username: &str) -> BackendResult<Option<BackendUser>>;

    /// Look up a user by subject.
    async fn get_user(
        &self,
        subject: &str,
        session_ref: Option<&str>,
    ) -> BackendResult<Option<BackendUser>>;

    async fn refresh_session(
        &self,
        subject: &str,
        session_ref: Option<&str>,
        claims: &Claims,
    ) -> BackendResult<()>;

    async fn destroy_session(&self, session_ref: Option<&str>) -> BackendResult<()>;

    /// Backend specific claims for `subject`, limited to `authorized_scopes`.
    fn user_claims(&self, subject: &str, authorized_scopes: &HashSet<String>) -> Claims;

    fn scopes_supported(&self) -> Vec<String>;

    fn scopes_meta(&self) -> Option<ScopesMeta>;
}
