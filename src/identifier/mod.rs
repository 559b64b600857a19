//! Identifier orchestrator.
//!
//! Responsibility:
//! - Hello / Logon / Logoff / Consent decisions
//! - Session cookie minting and reading through the ticket codec
//! - Client trust and consent escalation
//!
//! HTTP concerns stay in `api::identifier`; this module only sees request
//! headers and collects `Set-Cookie` values.
use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderMap, HeaderName, header::InvalidHeaderValue};
use thiserror::Error;
use tracing::{debug, warn};

use crate::backends::{Backend, BackendError};
use crate::clients::{ClientError, ClientRegistry};
use crate::tickets::{TicketCodec, TicketError};

pub mod consent;
pub mod cookies;
pub mod decision;
pub mod hello;
pub mod logon;
pub mod request;
pub mod user;

pub use consent::Consent;
pub use cookies::{CookieSettings, ResponseCookies};
pub use hello::HelloResponse;
pub use logon::LogonResult;
pub use request::{Flow, HelloRequest, LogonParams, Prompt};
pub use user::IdentifiedUser;

pub const DEFAULT_LOGON_COOKIE_NAME: &str = "identifier_logon";
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(86_400);
pub const DEFAULT_CONSENT_TTL: Duration = Duration::from_secs(300);
pub const DEFAULT_TRUSTED_PROXY_USER_HEADER: &str = "x-forwarded-user";

#[derive(Debug, Error)]
pub enum IdentifierError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error(transparent)]
    Ticket(#[from] TicketError),
    #[error("cookie value not representable as header: {0}")]
    Cookie(#[from] InvalidHeaderValue),
}

#[derive(Debug, Clone)]
pub struct IdentifierConfig {
    pub logon_cookie_name: String,
    pub cookie: CookieSettings,
    pub session_ttl: Duration,
    pub consent_ttl: Duration,
    /// Header an authenticating reverse proxy sets. `None` trusts no proxy.
    pub trusted_proxy_user_header: Option<HeaderName>,
    /// Where the browser continues after a successful hello.
    pub authorization_endpoint: String,
}

impl IdentifierConfig {
    pub fn new(authorization_endpoint: impl Into<String>) -> Self {
        Self {
            logon_cookie_name: DEFAULT_LOGON_COOKIE_NAME.to_string(),
            cookie: CookieSettings::default(),
            session_ttl: DEFAULT_SESSION_TTL,
            consent_ttl: DEFAULT_CONSENT_TTL,
            trusted_proxy_user_header: Some(HeaderName::from_static(
                DEFAULT_TRUSTED_PROXY_USER_HEADER,
            )),
            authorization_endpoint: authorization_endpoint.into(),
        }
    }
}

pub struct Identifier {
    config: IdentifierConfig,
    backend: Arc<dyn Backend>,
    clients: Arc<dyn ClientRegistry>,
    tickets: Arc<dyn TicketCodec>,
}

impl std::fmt::Debug for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identifier")
            .field("config", &self.config)
            .field("backend", &self.backend.name())
            .finish_non_exhaustive()
    }
}

impl Identifier {
    pub fn new(
        config: IdentifierConfig,
        backend: Arc<dyn Backend>,
        clients: Arc<dyn ClientRegistry>,
        tickets: Arc<dyn TicketCodec>,
    ) -> Self {
        Self {
            config,
            backend,
            clients,
            tickets,
        }
    }

    pub fn config(&self) -> &IdentifierConfig {
        &self.config
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    /// User from a valid session cookie. Bad or expired cookies read as no user.
    pub fn user_from_logon_cookie(&self, headers: &HeaderMap) -> Option<IdentifiedUser> {
        let name = &self.config.logon_cookie_name;
        let sealed = cookies::read_cookie(headers, name)?;

        let user = self
            .tickets
            .unseal(name, &sealed)
            .map_err(|err| err.to_string())
            .and_then(|ticket| IdentifiedUser::from_ticket(ticket).map_err(|err| err.to_string()));
        match user {
            Ok(user) => Some(user),
            Err(err) => {
                debug!(error = %err, "identifier failed to decode logon cookie");
                None
            }
        }
    }

    /// Username asserted by the trusted proxy, if configured and present.
    pub fn proxy_user(&self, headers: &HeaderMap) -> Option<String> {
        let header = self.config.trusted_proxy_user_header.as_ref()?;
        headers
            .get(header)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    }

    fn set_logon_cookie(
        &self,
        user: &IdentifiedUser,
        cookies: &mut ResponseCookies,
    ) -> Result<(), IdentifierError> {
        let name = &self.config.logon_cookie_name;
        let ticket = user.to_ticket().map_err(TicketError::from)?;
        let sealed = self.tickets.seal(name, &ticket, self.config.session_ttl)?;
        cookies.push(self.config.cookie.set(name, &sealed, self.config.session_ttl)?);
        Ok(())
    }

    /// Clear the session cookie. A backend session behind a valid cookie is
    /// destroyed on a best effort basis.
    pub async fn logoff(
        &self,
        headers: &HeaderMap,
        cookies: &mut ResponseCookies,
    ) -> Result<(), IdentifierError> {
        if let Some(user) = self.user_from_logon_cookie(headers)
            && let Err(err) = self.backend.destroy_session(user.session_ref()).await
        {
            warn!(
                backend = self.backend.name(),
                subject = %user.subject(),
                error = %err,
                "identifier failed to destroy backend session"
            );
        }

        cookies.push(self.config.cookie.clear(&self.config.logon_cookie_name)?);
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod testing;
