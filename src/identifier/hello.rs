use std::collections::BTreeMap;

use axum::http::HeaderMap;
use serde::Serialize;
use tracing::{debug, warn};

use super::cookies::ResponseCookies;
use super::decision::{IdentitySource, hello_source};
use super::request::{Flow, HelloRequest, Prompt};
use super::{Identifier, IdentifiedUser, IdentifierError};
use crate::backends::ScopesMeta;
use crate::clients::ClientDetails;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HelloResponse {
    pub state: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<Flow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested_scopes: Option<BTreeMap<String, bool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_details: Option<ClientDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scopes_meta: Option<ScopesMeta>,
    #[serde(rename = "continueURI", skip_serializing_if = "Option::is_none")]
    pub continue_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flow: Option<Flow>,
    #[serde(skip)]
    pub source: IdentitySource,
}

impl Identifier {
    /// Who is signed in, and what the client flow needs next.
    ///
    /// An unsuccessful response is not an error: nobody could be identified
    /// without interaction. Client resolution fails hard. A consent cookie
    /// read for an untrusted client is cleared through `cookies`.
    pub async fn hello(
        &self,
        headers: &HeaderMap,
        request: &HelloRequest,
        known: Option<&IdentifiedUser>,
        cookies: &mut ResponseCookies,
    ) -> Result<HelloResponse, IdentifierError> {
        let mut response = HelloResponse {
            state: request.state.clone(),
            ..HelloResponse::default()
        };

        if request.has_prompt(Prompt::None) {
            debug!("identifier hello with prompt none, interaction required");
            return Ok(response);
        }
        let prompt_login = request.has_prompt(Prompt::Login);

        let known = known.filter(|user| !user.username().is_empty());
        let cookie_user = if prompt_login || known.is_some() {
            None
        } else {
            self.user_from_logon_cookie(headers)
                .filter(|user| !user.username().is_empty())
        };
        let proxy_user = if prompt_login {
            None
        } else {
            self.proxy_user(headers)
        };

        response.source = hello_source(
            prompt_login,
            known.is_some(),
            cookie_user.is_some(),
            proxy_user.is_some(),
        );
        match response.source {
            IdentitySource::Known => {
                if let Some(user) = known {
                    response.username = Some(user.username().to_string());
                    response.display_name = user.name().map(str::to_string);
                }
            }
            IdentitySource::CookieValid => {
                if let Some(user) = &cookie_user {
                    self.refresh_session(user).await;
                    response.username = Some(user.username().to_string());
                    response.display_name = user.name().map(str::to_string);
                }
            }
            IdentitySource::ProxyAsserted => response.username = proxy_user,
            IdentitySource::Anonymous | IdentitySource::CredentialChecked => {}
        }
        response.success = response.username.is_some();
        if !response.success {
            return Ok(response);
        }

        let Some(flow) = request.flow else {
            return Ok(response);
        };

        let details = self
            .clients
            .lookup(&request.client_id, &request.redirect_uri)?;

        let consent_required = if request.has_prompt(Prompt::Consent) {
            true
        } else if details.trusted {
            false
        } else {
            !self.has_stored_consent(headers, request, cookies)?
        };
        if consent_required {
            response.next = Some(Flow::Consent);
            response.requested_scopes = Some(
                request
                    .scopes
                    .iter()
                    .map(|scope| (scope.clone(), true))
                    .collect(),
            );
            response.client_details = Some(details);
            response.scopes_meta = self.backend.scopes_meta();
        }

        response.continue_uri = Some(self.config.authorization_endpoint.clone());
        response.flow = Some(flow);
        Ok(response)
    }

    /// Untrusted clients ask unless the user already allowed every
    /// requested scope for this client and redirect URI.
    fn has_stored_consent(
        &self,
        headers: &HeaderMap,
        request: &HelloRequest,
        cookies: &mut ResponseCookies,
    ) -> Result<bool, IdentifierError> {
        let consent = self.consent_from_request(
            headers,
            &request.client_id,
            &request.redirect_uri,
            cookies,
        )?;
        Ok(consent.is_some_and(|consent| {
            consent.allow && request.scopes.is_subset(&consent.scopes())
        }))
    }

    async fn refresh_session(&self, user: &IdentifiedUser) {
        if user.session_ref().is_none() {
            return;
        }
        if let Err(err) = self
            .backend
            .refresh_session(user.subject(), user.session_ref(), user.claims())
            .await
        {
            warn!(
                backend = self.backend.name(),
                error = %err,
                "identifier failed to refresh backend session"
            );
        }
    }
}
