use axum::http::HeaderMap;
use tracing::{debug, info};

use super::cookies::ResponseCookies;
use super::decision::{LogonDecision, LogonInputs};
use super::hello::HelloResponse;
use super::request::{HelloRequest, LogonParams};
use super::{Identifier, IdentifiedUser, IdentifierError};
use crate::backends::LogonOutcome;

#[derive(Debug, Clone, PartialEq)]
pub enum LogonResult {
    /// Nobody signed in. Not an error.
    NoUser,
    /// Signed in, but the nested hello could not complete without interaction.
    HelloFailed,
    Success { hello: Option<HelloResponse> },
}

impl Identifier {
    pub async fn logon(
        &self,
        headers: &HeaderMap,
        params: &LogonParams,
        hello: Option<&HelloRequest>,
        cookies: &mut ResponseCookies,
    ) -> Result<LogonResult, IdentifierError> {
        let cookie_user = if LogonDecision::wants_cookie(params) {
            self.user_from_logon_cookie(headers)
        } else {
            None
        };
        let proxy_user = self.proxy_user(headers);

        let decision = LogonDecision::classify(LogonInputs {
            params,
            cookie_username: cookie_user.as_ref().map(IdentifiedUser::username),
            proxy_user: proxy_user.as_deref(),
        });
        debug!(
            username = %params.username,
            source = ?decision.source(),
            "identifier logon decision"
        );

        let user = match decision {
            LogonDecision::ReuseCookie => cookie_user,
            LogonDecision::ResolveProxyUser => self.resolve_user(&params.username).await?,
            LogonDecision::Anonymous => None,
            LogonDecision::CheckCredentials => {
                let audience = hello.map(|h| h.client_id.as_str()).unwrap_or_default();
                match self
                    .backend
                    .logon(audience, &params.username, &params.password)
                    .await?
                {
                    LogonOutcome::Accepted {
                        subject,
                        session_ref,
                        claims,
                    } => Some(
                        IdentifiedUser::new(subject, params.username.clone())
                            .with_session_ref(session_ref)
                            .with_claims(claims),
                    ),
                    LogonOutcome::Rejected => None,
                }
            }
        };

        let Some(user) = user.filter(|user| !user.subject().is_empty()) else {
            return Ok(LogonResult::NoUser);
        };
        let user = self.update_user(user).await;

        let hello = match hello {
            Some(request) => {
                let response = self.hello(headers, request, Some(&user), cookies).await?;
                if !response.success {
                    return Ok(LogonResult::HelloFailed);
                }
                Some(response)
            }
            None => None,
        };

        self.set_logon_cookie(&user, cookies)?;
        info!(
            username = %user.username(),
            subject = %user.subject(),
            source = ?decision.source(),
            "identifier logon"
        );
        Ok(LogonResult::Success { hello })
    }

    async fn resolve_user(&self, username: &str) -> Result<Option<IdentifiedUser>, IdentifierError> {
        let Some(profile) = self.backend.resolve_user_by_username(username).await? else {
            return Ok(None);
        };
        Ok(Some(
            IdentifiedUser::new(profile.subject.clone(), username)
                .with_claims(profile.claims.clone())
                .with_profile(&profile),
        ))
    }

    /// Best effort profile refresh; the user is returned unchanged on failure.
    async fn update_user(&self, user: IdentifiedUser) -> IdentifiedUser {
        match self
            .backend
            .get_user(user.subject(), user.session_ref())
            .await
        {
            Ok(Some(profile)) => user.with_profile(&profile),
            Ok(None) => user,
            Err(err) => {
                debug!(
                    subject = %user.subject(),
                    error = %err,
                    "identifier failed to update user data in logon request"
                );
                user
            }
        }
    }
}
