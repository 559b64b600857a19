use std::collections::BTreeSet;

use axum::http::HeaderMap;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use super::cookies::{ResponseCookies, read_cookie};
use super::{Identifier, IdentifierError};

const CONSENT_COOKIE_PREFIX: &str = "identifier_consent_";

/// A user's scope decision for one (client, redirect URI) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Consent {
    pub allow: bool,
    #[serde(rename = "rawScope", default)]
    pub raw_scope: String,
}

impl Consent {
    pub fn scopes(&self) -> BTreeSet<String> {
        self.raw_scope
            .split_whitespace()
            .map(str::to_string)
            .collect()
    }
}

/// Cookie name and ticket scope for consent given to `client_id` at `redirect_uri`.
pub fn consent_cookie_name(client_id: &str, redirect_uri: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(client_id.as_bytes());
    hasher.update([0u8]);
    hasher.update(redirect_uri.as_bytes());
    let digest = URL_SAFE_NO_PAD.encode(hasher.finalize());
    format!("{CONSENT_COOKIE_PREFIX}{}", &digest[..16])
}

impl Identifier {
    /// Record consent. Returns `false` for a denial, which sets no cookie.
    pub fn consent(
        &self,
        client_id: &str,
        redirect_uri: &str,
        consent: &Consent,
        cookies: &mut ResponseCookies,
    ) -> Result<bool, IdentifierError> {
        if !consent.allow {
            return Ok(false);
        }

        let name = consent_cookie_name(client_id, redirect_uri);
        let ticket = serde_json::to_value(consent).map_err(crate::tickets::TicketError::from)?;
        let sealed = self
            .tickets
            .seal(&name, &ticket, self.config.consent_ttl)?;
        cookies.push(self.config.cookie.set(&name, &sealed, self.config.consent_ttl)?);
        Ok(true)
    }

    /// Read back consent for this client and clear its cookie, so it is used
    /// at most once.
    pub fn consent_from_request(
        &self,
        headers: &HeaderMap,
        client_id: &str,
        redirect_uri: &str,
        cookies: &mut ResponseCookies,
    ) -> Result<Option<Consent>, IdentifierError> {
        let name = consent_cookie_name(client_id, redirect_uri);
        let Some(sealed) = read_cookie(headers, &name) else {
            return Ok(None);
        };
        cookies.push(self.config.cookie.clear(&name)?);

        let consent = self
            .tickets
            .unseal(&name, &sealed)
            .map_err(|err| err.to_string())
            .and_then(|ticket| serde_json::from_value(ticket).map_err(|err| err.to_string()));
        match consent {
            Ok(consent) => Ok(Some(consent)),
            Err(err) => {
                debug!(client_id, error = %err, "identifier ignoring unusable consent cookie");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookie_name_is_stable_and_pair_specific() {
        let a = consent_cookie_name("client", "https://app.example.com/cb");
        assert_eq!(a, consent_cookie_name("client", "https://app.example.com/cb"));
        assert_eq!(a.len(), CONSENT_COOKIE_PREFIX.len() + 16);
        assert!(a.starts_with(CONSENT_COOKIE_PREFIX));

        assert_ne!(a, consent_cookie_name("client", "https://app.example.com/other"));
        // The separator keeps ("ab", "c") and ("a", "bc") apart.
        assert_ne!(
            consent_cookie_name("ab", "c"),
            consent_cookie_name("a", "bc")
        );
    }

    #[test]
    fn scopes_split_raw_scope() {
        let consent = Consent {
            allow: true,
            raw_scope: "openid  profile".into(),
        };
        assert_eq!(consent.scopes().len(), 2);
    }
}
