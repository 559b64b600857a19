//! Client registry.
//!
//! Resolves an OAuth client ID together with the redirect URI it asked for.
use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("client id is missing")]
    MissingClientId,
    #[error("unknown client {0:?}")]
    UnknownClient(String),
    #[error("redirect uri {redirect_uri:?} not registered for client {client_id:?}")]
    InvalidRedirectUri {
        client_id: String,
        redirect_uri: String,
    },
    #[error("client registry could not be loaded: {0}")]
    Load(String),
}

/// Resolved client registration as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientDetails {
    pub id: String,
    #[serde(rename = "displayName")]
    pub display_name: String,
    #[serde(rename = "redirectURI")]
    pub redirect_uri: String,
    pub trusted: bool,
}

pub trait ClientRegistry: Send + Sync {
    fn lookup(&self, client_id: &str, redirect_uri: &str) -> Result<ClientDetails, ClientError>;
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClientRegistration {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub trusted: bool,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct StaticClientRegistry {
    clients: HashMap<String, ClientRegistration>,
}

impl StaticClientRegistry {
    pub fn new(registrations: Vec<ClientRegistration>) -> Self {
        let clients = registrations
            .into_iter()
            .map(|client| (client.id.clone(), client))
            .collect();
        Self { clients }
    }

    pub fn from_json(raw: &str) -> Result<Self, ClientError> {
        let registrations: Vec<ClientRegistration> =
            serde_json::from_str(raw).map_err(|e| ClientError::Load(e.to_string()))?;
        Ok(Self::new(registrations))
    }

    pub fn from_file(path: &Path) -> Result<Self, ClientError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ClientError::Load(format!("{}: {e}", path.display())))?;
        Self::from_json(&raw)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

impl ClientRegistry for StaticClientRegistry {
    fn lookup(&self, client_id: &str, redirect_uri: &str) -> Result<ClientDetails, ClientError> {
        if client_id.is_empty() {
            return Err(ClientError::MissingClientId);
        }
        let client = self
            .clients
            .get(client_id)
            .ok_or_else(|| ClientError::UnknownClient(client_id.to_string()))?;

        if !client.redirect_uris.iter().any(|uri| uri == redirect_uri) {
            return Err(ClientError::InvalidRedirectUri {
                client_id: client_id.to_string(),
                redirect_uri: redirect_uri.to_string(),
            });
        }

        Ok(ClientDetails {
            id: client.id.clone(),
            display_name: client.name.clone(),
            redirect_uri: redirect_uri.to_string(),
            trusted: client.trusted,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLIENTS: &str = r#"[
        {"id": "portal", "name": "Portal", "trusted": true,
         "redirect_uris": ["https://portal.example.org/cb"]},
        {"id": "thirdparty", "redirect_uris": ["https://app.example.com/cb"]}
    ]"#;

    #[test]
    fn resolves_registered_redirect() -> anyhow::Result<()> {
        let registry = StaticClientRegistry::from_json(CLIENTS)?;
        assert_eq!(registry.len(), 2);

        let details = registry.lookup("portal", "https://portal.example.org/cb")?;
        assert_eq!(details.display_name, "Portal");
        assert!(details.trusted);

        let details = registry.lookup("thirdparty", "https://app.example.com/cb")?;
        assert!(!details.trusted);
        Ok(())
    }

    #[test]
    fn rejects_unknown_clients_and_redirects() -> anyhow::Result<()> {
        let registry = StaticClientRegistry::from_json(CLIENTS)?;
        assert!(matches!(
            registry.lookup("", "https://portal.example.org/cb"),
            Err(ClientError::MissingClientId)
        ));
        assert!(matches!(
            registry.lookup("nope", "https://portal.example.org/cb"),
            Err(ClientError::UnknownClient(_))
        ));
        assert!(matches!(
            registry.lookup("portal", "https://evil.example.net/cb"),
            Err(ClientError::InvalidRedirectUri { .. })
        ));
        Ok(())
    }

    #[test]
    fn details_serialize_in_wire_shape() -> anyhow::Result<()> {
        let registry = StaticClientRegistry::from_json(CLIENTS)?;
        let details = registry.lookup("portal", "https://portal.example.org/cb")?;
        let value = serde_json::to_value(details)?;
        assert_eq!(value["displayName"], "Portal");
        assert_eq!(value["redirectURI"], "https://portal.example.org/cb");
        Ok(())
    }

    #[test]
    fn bad_json_is_a_load_error() {
        assert!(matches!(
            StaticClientRegistry::from_json("{"),
            Err(ClientError::Load(_))
        ));
    }
}
