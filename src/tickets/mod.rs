//! Session and consent tickets.
//!
//! A ticket is an opaque, tamper-evident string carrying a JSON payload for
//! one scope (the cookie it lives in). Callers only see [`TicketCodec`].
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

mod sealed;

pub use sealed::{SealedTicketCodec, key_from_secret, random_key};

#[derive(Debug, Error)]
pub enum TicketError {
    #[error("ticket payload encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("random source failed: {0}")]
    Random(String),
    #[error("ticket sealing failed")]
    Seal,
    #[error("ticket is malformed")]
    Malformed,
    /// Tampered, sealed with another key, or sealed for another scope.
    #[error("ticket does not open")]
    Open,
    #[error("ticket expired")]
    Expired,
}

pub trait TicketCodec: Send + Sync {
    fn seal(&self, scope: &str, payload: &Value, ttl: Duration) -> Result<String, TicketError>;

    fn unseal(&self, scope: &str, token: &str) -> Result<Value, TicketError>;
}
