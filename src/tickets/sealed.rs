use std::fmt;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use chacha20poly1305::{
    ChaCha20Poly1305, Key, Nonce,
    aead::{Aead, KeyInit, Payload},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use super::{TicketCodec, TicketError};

const NONCE_LEN: usize = 12;

#[derive(Serialize, Deserialize)]
struct Envelope {
    /// Unix seconds after which the ticket is dead.
    exp: i64,
    dat: Value,
}

/// ChaCha20-Poly1305 sealed tickets: `base64url(nonce || ciphertext)`, with
/// the scope as associated data.
#[derive(Clone)]
pub struct SealedTicketCodec {
    cipher: ChaCha20Poly1305,
}

impl fmt::Debug for SealedTicketCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SealedTicketCodec").finish_non_exhaustive()
    }
}

impl SealedTicketCodec {
    pub fn new(key: &[u8; 32]) -> Self {
        Self {
            cipher: ChaCha20Poly1305::new(Key::from_slice(key)),
        }
    }
}

impl TicketCodec for SealedTicketCodec {
    fn seal(&self, scope: &str, payload: &Value, ttl: Duration) -> Result<String, TicketError> {
        let ttl = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        let envelope = Envelope {
            exp: Utc::now().timestamp().saturating_add(ttl),
            dat: payload.clone(),
        };
        let plaintext = serde_json::to_vec(&envelope)?;

        let mut nonce = [0u8; NONCE_LEN];
        getrandom::fill(&mut nonce).map_err(|e| TicketError::Random(e.to_string()))?;

        let ciphertext = self
            .cipher
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: &plaintext,
                    aad: scope.as_bytes(),
                },
            )
            .map_err(|_| TicketError::Seal)?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(URL_SAFE_NO_PAD.encode(sealed))
    }

    fn unseal(&self, scope: &str, token: &str) -> Result<Value, TicketError> {
        let sealed = URL_SAFE_NO_PAD
            .decode(token.trim())
            .map_err(|_| TicketError::Malformed)?;
        if sealed.len() <= NONCE_LEN {
            return Err(TicketError::Malformed);
        }
        let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);

        let plaintext = self
            .cipher
            .decrypt(
                Nonce::from_slice(nonce),
                Payload {
                    msg: ciphertext,
                    aad: scope.as_bytes(),
                },
            )
            .map_err(|_| TicketError::Open)?;

        let envelope: Envelope =
            serde_json::from_slice(&plaintext).map_err(|_| TicketError::Malformed)?;
        if Utc::now().timestamp() >= envelope.exp {
            return Err(TicketError::Expired);
        }
        Ok(envelope.dat)
    }
}

/// 32-byte key from configuration. Base64 or hex encoded 32-byte values are
/// used as is, anything else is stretched with SHA-256.
pub fn key_from_secret(secret: &str) -> [u8; 32] {
    let secret = secret.trim();
    let decoded = [
        STANDARD.decode(secret).ok(),
        URL_SAFE_NO_PAD.decode(secret).ok(),
        hex::decode(secret).ok(),
    ];

    decoded
        .into_iter()
        .flatten()
        .find_map(|bytes| <[u8; 32]>::try_from(bytes).ok())
        .unwrap_or_else(|| Sha256::digest(secret.as_bytes()).into())
}

pub fn random_key() -> Result<[u8; 32], TicketError> {
    let mut key = [0u8; 32];
    getrandom::fill(&mut key).map_err(|e| TicketError::Random(e.to_string()))?;
    Ok(key)
}
