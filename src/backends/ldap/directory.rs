//! Directory transport seam.
//!
//! The backend talks to the directory server through [`DirectoryConnector`]
//! and [`DirectoryConnection`]. Production uses `ldap3` (see `connection.rs`),
//! tests plug in an in-memory directory.
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::backends::BackendError;

pub const RESULT_SIZE_LIMIT_EXCEEDED: u32 = 4;
pub const RESULT_NO_SUCH_OBJECT: u32 = 32;
pub const RESULT_INVALID_CREDENTIALS: u32 = 49;

#[derive(Debug, Error)]
pub enum DirectoryError {
    /// The server answered with a non-success result code.
    #[error("ldap result code {code}: {message}")]
    Result { code: u32, message: String },
    #[error("ldap network error: {0}")]
    Network(String),
}

impl DirectoryError {
    pub fn is_code(&self, code: u32) -> bool {
        matches!(self, DirectoryError::Result { code: c, .. } if *c == code)
    }
}

impl From<DirectoryError> for BackendError {
    fn from(e: DirectoryError) -> Self {
        match e {
            DirectoryError::Network(message) => BackendError::Unavailable(message),
            result @ DirectoryError::Result { .. } => BackendError::Protocol(result.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchScope {
    Base,
    OneLevel,
    Subtree,
}

#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub base: String,
    pub scope: SearchScope,
    pub filter: String,
    pub attributes: Vec<String>,
    pub size_limit: i32,
    pub time_limit: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DirectoryAttribute {
    pub name: String,
    pub values: Vec<Vec<u8>>,
}

/// A single search result entry with raw attribute values.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectoryEntry {
    pub dn: String,
    pub attributes: Vec<DirectoryAttribute>,
}

impl DirectoryEntry {
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            attributes: Vec::new(),
        }
    }

    pub fn with_text(mut self, name: &str, values: &[&str]) -> Self {
        self.attributes.push(DirectoryAttribute {
            name: name.to_string(),
            values: values.iter().map(|v| v.as_bytes().to_vec()).collect(),
        });
        self
    }

    pub fn with_binary(mut self, name: &str, value: Vec<u8>) -> Self {
        self.attributes.push(DirectoryAttribute {
            name: name.to_string(),
            values: vec![value],
        });
        self
    }

    /// Attribute descriptors are case-insensitive (RFC 4512 section 2.5).
    pub fn attribute(&self, name: &str) -> Option<&DirectoryAttribute> {
        self.attributes
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
    }

    pub fn text_values(&self, name: &str) -> Vec<String> {
        self.attribute(name)
            .map(|a| {
                a.values
                    .iter()
                    .map(|v| String::from_utf8_lossy(v).into_owned())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn first_text(&self, name: &str) -> Option<String> {
        self.text_values(name).into_iter().next()
    }
}

/// Opens one connection per logical backend operation.
#[async_trait]
pub trait DirectoryConnector: Send + Sync {
    /// Dial, optionally negotiate TLS, and perform the protocol handshake.
    async fn connect(&self) -> Result<Box<dyn DirectoryConnection>, DirectoryError>;
}

#[async_trait]
pub trait DirectoryConnection: Send {
    async fn simple_bind(&mut self, dn: &str, password: &str) -> Result<(), DirectoryError>;

    async fn search(&mut self, request: &SearchRequest)
    -> Result<Vec<DirectoryEntry>, DirectoryError>;

    /// Unbind and drop the transport. Errors are not interesting at this point.
    async fn close(&mut self);
}
