//! Directory backend settings.
//!
//! `LdapConfig` holds the raw values read from the environment,
//! `LdapSettings` the validated form the backend runs with.
use std::collections::BTreeMap;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use super::attributes::{AttributeMapping, UnknownValueType, UserAttribute, ValueType};
use super::directory::SearchScope;
use super::entry_id::EntryIdScheme;

pub const DEFAULT_FILTER: &str = "(objectClass=inetOrgPerson)";
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 60;
pub const DEFAULT_RATE_LIMIT: f64 = 100.0;
pub const DEFAULT_RATE_BURST: u32 = 200;
/// One directory operation per 1000 seconds.
pub const MIN_RATE_LIMIT: f64 = 0.001;

#[derive(Debug, Error)]
pub enum LdapConfigError {
    #[error("server must not be empty")]
    EmptyServer,
    #[error("invalid server URI: {0}")]
    InvalidUri(#[from] url::ParseError),
    #[error("invalid URI scheme: {0}")]
    UnsupportedScheme(String),
    #[error("server URI has no host")]
    MissingHost,
    #[error("bind DN must not be empty when bind password is given")]
    BindPasswordWithoutDn,
    #[error("base DN must not be empty")]
    EmptyBaseDn,
    #[error("unknown scope value: {0}, must be one of sub, one or base")]
    UnknownScope(String),
    #[error(transparent)]
    ValueType(#[from] UnknownValueType),
    #[error("timeout and burst must be positive, rate limit finite and at least 0.001")]
    InvalidLimits,
}

#[derive(Debug, Clone, Default)]
pub struct LdapConfig {
    pub uri: String,
    pub bind_dn: String,
    pub bind_password: String,
    pub base_dn: String,
    pub scope: String,
    pub filter: String,
    pub attribute_overrides: BTreeMap<UserAttribute, String>,
    pub uuid_value_type: String,
    pub sub_attributes: Vec<String>,
    pub tls_insecure_skip_verify: bool,
    pub timeout_seconds: u64,
    pub rate_limit: f64,
    pub rate_burst: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindCredentials {
    pub dn: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct LdapSettings {
    /// Normalized `scheme://host:port`.
    pub url: String,
    pub is_tls: bool,
    pub tls_insecure_skip_verify: bool,
    pub bind: Option<BindCredentials>,
    pub base_dn: String,
    pub scope: SearchScope,
    /// Base filter, always parenthesized.
    pub filter: String,
    pub mapping: AttributeMapping,
    pub entry_ids: EntryIdScheme,
    pub timeout: Duration,
    pub rate_limit: f64,
    pub rate_burst: u32,
}

impl LdapSettings {
    pub fn from_config(config: &LdapConfig) -> Result<Self, LdapConfigError> {
        let (url, is_tls) = parse_server_uri(&config.uri)?;

        if config.bind_dn.is_empty() && !config.bind_password.is_empty() {
            return Err(LdapConfigError::BindPasswordWithoutDn);
        }
        let bind = (!config.bind_dn.is_empty()).then(|| BindCredentials {
            dn: config.bind_dn.clone(),
            password: config.bind_password.clone(),
        });

        if config.base_dn.trim().is_empty() {
            return Err(LdapConfigError::EmptyBaseDn);
        }

        let scope = match config.scope.trim() {
            "" | "sub" => SearchScope::Subtree,
            "one" => SearchScope::OneLevel,
            "base" => SearchScope::Base,
            other => return Err(LdapConfigError::UnknownScope(other.to_string())),
        };

        let mut mapping = AttributeMapping::default()
            .with_value_type(UserAttribute::Uuid, config.uuid_value_type.parse::<ValueType>()?);
        for (attr, wire_name) in &config.attribute_overrides {
            mapping = mapping.with_override(*attr, wire_name);
        }

        if config.timeout_seconds == 0
            || !config.rate_limit.is_finite()
            || config.rate_limit < MIN_RATE_LIMIT
            || config.rate_burst == 0
        {
            return Err(LdapConfigError::InvalidLimits);
        }

        Ok(Self {
            url,
            is_tls,
            tls_insecure_skip_verify: config.tls_insecure_skip_verify,
            bind,
            base_dn: config.base_dn.trim().to_string(),
            scope,
            filter: normalize_filter(&config.filter),
            mapping,
            entry_ids: EntryIdScheme::from_sub_attributes(&config.sub_attributes),
            timeout: Duration::from_secs(config.timeout_seconds),
            rate_limit: config.rate_limit,
            rate_burst: config.rate_burst,
        })
    }
}

/// Accepts `ldap://`, `ldaps://` or a bare `host[:port]`.
fn parse_server_uri(uri: &str) -> Result<(String, bool), LdapConfigError> {
    let uri = uri.trim();
    if uri.is_empty() {
        return Err(LdapConfigError::EmptyServer);
    }
    let uri = if uri.contains("://") {
        Url::parse(uri)?
    } else {
        Url::parse(&format!("ldap://{uri}"))?
    };

    let (is_tls, default_port) = match uri.scheme() {
        "ldap" => (false, 389),
        "ldaps" => (true, 636),
        other => return Err(LdapConfigError::UnsupportedScheme(other.to_string())),
    };
    let host = uri
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or(LdapConfigError::MissingHost)?;
    let port = uri.port().unwrap_or(default_port);

    Ok((format!("{}://{}:{}", uri.scheme(), host, port), is_tls))
}

fn normalize_filter(filter: &str) -> String {
    let filter = filter.trim();
    if filter.is_empty() {
        DEFAULT_FILTER.to_string()
    } else if filter.starts_with('(') {
        filter.to_string()
    } else {
        format!("({filter})")
    }
}
