/*
 * Responsibility
 * - 環境変数 (.env 含む) からの設定読み込み
 * - 値のバリデーション (不足・不正なら起動失敗)
 * - IdentifierConfig / LdapSettings への変換
 */
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use axum::http::HeaderName;
use url::Url;

use crate::backends::ldap::attributes::UserAttribute;
use crate::backends::ldap::config::{
    DEFAULT_RATE_BURST, DEFAULT_RATE_LIMIT, DEFAULT_TIMEOUT_SECONDS, LdapConfig, LdapConfigError,
    LdapSettings,
};
use crate::identifier::{
    CookieSettings, DEFAULT_CONSENT_TTL, DEFAULT_LOGON_COOKIE_NAME, DEFAULT_SESSION_TTL,
    DEFAULT_TRUSTED_PROXY_USER_HEADER, IdentifierConfig,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    fn parse(raw: Option<&str>) -> Self {
        match raw.unwrap_or("development").to_ascii_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing configuration: {}", key),
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
        }
    }
}

impl std::error::Error for ConfigError {}

const LDAP_ATTRIBUTE_KEYS: [(UserAttribute, &str); 6] = [
    (UserAttribute::Login, "LDAP_LOGIN_ATTRIBUTE"),
    (UserAttribute::Email, "LDAP_EMAIL_ATTRIBUTE"),
    (UserAttribute::Name, "LDAP_NAME_ATTRIBUTE"),
    (UserAttribute::FamilyName, "LDAP_FAMILY_NAME_ATTRIBUTE"),
    (UserAttribute::GivenName, "LDAP_GIVEN_NAME_ATTRIBUTE"),
    (UserAttribute::Uuid, "LDAP_UUID_ATTRIBUTE"),
];

#[derive(Clone, Debug)]
pub struct Config {
    pub addr: SocketAddr,
    pub app_env: AppEnv,
    pub issuer: Url,
    pub authorization_endpoint: String,
    // Ticket key material; None means a random key per process.
    pub encryption_secret: Option<String>,
    pub logon_cookie_name: String,
    pub cookie_path: String,
    pub cookie_insecure: bool,
    pub session_ttl: Duration,
    pub consent_ttl: Duration,
    pub trusted_proxy_user_header: Option<HeaderName>,
    pub clients_file: Option<PathBuf>,
    pub static_dir: Option<PathBuf>,
    pub static_cache: bool,
    pub ldap: LdapSettings,
}

/// Key/value source the configuration is read from.
struct Vars<F>(F);

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Trimmed value; empty counts as unset.
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn required(&self, key: &'static str) -> Result<String, ConfigError> {
        self.get(key).ok_or(ConfigError::Missing(key))
    }

    fn parsed<T: FromStr>(&self, key: &'static str, default: T) -> Result<T, ConfigError> {
        match self.get(key) {
            Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid(key)),
            None => Ok(default),
        }
    }

    fn flag(&self, key: &'static str, default: bool) -> Result<bool, ConfigError> {
        match self.get(key).map(|raw| raw.to_ascii_lowercase()).as_deref() {
            None => Ok(default),
            Some("1" | "true" | "yes" | "on") => Ok(true),
            Some("0" | "false" | "no" | "off") => Ok(false),
            Some(_) => Err(ConfigError::Invalid(key)),
        }
    }

    fn seconds(&self, key: &'static str, default: Duration) -> Result<Duration, ConfigError> {
        let secs: u64 = self.parsed(key, default.as_secs())?;
        if secs == 0 {
            return Err(ConfigError::Invalid(key));
        }
        Ok(Duration::from_secs(secs))
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(lookup);

        let port: u16 = vars.parsed("PORT", 3000)?;
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let app_env = AppEnv::parse(vars.get("APP_ENV").as_deref());

        let issuer = Url::parse(&vars.required("IDENTIFIER_ISSUER")?)
            .map_err(|_| ConfigError::Invalid("IDENTIFIER_ISSUER"))?;
        let authorization_endpoint = match vars.get("IDENTIFIER_AUTHORIZATION_ENDPOINT") {
            Some(endpoint) => {
                Url::parse(&endpoint)
                    .map_err(|_| ConfigError::Invalid("IDENTIFIER_AUTHORIZATION_ENDPOINT"))?;
                endpoint
            }
            None => format!("{}/authorize", issuer.as_str().trim_end_matches('/')),
        };

        // Unset falls back to the default header, set-but-empty disables it.
        let trusted_proxy_user_header = match (vars.0)("IDENTIFIER_TRUSTED_PROXY_USER_HEADER") {
            None => Some(HeaderName::from_static(DEFAULT_TRUSTED_PROXY_USER_HEADER)),
            Some(raw) if raw.trim().is_empty() => None,
            Some(raw) => Some(
                HeaderName::from_str(raw.trim())
                    .map_err(|_| ConfigError::Invalid("IDENTIFIER_TRUSTED_PROXY_USER_HEADER"))?,
            ),
        };

        let logon_cookie_name = vars
            .get("IDENTIFIER_LOGON_COOKIE_NAME")
            .unwrap_or_else(|| DEFAULT_LOGON_COOKIE_NAME.to_string());
        if !logon_cookie_name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
        {
            return Err(ConfigError::Invalid("IDENTIFIER_LOGON_COOKIE_NAME"));
        }
        let cookie_path = vars
            .get("IDENTIFIER_COOKIE_PATH")
            .unwrap_or_else(|| CookieSettings::default().path);
        if !cookie_path.starts_with('/') {
            return Err(ConfigError::Invalid("IDENTIFIER_COOKIE_PATH"));
        }

        Ok(Config {
            addr,
            app_env,
            issuer,
            authorization_endpoint,
            encryption_secret: vars.get("IDENTIFIER_ENCRYPTION_SECRET"),
            logon_cookie_name,
            cookie_path,
            cookie_insecure: vars.flag("IDENTIFIER_COOKIE_INSECURE", false)?,
            session_ttl: vars.seconds("IDENTIFIER_SESSION_TTL_SECONDS", DEFAULT_SESSION_TTL)?,
            consent_ttl: vars.seconds("IDENTIFIER_CONSENT_TTL_SECONDS", DEFAULT_CONSENT_TTL)?,
            trusted_proxy_user_header,
            clients_file: vars.get("IDENTIFIER_CLIENTS_FILE").map(PathBuf::from),
            static_dir: vars.get("IDENTIFIER_STATIC_DIR").map(PathBuf::from),
            static_cache: vars.flag("IDENTIFIER_STATIC_CACHE", true)?,
            ldap: ldap_settings(&vars)?,
        })
    }

    pub fn identifier_config(&self) -> IdentifierConfig {
        IdentifierConfig {
            logon_cookie_name: self.logon_cookie_name.clone(),
            cookie: CookieSettings {
                path: self.cookie_path.clone(),
                secure: !self.cookie_insecure,
            },
            session_ttl: self.session_ttl,
            consent_ttl: self.consent_ttl,
            trusted_proxy_user_header: self.trusted_proxy_user_header.clone(),
            authorization_endpoint: self.authorization_endpoint.clone(),
        }
    }
}

fn ldap_settings<F>(vars: &Vars<F>) -> Result<LdapSettings, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let config = LdapConfig {
        uri: vars.required("LDAP_URI")?,
        bind_dn: vars.get("LDAP_BINDDN").unwrap_or_default(),
        bind_password: vars.get("LDAP_BINDPW").unwrap_or_default(),
        base_dn: vars.required("LDAP_BASEDN")?,
        scope: vars.get("LDAP_SCOPE").unwrap_or_default(),
        filter: vars.get("LDAP_FILTER").unwrap_or_default(),
        attribute_overrides: LDAP_ATTRIBUTE_KEYS
            .iter()
            .filter_map(|(attr, key)| vars.get(key).map(|name| (*attr, name)))
            .collect(),
        uuid_value_type: vars.get("LDAP_UUID_ATTRIBUTE_TYPE").unwrap_or_default(),
        sub_attributes: vars
            .get("LDAP_SUB_ATTRIBUTES")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
        tls_insecure_skip_verify: vars.flag("LDAP_TLS_INSECURE_SKIP_VERIFY", false)?,
        timeout_seconds: vars.parsed("LDAP_TIMEOUT_SECONDS", DEFAULT_TIMEOUT_SECONDS)?,
        rate_limit: vars.parsed("LDAP_RATE_LIMIT", DEFAULT_RATE_LIMIT)?,
        rate_burst: vars.parsed("LDAP_RATE_BURST", DEFAULT_RATE_BURST)?,
    };

    LdapSettings::from_config(&config).map_err(|err| {
        tracing::error!(error = %err, "invalid ldap configuration");
        ConfigError::Invalid(ldap_config_key(&err))
    })
}

fn ldap_config_key(err: &LdapConfigError) -> &'static str {
    match err {
        LdapConfigError::EmptyServer
        | LdapConfigError::InvalidUri(_)
        | LdapConfigError::UnsupportedScheme(_)
        | LdapConfigError::MissingHost => "LDAP_URI",
        LdapConfigError::BindPasswordWithoutDn => "LDAP_BINDDN",
        LdapConfigError::EmptyBaseDn => "LDAP_BASEDN",
        LdapConfigError::UnknownScope(_) => "LDAP_SCOPE",
        LdapConfigError::ValueType(_) => "LDAP_UUID_ATTRIBUTE_TYPE",
        LdapConfigError::InvalidLimits => "LDAP_TIMEOUT_SECONDS / LDAP_RATE_LIMIT / LDAP_RATE_BURST",
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::backends::ldap::directory::SearchScope;

    fn load(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let mut vars: HashMap<String, String> = [
            ("IDENTIFIER_ISSUER", "https://id.example.org/"),
            ("LDAP_URI", "ldap://directory.example.org"),
            ("LDAP_BASEDN", "dc=example,dc=org"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        for (k, v) in pairs {
            vars.insert(k.to_string(), v.to_string());
        }
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn minimal_environment_uses_defaults() -> Result<(), ConfigError> {
        let config = load(&[])?;

        assert_eq!(config.addr.port(), 3000);
        assert_eq!(config.app_env, AppEnv::Development);
        assert_eq!(config.authorization_endpoint, "https://id.example.org/authorize");
        assert_eq!(config.logon_cookie_name, DEFAULT_LOGON_COOKIE_NAME);
        assert_eq!(config.session_ttl, DEFAULT_SESSION_TTL);
        assert!(config.static_cache);
        assert!(config.encryption_secret.is_none());
        assert_eq!(
            config.trusted_proxy_user_header.as_ref().map(HeaderName::as_str),
            Some("x-forwarded-user")
        );
        assert_eq!(config.ldap.url, "ldap://directory.example.org:389");
        assert_eq!(config.ldap.scope, SearchScope::Subtree);
        Ok(())
    }

    #[test]
    fn required_values_are_reported_by_name() {
        let vars: HashMap<&str, &str> = HashMap::new();
        let err = Config::from_lookup(|key| vars.get(key).map(|v| v.to_string()));
        assert_eq!(err.err(), Some(ConfigError::Missing("IDENTIFIER_ISSUER")));

        let err = load(&[("LDAP_BASEDN", " ")]);
        assert_eq!(err.err(), Some(ConfigError::Missing("LDAP_BASEDN")));
    }

    #[test]
    fn empty_proxy_header_disables_proxy_trust() -> Result<(), ConfigError> {
        let config = load(&[("IDENTIFIER_TRUSTED_PROXY_USER_HEADER", "")])?;
        assert!(config.trusted_proxy_user_header.is_none());

        let config = load(&[("IDENTIFIER_TRUSTED_PROXY_USER_HEADER", "X-Remote-User")])?;
        assert_eq!(
            config.identifier_config().trusted_proxy_user_header,
            Some(HeaderName::from_static("x-remote-user"))
        );
        Ok(())
    }

    #[test]
    fn cookie_settings_follow_environment() -> Result<(), ConfigError> {
        let config = load(&[
            ("IDENTIFIER_COOKIE_INSECURE", "true"),
            ("IDENTIFIER_COOKIE_PATH", "/identifier"),
            ("IDENTIFIER_SESSION_TTL_SECONDS", "600"),
        ])?;
        let identifier = config.identifier_config();

        assert!(!identifier.cookie.secure);
        assert_eq!(identifier.cookie.path, "/identifier");
        assert_eq!(identifier.session_ttl, Duration::from_secs(600));
        Ok(())
    }

    #[test]
    fn malformed_values_fail_startup() {
        assert_eq!(
            load(&[("PORT", "http")]).err(),
            Some(ConfigError::Invalid("PORT"))
        );
        assert_eq!(
            load(&[("IDENTIFIER_COOKIE_INSECURE", "maybe")]).err(),
            Some(ConfigError::Invalid("IDENTIFIER_COOKIE_INSECURE"))
        );
        assert_eq!(
            load(&[("IDENTIFIER_SESSION_TTL_SECONDS", "0")]).err(),
            Some(ConfigError::Invalid("IDENTIFIER_SESSION_TTL_SECONDS"))
        );
        assert_eq!(
            load(&[("LDAP_SCOPE", "everything")]).err(),
            Some(ConfigError::Invalid("LDAP_SCOPE"))
        );
        assert_eq!(
            load(&[("LDAP_URI", "http://directory.example.org")]).err(),
            Some(ConfigError::Invalid("LDAP_URI"))
        );
        assert_eq!(
            load(&[("LDAP_BINDPW", "secret")]).err(),
            Some(ConfigError::Invalid("LDAP_BINDDN"))
        );
    }

    #[test]
    fn unusable_ldap_rate_limits_fail_startup() {
        for rate in ["NaN", "inf", "1e-300", "0"] {
            assert_eq!(
                load(&[("LDAP_RATE_LIMIT", rate)]).err(),
                Some(ConfigError::Invalid(
                    "LDAP_TIMEOUT_SECONDS / LDAP_RATE_LIMIT / LDAP_RATE_BURST"
                )),
                "LDAP_RATE_LIMIT={rate}"
            );
        }
    }

    #[test]
    fn ldap_mapping_overrides_and_sub_attributes() -> Result<(), ConfigError> {
        let config = load(&[
            ("LDAP_LOGIN_ATTRIBUTE", "sAMAccountName"),
            ("LDAP_SUB_ATTRIBUTES", "uidNumber, ,gidNumber"),
            ("LDAP_SCOPE", "one"),
        ])?;

        assert_eq!(
            config.ldap.mapping.wire_name(UserAttribute::Login),
            Some("sAMAccountName")
        );
        assert_eq!(config.ldap.scope, SearchScope::OneLevel);
        Ok(())
    }
}
