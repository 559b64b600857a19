//! Ordered identity resolution.
//!
//! Pure classifiers, no I/O. The orchestrator gathers the inputs (cookie,
//! proxy header, posted params) and acts on the outcome.
use super::request::LogonParams;

/// Where an identity came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdentitySource {
    #[default]
    Anonymous,
    /// Handed in by the caller, e.g. a logon that just completed.
    Known,
    CookieValid,
    ProxyAsserted,
    CredentialChecked,
}

/// Inputs to a logon decision.
#[derive(Debug, Clone, Copy)]
pub struct LogonInputs<'a> {
    pub params: &'a LogonParams,
    /// Username from a valid session cookie, if one was presented.
    pub cookie_username: Option<&'a str>,
    /// Value of the trusted proxy user header, if present.
    pub proxy_user: Option<&'a str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogonDecision {
    /// Same user already has a session, no backend call needed.
    ReuseCookie,
    /// The proxy vouches for the posted username; fetch the profile.
    ResolveProxyUser,
    CheckCredentials,
    Anonymous,
}

impl LogonDecision {
    /// First matching branch wins.
    pub fn classify(inputs: LogonInputs<'_>) -> Self {
        let LogonParams {
            username,
            password,
            mode,
        } = inputs.params;

        if username.is_empty() {
            return LogonDecision::Anonymous;
        }

        if password.is_empty()
            && mode == LogonParams::MODE_PASSIVE
            && inputs.cookie_username == Some(username.as_str())
        {
            return LogonDecision::ReuseCookie;
        }

        if let Some(proxy_user) = inputs.proxy_user {
            return if proxy_user == username {
                LogonDecision::ResolveProxyUser
            } else {
                LogonDecision::Anonymous
            };
        }

        if password.is_empty() {
            return LogonDecision::Anonymous;
        }
        LogonDecision::CheckCredentials
    }

    /// Whether the session cookie matters for this request at all.
    pub fn wants_cookie(params: &LogonParams) -> bool {
        params.password.is_empty() && params.mode == LogonParams::MODE_PASSIVE
    }

    pub fn source(self) -> IdentitySource {
        match self {
            LogonDecision::ReuseCookie => IdentitySource::CookieValid,
            LogonDecision::ResolveProxyUser => IdentitySource::ProxyAsserted,
            LogonDecision::CheckCredentials => IdentitySource::CredentialChecked,
            LogonDecision::Anonymous => IdentitySource::Anonymous,
        }
    }
}

/// Which implicit source a hello may use, given what is available.
/// `prompt_login` disables all of them.
pub fn hello_source(
    prompt_login: bool,
    known: bool,
    cookie: bool,
    proxy: bool,
) -> IdentitySource {
    match (prompt_login, known, cookie, proxy) {
        (true, ..) => IdentitySource::Anonymous,
        (_, true, ..) => IdentitySource::Known,
        (_, _, true, _) => IdentitySource::CookieValid,
        (_, _, _, true) => IdentitySource::ProxyAsserted,
        _ => IdentitySource::Anonymous,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(username: &str, password: &str, mode: &str) -> LogonParams {
        LogonParams {
            username: username.into(),
            password: password.into(),
            mode: mode.into(),
        }
    }

    fn classify(p: &LogonParams, cookie: Option<&str>, proxy: Option<&str>) -> LogonDecision {
        LogonDecision::classify(LogonInputs {
            params: p,
            cookie_username: cookie,
            proxy_user: proxy,
        })
    }

    #[test]
    fn passive_reuse_needs_matching_cookie() {
        let p = params("alice", "", "1");
        assert_eq!(classify(&p, Some("alice"), None), LogonDecision::ReuseCookie);
        assert_eq!(classify(&p, Some("bob"), None), LogonDecision::Anonymous);
        assert_eq!(classify(&p, None, None), LogonDecision::Anonymous);

        let not_passive = params("alice", "", "");
        assert_eq!(
            classify(&not_passive, Some("alice"), None),
            LogonDecision::Anonymous
        );
    }

    #[test]
    fn proxy_assertion_beats_credentials() {
        let p = params("alice", "secret", "1");
        assert_eq!(
            classify(&p, None, Some("alice")),
            LogonDecision::ResolveProxyUser
        );
        assert_eq!(classify(&p, None, Some("bob")), LogonDecision::Anonymous);
    }

    #[test]
    fn cookie_reuse_beats_proxy() {
        let p = params("alice", "", "1");
        assert_eq!(
            classify(&p, Some("alice"), Some("bob")),
            LogonDecision::ReuseCookie
        );
    }

    #[test]
    fn password_decides_the_rest() {
        assert_eq!(
            classify(&params("alice", "secret", ""), None, None),
            LogonDecision::CheckCredentials
        );
        assert_eq!(
            classify(&params("alice", "", ""), None, None),
            LogonDecision::Anonymous
        );
        assert_eq!(
            classify(&params("", "secret", "1"), None, None),
            LogonDecision::Anonymous
        );
    }

    #[test]
    fn decisions_map_to_sources() {
        assert_eq!(
            LogonDecision::CheckCredentials.source(),
            IdentitySource::CredentialChecked
        );
        assert_eq!(
            LogonDecision::ReuseCookie.source(),
            IdentitySource::CookieValid
        );
    }

    #[test]
    fn hello_source_order() {
        assert_eq!(hello_source(false, true, true, true), IdentitySource::Known);
        assert_eq!(
            hello_source(false, false, true, true),
            IdentitySource::CookieValid
        );
        assert_eq!(
            hello_source(false, false, false, true),
            IdentitySource::ProxyAsserted
        );
        assert_eq!(
            hello_source(true, true, true, true),
            IdentitySource::Anonymous
        );
        assert_eq!(
            hello_source(false, false, false, false),
            IdentitySource::Anonymous
        );
    }
}
