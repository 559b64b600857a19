//! Parsed identifier requests.
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid {field} value {value:?}")]
pub struct RequestError {
    pub field: &'static str,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Prompt {
    None,
    Login,
    Consent,
    SelectAccount,
}

impl FromStr for Prompt {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Prompt::None),
            "login" => Ok(Prompt::Login),
            "consent" => Ok(Prompt::Consent),
            "select_account" => Ok(Prompt::SelectAccount),
            other => Err(RequestError {
                field: "prompt",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Flow {
    #[serde(rename = "oauth")]
    OAuth,
    Oidc,
    Consent,
}

impl FromStr for Flow {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "oauth" => Ok(Flow::OAuth),
            "oidc" => Ok(Flow::Oidc),
            "consent" => Ok(Flow::Consent),
            other => Err(RequestError {
                field: "flow",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Flow::OAuth => "oauth",
            Flow::Oidc => "oidc",
            Flow::Consent => "consent",
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HelloRequest {
    pub state: String,
    pub prompts: HashSet<Prompt>,
    pub flow: Option<Flow>,
    pub scopes: BTreeSet<String>,
    pub client_id: String,
    pub redirect_uri: String,
}

impl HelloRequest {
    /// Build from wire values. Prompt and scope entries may themselves be
    /// space separated. Unrecognised prompts are skipped; an unknown flow
    /// is an error.
    pub fn parse<'a>(
        state: String,
        prompts: impl IntoIterator<Item = &'a str>,
        flow: &str,
        scopes: impl IntoIterator<Item = &'a str>,
        client_id: String,
        redirect_uri: String,
    ) -> Result<Self, RequestError> {
        let prompts = prompts
            .into_iter()
            .flat_map(str::split_whitespace)
            .filter_map(|prompt| match prompt.parse::<Prompt>() {
                Ok(prompt) => Some(prompt),
                Err(err) => {
                    debug!(error = %err, "identifier ignoring prompt");
                    None
                }
            })
            .collect();

        let flow = match flow.trim() {
            "" => None,
            flow => Some(flow.parse()?),
        };

        let scopes = scopes
            .into_iter()
            .flat_map(str::split_whitespace)
            .map(str::to_string)
            .collect();

        Ok(Self {
            state,
            prompts,
            flow,
            scopes,
            client_id,
            redirect_uri,
        })
    }

    pub fn has_prompt(&self, prompt: Prompt) -> bool {
        self.prompts.contains(&prompt)
    }
}

/// `[username, password, mode]` as posted by the sign-in form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogonParams {
    pub username: String,
    pub password: String,
    pub mode: String,
}

impl LogonParams {
    /// Mode value asking to reuse an existing session for the same user.
    pub const MODE_PASSIVE: &'static str = "1";

    pub fn from_params(params: Vec<String>) -> Self {
        let mut params = params.into_iter();
        Self {
            username: params.next().unwrap_or_default(),
            password: params.next().unwrap_or_default(),
            mode: params.next().unwrap_or_default(),
        }
    }
}
