/*
 * Responsibility
 * - /identifier/_ のリクエスト / レスポンス JSON 型
 * - 文字列 or 配列で届く prompt / scope の吸収
 * - orchestrator の型への変換 (parse)
 */
use serde::{Deserialize, Serialize};

use crate::identifier::request::RequestError;
use crate::identifier::{Consent, HelloRequest, HelloResponse, LogonParams};

/// A space separated string or a list of them.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum SpaceSeparated {
    One(String),
    Many(Vec<String>),
}

impl SpaceSeparated {
    fn values(&self) -> Vec<&str> {
        match self {
            SpaceSeparated::One(value) => vec![value.as_str()],
            SpaceSeparated::Many(values) => values.iter().map(String::as_str).collect(),
        }
    }
}

fn values(field: &Option<SpaceSeparated>) -> Vec<&str> {
    field.as_ref().map(SpaceSeparated::values).unwrap_or_default()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HelloRequestBody {
    #[serde(default)]
    pub state: String,
    #[serde(default, alias = "prompts")]
    pub prompt: Option<SpaceSeparated>,
    #[serde(default)]
    pub flow: String,
    #[serde(default, alias = "scopes")]
    pub scope: Option<SpaceSeparated>,
    #[serde(rename = "clientID", default)]
    pub client_id: String,
    #[serde(rename = "redirectURI", default)]
    pub redirect_uri: String,
}

impl HelloRequestBody {
    pub fn parse(&self) -> Result<HelloRequest, RequestError> {
        HelloRequest::parse(
            self.state.clone(),
            values(&self.prompt),
            &self.flow,
            values(&self.scope),
            self.client_id.clone(),
            self.redirect_uri.clone(),
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogonRequest {
    #[serde(default)]
    pub state: String,
    /// `[username, password, mode]`
    #[serde(default)]
    pub params: Vec<String>,
    #[serde(default)]
    pub hello: Option<HelloRequestBody>,
}

impl LogonRequest {
    pub fn params(&self) -> LogonParams {
        LogonParams::from_params(self.params.clone())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConsentRequest {
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub allow: bool,
    #[serde(rename = "rawScope", default)]
    pub raw_scope: String,
    #[serde(rename = "clientID", default)]
    pub client_id: String,
    #[serde(rename = "redirectURI", default)]
    pub redirect_uri: String,
}

impl ConsentRequest {
    pub fn consent(&self) -> Consent {
        Consent {
            allow: self.allow,
            raw_scope: self.raw_scope.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StateRequest {
    #[serde(default)]
    pub state: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StateResponse {
    pub state: String,
    pub success: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogonResponse {
    pub state: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hello: Option<HelloResponse>,
}
