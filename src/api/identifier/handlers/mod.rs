/*
 * Responsibility
 * - identifier エンドポイントの handler
 * - 共通のレスポンス組み立て (Set-Cookie / 204 + state header)
 * - orchestrator エラーのログ (operation / host / user-agent 付き)
 */
use axum::{
    Json,
    http::{
        HeaderMap, HeaderName, HeaderValue, StatusCode,
        header::{HOST, USER_AGENT},
    },
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::api::identifier::STATE_HEADER;
use crate::error::AppError;
use crate::identifier::{IdentifierError, ResponseCookies};

pub mod consent;
pub mod hello;
pub mod logoff;
pub mod logon;

/// 204 with the request state echoed in a header.
fn no_content(state: &str, cookies: ResponseCookies) -> Response {
    let mut headers = cookies.into_headers();
    match HeaderValue::from_str(state) {
        Ok(value) => {
            headers.insert(HeaderName::from_static(STATE_HEADER), value);
        }
        Err(_) => tracing::debug!("request state not representable as header, omitted"),
    }
    (StatusCode::NO_CONTENT, headers).into_response()
}

fn json_with_cookies<T: Serialize>(body: T, cookies: ResponseCookies) -> Response {
    (cookies.into_headers(), Json(body)).into_response()
}

/// Log an orchestrator failure of `operation` with the caller's host and
/// user agent, then map it to the HTTP error.
fn failed(
    operation: &'static str,
    headers: &HeaderMap,
) -> impl FnOnce(IdentifierError) -> AppError + use<> {
    let host = header_string(headers, HOST);
    let user_agent = header_string(headers, USER_AGENT);
    move |err| {
        match &err {
            IdentifierError::Client(_) => tracing::debug!(
                operation,
                host = %host,
                user_agent = %user_agent,
                error = %err,
                "identifier client lookup failed"
            ),
            _ => tracing::error!(
                operation,
                host = %host,
                user_agent = %user_agent,
                error = %err,
                "identifier request failed"
            ),
        }
        AppError::from(err)
    }
}

fn header_string(headers: &HeaderMap, name: HeaderName) -> String {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string()
}
