/*
 * Responsibility
 * - POST /identifier/_/logon
 * - 200 {state, success, hello?} + session cookie、認証できなければ 204
 */
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::HeaderMap,
    response::Response,
};

use super::{failed, json_with_cookies, no_content};
use crate::api::identifier::dto::{HelloRequestBody, LogonRequest, LogonResponse};
use crate::error::AppError;
use crate::identifier::{LogonResult, ResponseCookies};
use crate::state::AppState;

pub async fn logon(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<LogonRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(req) = payload?;

    let hello = req
        .hello
        .as_ref()
        .map(HelloRequestBody::parse)
        .transpose()
        .map_err(|err| {
            tracing::debug!(error = %err, "identifier failed to parse logon request hello");
            AppError::BadRequest
        })?;

    let mut cookies = ResponseCookies::new();
    let result = state
        .identifier
        .logon(&headers, &req.params(), hello.as_ref(), &mut cookies)
        .await
        .map_err(failed("logon", &headers))?;

    Ok(match result {
        LogonResult::NoUser | LogonResult::HelloFailed => no_content(&req.state, cookies),
        LogonResult::Success { hello } => json_with_cookies(
            LogonResponse {
                state: req.state,
                success: true,
                hello,
            },
            cookies,
        ),
    })
}
