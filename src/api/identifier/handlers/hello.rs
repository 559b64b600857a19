/*
 * Responsibility
 * - POST /identifier/_/hello
 * - 識別できれば 200 {state, success, username, next?, ...}、できなければ 204
 * - 読み取った consent cookie の削除 (Set-Cookie)
 */
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::HeaderMap,
    response::Response,
};

use super::{failed, json_with_cookies, no_content};
use crate::api::identifier::dto::HelloRequestBody;
use crate::error::AppError;
use crate::identifier::ResponseCookies;
use crate::state::AppState;

pub async fn hello(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<HelloRequestBody>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(body) = payload?;
    let request = body.parse().map_err(|err| {
        tracing::debug!(error = %err, "identifier failed to parse hello request");
        AppError::BadRequest
    })?;

    let mut cookies = ResponseCookies::new();
    let response = state
        .identifier
        .hello(&headers, &request, None, &mut cookies)
        .await
        .map_err(failed("hello", &headers))?;
    if !response.success {
        return Ok(no_content(&response.state, cookies));
    }

    Ok(json_with_cookies(response, cookies))
}
