/*
 * Responsibility
 * - POST /identifier/_/logoff
 * - session cookie を削除して 200 {state, success}
 */
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::HeaderMap,
    response::Response,
};

use super::{failed, json_with_cookies};
use crate::api::identifier::dto::{StateRequest, StateResponse};
use crate::error::AppError;
use crate::identifier::ResponseCookies;
use crate::state::AppState;

pub async fn logoff(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<StateRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(req) = payload?;

    let mut cookies = ResponseCookies::new();
    state
        .identifier
        .logoff(&headers, &mut cookies)
        .await
        .map_err(failed("logoff", &headers))?;

    Ok(json_with_cookies(
        StateResponse {
            state: req.state,
            success: true,
        },
        cookies,
    ))
}
