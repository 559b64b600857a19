/*
 * Responsibility
 * - POST /identifier/_/consent
 * - allow=true なら consent cookie を発行して 200、拒否は 204
 */
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::HeaderMap,
    response::Response,
};

use super::{failed, json_with_cookies, no_content};
use crate::api::identifier::dto::{ConsentRequest, StateResponse};
use crate::error::AppError;
use crate::identifier::ResponseCookies;
use crate::state::AppState;

pub async fn consent(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<ConsentRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(req) = payload?;

    let mut cookies = ResponseCookies::new();
    let allowed = state
        .identifier
        .consent(
            &req.client_id,
            &req.redirect_uri,
            &req.consent(),
            &mut cookies,
        )
        .map_err(failed("consent", &headers))?;
    if !allowed {
        return Ok(no_content(&req.state, cookies));
    }

    Ok(json_with_cookies(
        StateResponse {
            state: req.state,
            success: true,
        },
        cookies,
    ))
}
