/*
 * Responsibility
 * - AppError: the HTTP-facing error of every identifier endpoint
 * - IntoResponse with a generic JSON body; handlers log the detail
 * - Conversion from orchestrator and extractor errors
 */
use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::identifier::IdentifierError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: &'static str,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("bad request")]
    BadRequest,
    #[error("internal server error")]
    Internal,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest => StatusCode::BAD_REQUEST,
            AppError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (code, message) = match self {
            AppError::BadRequest => ("BAD_REQUEST", "bad request"),
            AppError::Internal => ("INTERNAL", "internal server error"),
        };

        let body = ErrorResponse {
            error: ErrorBody { code, message },
        };

        (self.status(), Json(body)).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!(error = %rejection.body_text(), "failed to decode request body");
        AppError::BadRequest
    }
}

impl From<IdentifierError> for AppError {
    fn from(e: IdentifierError) -> Self {
        match e {
            // Unknown client or unregistered redirect URI.
            IdentifierError::Client(_) => AppError::BadRequest,
            _ => AppError::Internal,
        }
    }
}
