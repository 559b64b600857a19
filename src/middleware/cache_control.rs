//! Cache headers.
//!
//! Identifier endpoints answer with per-user state and must never be cached.
//! Static assets are either cached for a long time or always revalidated.
use axum::Router;
use axum::extract::{Request, State};
use axum::http::header::{self, HeaderValue};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tower_http::set_header::SetResponseHeaderLayer;

pub const NO_STORE: &str = "no-cache, no-store, must-revalidate";
pub const STATIC_LONG_LIVED: &str = "max-age=3153600, public";
pub const STATIC_REVALIDATE: &str = "no-cache, max-age=0, public";

/// Strict no-store headers on every response of `router`.
pub fn no_store<S>(router: Router<S>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static(NO_STORE),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::PRAGMA,
            HeaderValue::from_static("no-cache"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::EXPIRES,
            HeaderValue::from_static("0"),
        ))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticCachePolicy {
    pub long_lived: bool,
}

impl StaticCachePolicy {
    pub fn header_value(self) -> HeaderValue {
        if self.long_lived {
            HeaderValue::from_static(STATIC_LONG_LIVED)
        } else {
            HeaderValue::from_static(STATIC_REVALIDATE)
        }
    }
}

/// Folder paths answer 404 instead of a listing or index; everything else
/// gets the configured cache header.
pub async fn static_assets(
    State(policy): State<StaticCachePolicy>,
    req: Request,
    next: Next,
) -> Response {
    if req.uri().path().ends_with('/') {
        return StatusCode::NOT_FOUND.into_response();
    }

    let mut response = next.run(req).await;
    if response.status().is_success() {
        response
            .headers_mut()
            .insert(header::CACHE_CONTROL, policy.header_value());
    }
    response
}
