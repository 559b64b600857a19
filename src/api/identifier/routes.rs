use axum::{Router, middleware, routing::post};

use crate::api::identifier::handlers::{
    consent::consent, hello::hello, logoff::logoff, logon::logon,
};
use crate::middleware::{cache_control, xsrf};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    let router = Router::new()
        .route("/logon", post(logon))
        .route("/logoff", post(logoff))
        .route("/consent", post(consent))
        .route("/hello", post(hello))
        .layer(middleware::from_fn(xsrf::require_same_origin));

    cache_control::no_store(router)
}
