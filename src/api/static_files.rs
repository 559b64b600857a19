/*
 * Responsibility
 * - 静的ファイル配信 (ServeDir)
 * - フォルダ URL は 404、キャッシュヘッダは設定に従う
 */
use std::path::Path;

use axum::{Router, middleware};
use tower_http::services::ServeDir;

use crate::middleware::cache_control::{StaticCachePolicy, static_assets};

pub fn routes(dir: &Path, policy: StaticCachePolicy) -> Router {
    Router::new()
        .fallback_service(ServeDir::new(dir))
        .layer(middleware::from_fn_with_state(policy, static_assets))
}
