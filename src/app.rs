/*
 * Responsibility
 * - Config 読み込み → 依存生成 (backend / clients / ticket codec) → Router 組み立て
 * - Middleware の適用 (xsrf / cache / security headers / request id / trace)
 * - axum::serve() で起動、Ctrl-C で backend ごと停止
 */
use std::{panic, process, sync::Arc};

use anyhow::Result;
use axum::{Router, routing::get};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api;
use crate::backends::Backend;
use crate::backends::ldap::LdapBackend;
use crate::clients::StaticClientRegistry;
use crate::config::Config;
use crate::identifier::Identifier;
use crate::middleware::{cache_control::StaticCachePolicy, http, security_headers};
use crate::state::AppState;
use crate::tickets::{SealedTicketCodec, key_from_secret, random_key};

fn init_tracing() {
    // RUST_LOG=info,identifier=debug,tower_http=debug
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn init_panic_hook(abort_on_panic: bool) {
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        tracing::error!(?info, "panic");

        // Fail fast in development.
        if abort_on_panic {
            process::abort();
        } else {
            default_hook(info);
        }
    }))
}

pub async fn run() -> Result<()> {
    init_tracing();
    let config = Config::from_env()?;
    init_panic_hook(!config.app_env.is_production());

    tracing::info!(
        "starting identifier in {:?} mode on {}",
        config.app_env,
        config.addr
    );

    let backend: Arc<dyn Backend> = Arc::new(LdapBackend::from_settings(config.ldap.clone()));
    let identifier = Arc::new(build_identifier(&config, backend.clone())?);

    let assets = config.static_dir.as_deref().map(|dir| {
        tracing::info!(dir = %dir.display(), cache = config.static_cache, "serving static files");
        api::static_files::routes(
            dir,
            StaticCachePolicy {
                long_lived: config.static_cache,
            },
        )
    });
    let app = build_router(AppState::new(identifier), assets);

    let cancel = CancellationToken::new();
    let backend_task = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if let Err(err) = backend.run_with_context(cancel).await {
                tracing::error!(backend = backend.name(), error = %err, "backend stopped with error");
            }
        }
    });

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel.clone()))
        .await?;

    cancel.cancel();
    backend_task.await?;
    tracing::info!("identifier stopped");
    Ok(())
}

/// Wire the orchestrator from configuration around an already selected backend.
pub fn build_identifier(config: &Config, backend: Arc<dyn Backend>) -> Result<Identifier> {
    let key = match &config.encryption_secret {
        Some(secret) => key_from_secret(secret),
        None => {
            tracing::warn!(
                "IDENTIFIER_ENCRYPTION_SECRET not set, using a random key; sessions will not survive a restart"
            );
            random_key()?
        }
    };

    let clients = match &config.clients_file {
        Some(path) => StaticClientRegistry::from_file(path)?,
        None => StaticClientRegistry::new(Vec::new()),
    };
    if clients.is_empty() {
        tracing::warn!("no clients registered, every client flow will be rejected");
    } else {
        tracing::info!(clients = clients.len(), "client registry loaded");
    }

    tracing::info!(
        backend = backend.name(),
        scopes = ?backend.scopes_supported(),
        "identifier backend selected"
    );

    Ok(Identifier::new(
        config.identifier_config(),
        backend,
        Arc::new(clients),
        Arc::new(SealedTicketCodec::new(&key)),
    ))
}

pub fn build_router(state: AppState, static_assets: Option<Router>) -> Router {
    let mut router = Router::new()
        .route("/health", get(api::health::health))
        .nest("/identifier/_", api::identifier::routes())
        .with_state(state);
    if let Some(assets) = static_assets {
        router = router.nest("/identifier/static", assets);
    }

    let router = security_headers::apply(router);
    http::apply(router)
}

async fn shutdown_signal(cancel: CancellationToken) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
    cancel.cancel();
}
