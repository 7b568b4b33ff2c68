use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::{
    config::Config,
    handlers::{ask, health, permission},
    membership::AskRedis,
    permission::PermissionByRedis,
    AppState,
};

pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub config: Config,
}

/// Validate `cfg`, then build and provision every configured module.
///
/// A failed permission provision (unreachable Redis) is fatal and releases
/// anything already provisioned.
pub async fn provision(cfg: &Config) -> Result<AppState> {
    cfg.validate().context("invalid config")?;

    let mut state = AppState::default();

    if let Some(settings) = &cfg.ask_redis {
        let module = AskRedis::new(settings.clone()).context("ask_redis")?;
        module
            .provision()
            .await
            .with_context(|| format!("provision {}", AskRedis::ID))?;
        state.ask_redis = Some(Arc::new(module));
    }

    if let Some(settings) = &cfg.permission {
        let module = PermissionByRedis::new(settings.clone()).context("permission redis")?;
        if let Err(e) = module.provision().await {
            cleanup(&state).await;
            return Err(e.context(format!("provision {}", PermissionByRedis::ID)));
        }
        state.permission = Some(Arc::new(module));
    }

    Ok(state)
}

/// Release every module's store handle.
pub async fn cleanup(state: &AppState) {
    if let Some(m) = &state.ask_redis {
        m.cleanup().await;
    }
    if let Some(m) = &state.permission {
        m.cleanup().await;
    }
}

pub fn router(state: AppState) -> Router {
    let mut app = Router::new().route("/health", get(health));

    if state.ask_redis.is_some() {
        app = app.route("/ask", get(ask));
    }
    if state.permission.is_some() {
        app = app.route("/permission", get(permission));
    }

    app.with_state(state).layer(TraceLayer::new_for_http())
}

pub async fn run(cfg: ServerConfig) -> Result<()> {
    let state = provision(&cfg.config).await?;
    let app = router(state.clone());

    let addr: SocketAddr = format!("{}:{}", cfg.host, cfg.port)
        .parse()
        .context("invalid host/port")?;

    info!(
        %addr,
        ask_redis = state.ask_redis.is_some(),
        permission = state.permission.is_some(),
        "askredis server listening"
    );
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("bind listener")?;

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error");

    cleanup(&state).await;
    info!("askredis server stopped");
    served
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
