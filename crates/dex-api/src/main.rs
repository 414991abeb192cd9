//! dex API Server
//!
//! REST API server for user registration, login and JWT-protected user
//! management.
//!
//! Author: hephaex@gmail.com

use anyhow::Context;
use dex_api::{create_router, state::AppState};
use dex_core::{AppConfig, LoggingConfig, MemoryUserStore, PgUserStore, UserRepository};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration: a TOML file named by DEX_CONFIG, or the environment alone
    let config = match std::env::var("DEX_CONFIG") {
        Ok(path) => AppConfig::from_file(&path)
            .and_then(AppConfig::with_env_override)
            .with_context(|| format!("Failed to load configuration from {path}"))?,
        Err(_) => AppConfig::from_env().context("Failed to load configuration")?,
    };

    init_tracing(&config.logging);
    config.validate().context("Invalid configuration")?;

    if config.uses_development_secret() {
        tracing::warn!("JWT_SECRET is not set; tokens are signed with the development secret");
    }

    let users: Arc<dyn UserRepository> = match &config.database.postgres_url {
        Some(url) => {
            let store = PgUserStore::connect(url, config.database.pool_size)
                .await
                .context("Failed to connect to the credential store")?;
            store
                .ensure_schema()
                .await
                .context("Failed to prepare the users table")?;
            Arc::new(store)
        }
        None => {
            tracing::warn!("DATABASE_URL is not set; users are kept in memory only");
            Arc::new(MemoryUserStore::new())
        }
    };

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let csrf = config.server.csrf;

    // Create application state
    let state = Arc::new(AppState::new(config, users));

    // Create router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!(csrf, "dex API Server starting on http://{}", addr);
    tracing::info!("OpenAPI document at http://{}/api-docs/openapi.json", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "dex_api={level},dex_core={level},audit=info,tower_http=debug",
            level = logging.level
        )
        .into()
    });

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.json_format {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
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

    tracing::info!("Received shutdown signal");
}
