//! Shuttle boarding server.
//!
//! This binary:
//! - Loads and validates configuration from the environment
//! - Connects to `PostgreSQL` (ledger, directories, credentials) and runs migrations
//! - Connects to Redis (rider counters)
//! - Serves the HTTP API and the live route channel until Ctrl+C / SIGTERM
//!
//! # Usage
//!
//! ```bash
//! docker compose up -d
//! cargo run --bin server
//! ```

use anyhow::Context;
use shuttle_app::{AppState, Backends, Config, LiveRouteChannel, build_router};
use shuttle_boarding::stores::{
    PostgresCredentialStore, PostgresDirectory, PostgresLedgerStore, RedisRiderCounter,
    postgres::migrate,
};
use shuttle_core::environment::SystemClock;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,shuttle_app=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting shuttle server...");

    let config = Config::from_env();
    let validated = config.validate().context("invalid configuration")?;
    tracing::info!(
        environment = %config.environment,
        timezone = %config.service.timezone,
        "Configuration loaded"
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.postgres.max_connections)
        .min_connections(config.postgres.min_connections)
        .acquire_timeout(Duration::from_secs(config.postgres.connect_timeout))
        .connect(&config.postgres.url)
        .await
        .context("failed to connect to PostgreSQL")?;
    migrate(&pool).await.context("failed to run migrations")?;
    tracing::info!("✓ PostgreSQL ready");

    let counter = RedisRiderCounter::new(&config.redis.url)
        .await
        .context("failed to connect to Redis")?;
    tracing::info!("✓ Redis ready");

    let directory = Arc::new(PostgresDirectory::new(pool.clone()));
    let backends = Backends {
        users: directory.clone(),
        routes: directory,
        ledger: Arc::new(PostgresLedgerStore::new(pool.clone())),
        counter: Arc::new(counter),
        credentials: Arc::new(PostgresCredentialStore::new(pool)),
    };

    let bearer = validated
        .auth
        .bearer_validator()
        .context("invalid bearer configuration")?;
    let state = AppState::new(
        backends,
        validated.codec,
        bearer,
        validated.calendar,
        LiveRouteChannel::new(config.live.channel_capacity, config.live.max_connections),
        Arc::new(SystemClock),
    );

    let listener = tokio::net::TcpListener::bind(config.bind_address())
        .await
        .with_context(|| format!("failed to bind {}", config.bind_address()))?;
    tracing::info!(address = %config.bind_address(), "🚌 Shuttle server listening");

    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        axum::serve(listener, build_router(state))
            .with_graceful_shutdown(async {
                let _ = stop_rx.await;
            })
            .await
    });

    shutdown_signal().await;
    tracing::info!("Shutting down gracefully...");
    let _ = stop_tx.send(());

    // Open live sockets keep graceful shutdown waiting
    match tokio::time::timeout(Duration::from_secs(config.server.shutdown_timeout), server).await {
        Ok(joined) => joined.context("server task failed")??,
        Err(_) => tracing::warn!(
            timeout_secs = config.server.shutdown_timeout,
            "Shutdown timeout elapsed, dropping open connections"
        ),
    }

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
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
        () = ctrl_c => {},
        () = terminate => {},
    }
}
