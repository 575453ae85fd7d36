//! cronlogger -- record the outcome of scheduled jobs and browse the history.
//!
//! The capture path stores one result per finished job; the HTTP server
//! renders a paginated, filterable view of everything stored.

pub mod api;
pub mod capture;
pub mod config;
pub mod pagination;
pub mod storage;
pub mod telemetry;

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config::AppConfig;
use crate::storage::SqliteStore;

/// Start the history server and run until Ctrl-C or SIGTERM.
pub async fn serve(config: AppConfig) -> Result<()> {
    tracing::info!(db_path = %config.store.db_path.display(), "Initializing database");
    let store = SqliteStore::open(&config.store)?;

    let addr = config.server.bind_address();
    let state = api::state::AppState::new(Arc::new(store), config);
    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, version = env!("CARGO_PKG_VERSION"), "cronlogger listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Graceful shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl-C: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to listen for SIGTERM: {}", e);
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
    tracing::info!("Shutting down");
}

/// Read the piped job output from stdin and store it.
///
/// Returns `Ok(false)` when there was nothing to record.
pub fn log_from_stdin(config: &AppConfig, application: &str, exit_code: i32) -> Result<bool> {
    if application.is_empty() {
        return Err(capture::CaptureError::MissingApplication.into());
    }
    let captured = capture::read_piped_stdin()?;
    if captured.is_empty() {
        return Ok(false);
    }

    let store = SqliteStore::open(&config.store)?;
    let stored = capture::record(
        &store,
        application,
        exit_code,
        &captured,
        config.store.max_output_bytes,
    )?;
    Ok(stored.is_some())
}
