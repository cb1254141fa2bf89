//! Client Resilience - diagnostics service
//!
//! Runs the resilience layer over a file-backed store and exposes its
//! health, error log and inbox over HTTP.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use client_resilience::{
    create_router, spawn_maintenance_task, AlertSurface, AppState, Config, ErrorHandler,
    TracingAlerts,
};
use client_resilience::storage::{FileKeyValueStore, KeyValueStore};

/// Main entry point for the diagnostics service.
///
/// # Startup Sequence
/// 1. Load configuration from environment variables
/// 2. Open the file-backed key-value store
/// 3. Initialize tracing, feeding warnings and errors into the error log
/// 4. Build the managers and start the cache maintenance task
/// 5. Serve the diagnostics router on the configured port
/// 6. Handle graceful shutdown on SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env();

    tokio::fs::create_dir_all(&config.data_dir)
        .await
        .with_context(|| format!("creating data dir {}", config.data_dir.display()))?;
    let store: Arc<dyn KeyValueStore> = Arc::new(
        FileKeyValueStore::open(config.store_path())
            .await
            .with_context(|| format!("opening store {}", config.store_path().display()))?,
    );
    let alerts: Arc<dyn AlertSurface> = Arc::new(TracingAlerts);
    let errors = Arc::new(ErrorHandler::new(store.clone(), alerts.clone()));

    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "client_resilience=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(errors.capture_layer())
        .init();

    info!("Starting Client Resilience diagnostics service");
    info!(
        "Configuration loaded: base_url={}, max_size_mb={}, port={}, maintenance_interval={}s",
        config.api_base_url,
        config.storage.max_size_mb,
        config.diagnostics_port,
        config.maintenance_interval
    );

    let state = AppState::with_error_handler(&config, store, alerts, errors).await;
    info!("Managers initialized");

    let maintenance_handle =
        spawn_maintenance_task(state.storage.clone(), config.maintenance_interval);
    info!("Background maintenance task started");

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.diagnostics_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(maintenance_handle))
        .await
        .context("serving diagnostics API")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
///
/// On shutdown signal, aborts the maintenance task and allows graceful shutdown.
async fn shutdown_signal(maintenance_handle: tokio::task::JoinHandle<()>) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!(error = %err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    maintenance_handle.abort();
    info!("Maintenance task aborted");
}
