use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use flowtrack_api::config::ServerConfig;
use flowtrack_api::router::build_app_router;
use flowtrack_api::state::AppState;
use flowtrack_engine::{ArgoClient, EngineConfig};
use flowtrack_store::{JobRecordStore, StoreConfig};
use flowtrack_tracker::{JobService, JobTracker, TrackerConfig};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "flowtrack_api=debug,flowtrack_tracker=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    let store_config = StoreConfig::from_env();
    let engine_config = EngineConfig::from_env();
    let tracker_config = TrackerConfig::from_env();
    tracing::info!(
        listen = %config.listen,
        backend = ?store_config.backend,
        argo = %engine_config.server_url,
        namespace = %engine_config.namespace,
        "Loaded configuration",
    );

    // --- Record store ---
    let kv = flowtrack_store::connect::connect(&store_config)
        .await
        .expect("Failed to connect to the record store");
    let records = JobRecordStore::new(Arc::clone(&kv), store_config.record_ttl);

    let expiry_cancel = CancellationToken::new();
    let expiry_handle = tokio::spawn(flowtrack_store::expiry::run(
        Arc::clone(&kv),
        store_config.purge_interval,
        expiry_cancel.clone(),
    ));

    // --- Workflow engine ---
    let engine = Arc::new(ArgoClient::new(engine_config).expect("Invalid workflow engine configuration"));
    tracing::info!("Workflow engine client created");

    // --- Tracking ---
    let tracker = Arc::new(JobTracker::new(engine.clone(), records.clone(), tracker_config));
    let service = JobService::new(engine, records, Arc::clone(&tracker));

    let app = build_app_router(AppState { service }, &config);

    // --- Start server ---
    tracing::info!(addr = %config.listen, "Starting server");

    let listener = tokio::net::TcpListener::bind(config.listen)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");
    // Tracking first, so every job gets its final snapshot written.
    if tokio::time::timeout(config.shutdown_grace, tracker.shutdown()).await.is_err() {
        tracing::warn!("Job tracker did not shut down in time");
    }

    expiry_cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), expiry_handle).await;
    tracing::info!("Expiry sweep stopped");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT (Ctrl-C) or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
