use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing::{info, warn};

use innkeeper::http;
use innkeeper::model::Inventory;
use innkeeper::service::ReservationService;
use innkeeper::store::{self, DiskStore, ReservationStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let metrics_port: Option<u16> = std::env::var("INNKEEPER_METRICS_PORT")
        .ok()
        .and_then(|s| s.parse().ok());
    innkeeper::observability::init(metrics_port);

    let port = std::env::var("INNKEEPER_PORT").unwrap_or_else(|_| "8000".into());
    let bind = std::env::var("INNKEEPER_BIND").unwrap_or_else(|_| "0.0.0.0".into());
    let data_dir = std::env::var("INNKEEPER_DATA_DIR").unwrap_or_else(|_| "./data".into());
    let compact_threshold: u64 = std::env::var("INNKEEPER_COMPACT_THRESHOLD")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(1000);
    let store_retry_ms: u64 = std::env::var("INNKEEPER_STORE_RETRY_MS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(2000);

    // Ensure data directory exists
    std::fs::create_dir_all(&data_dir)?;
    let oplog_path = PathBuf::from(&data_dir).join("reservations.oplog");

    // No traffic until the store is ready — retry forever on a fixed interval
    let store = loop {
        match DiskStore::open(oplog_path.clone()) {
            Ok(store) => break Arc::new(store),
            Err(e) => {
                warn!("waiting for reservation store to be ready: {e}");
                tokio::time::sleep(Duration::from_millis(store_retry_ms)).await;
            }
        }
    };
    store.ping().await?;
    info!("reservation store ready ({} documents)", store.document_count());

    tokio::spawn(store::run_compactor(store.clone(), compact_threshold));

    let service = Arc::new(ReservationService::new(store, Inventory::default()));
    let app = http::router(service);

    let addr = format!("{bind}:{port}");
    let listener = TcpListener::bind(&addr).await?;
    info!("innkeeper listening on {addr}");
    info!("  data_dir: {data_dir}");
    info!(
        "  metrics: {}",
        metrics_port.map_or("disabled".to_string(), |p| format!(
            "http://0.0.0.0:{p}/metrics"
        ))
    );

    // Graceful shutdown: stop accepting on SIGTERM/ctrl-c, drain in-flight requests
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("innkeeper stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to register SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
    }
    info!("shutdown signal received");
}
