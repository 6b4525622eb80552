//! HTTP surface of the weather station service.
//!
//! REST endpoints for stored readings and aggregates, plus Server-Sent
//! Events and WebSocket streams of newly collected readings.

pub mod config;
pub mod handlers;
pub mod router;
pub mod stream;

// Re-export commonly used items
pub use config::WebConfig;
pub use router::create_app;

use crate::broadcast::ReadingBroadcaster;
use crate::error::{Result, StationError};
use crate::storage::Store;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub broadcaster: Arc<ReadingBroadcaster>,
    /// Device queried when a request names none
    pub mac_address: String,
    /// Fires when the process is shutting down; open streams end on it
    pub shutdown: watch::Receiver<()>,
}

/// Serve the API until `shutdown` fires.
pub async fn start_web_server(
    config: WebConfig,
    state: AppState,
    mut shutdown: watch::Receiver<()>,
) -> Result<()> {
    let app = create_app(&config, state);

    let addr = config.socket_addr()?;

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| StationError::web_server_error(format!("Failed to bind to address: {}", e)))?;

    info!("Starting weather station API on http://{}", addr);
    info!("SSE endpoint: http://{}/api/stream", addr);
    info!("WebSocket endpoint: ws://{}/ws", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.changed().await;
        })
        .await
        .map_err(|e| StationError::web_server_error(format!("Server error: {}", e)))?;

    Ok(())
}
