//! # Weather Station - Ambient Weather collection service
//!
//! Periodically pulls the latest reading of one Ambient Weather station,
//! converts it to metric units, keeps it in SQLite, maintains monthly and
//! yearly aggregates, and streams every new reading to live subscribers.
//!
//! ## Features
//!
//! - **Collection loop**: fetch, convert, store, aggregate, purge, publish
//! - **Rolling aggregates**: min / max / avg / count per metric and period
//! - **Retention**: raw readings older than the configured window are purged
//! - **Live streaming**: Server-Sent Events and WebSocket endpoints
//! - **Library + Binary**: use as a crate or standalone application
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use weather_station::{
//!     start_web_server, web::AppState, ReadingBroadcaster, SqliteStore, WebConfig,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(SqliteStore::open("weather.db".as_ref())?);
//!     let (_shutdown_tx, shutdown) = tokio::sync::watch::channel(());
//!     let state = AppState {
//!         store,
//!         broadcaster: Arc::new(ReadingBroadcaster::new()),
//!         mac_address: "00:11:22:33:44:55".to_string(),
//!         shutdown: shutdown.clone(),
//!     };
//!
//!     start_web_server(WebConfig::default(), state, shutdown).await?;
//!     Ok(())
//! }
//! ```

pub mod broadcast;
pub mod config;
pub mod error;
pub mod station;
pub mod storage;
pub mod web;

// Re-export public API
pub use broadcast::{Broadcaster, PublishReport, ReadingBroadcaster, Subscription};
pub use config::Settings;
pub use error::{Result, StationError};
pub use station::{
    AmbientClient, ApiCredentials, Collector, CollectorConfig, FetchOutcome, Reading,
    ReadingData, TickOutcome, WeatherSource,
};
pub use storage::{SqliteStore, Store};
pub use web::{start_web_server, WebConfig};

/// The default web server port
pub const DEFAULT_WEB_PORT: u16 = 8000;
