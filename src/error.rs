//! Error handling for the weather station crate.

/// A specialized `Result` type for weather station operations.
pub type Result<T> = std::result::Result<T, StationError>;

/// The main error type for storage, configuration and serving failures.
///
/// Per-tick upstream failures (rate limits, bad status codes, transport
/// problems) are not errors; they are reported through
/// [`FetchOutcome`](crate::station::FetchOutcome).
#[derive(Debug, thiserror::Error)]
pub enum StationError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// SQLite operation failed
    #[error("Storage error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Storage layer failed for a reason other than SQLite itself
    #[error("Storage error: {0}")]
    Storage(String),

    /// JSON encoding or decoding failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP client could not be built or a response body could not be read
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// Upstream response had an unexpected shape
    #[error("Unexpected upstream payload: {0}")]
    Payload(String),

    /// A blocking storage task panicked or was cancelled
    #[error("Background task failed: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),

    /// Web server error
    #[error("Web server error: {0}")]
    WebServer(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl StationError {
    /// Create a new storage error
    pub fn storage_error(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Create a new payload error
    pub fn payload_error(msg: impl Into<String>) -> Self {
        Self::Payload(msg.into())
    }

    /// Create a new web server error
    pub fn web_server_error(msg: impl Into<String>) -> Self {
        Self::WebServer(msg.into())
    }

    /// Create a new configuration error
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
