//! Traits at the collection pipeline's seams.

use crate::error::Result;
use crate::station::client::FetchOutcome;
use async_trait::async_trait;

/// A source of the latest raw station reading.
///
/// Implementations classify every expected upstream failure into a
/// [`FetchOutcome`]; `Err` is reserved for failures nobody planned for,
/// such as an undecodable response body.
#[async_trait]
pub trait WeatherSource: Send + Sync {
    /// Perform a single round trip and report what came back.
    async fn fetch_latest(&self) -> Result<FetchOutcome>;
}
