//! Persistence of readings and period aggregates.
//!
//! The collection loop and the HTTP layer only talk to the [`Store`] trait;
//! [`SqliteStore`] is the implementation used by the binary.

pub mod sqlite;

pub use sqlite::SqliteStore;

use crate::error::Result;
use crate::station::data::{MetricStats, PeriodAggregate, PeriodKey, Reading, ReadingData};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Filter and page window for listing stored readings.
#[derive(Debug, Clone)]
pub struct ReadingQuery {
    pub mac_address: String,
    /// Inclusive lower bound
    pub start: Option<DateTime<Utc>>,
    /// Inclusive upper bound
    pub end: Option<DateTime<Utc>>,
    pub limit: u32,
    pub offset: u32,
}

/// One page of readings, newest first.
#[derive(Debug, Clone, Serialize)]
pub struct ReadingPage {
    pub items: Vec<Reading>,
    pub total: u64,
    pub limit: u32,
    pub offset: u32,
}

/// Storage operations consumed by the pipeline and the query endpoints.
#[async_trait]
pub trait Store: Send + Sync {
    /// Persist a converted reading; returns the new row id.
    async fn insert_reading(
        &self,
        timestamp: DateTime<Utc>,
        mac_address: &str,
        data: &ReadingData,
    ) -> Result<i64>;

    /// Data of every reading for the device in `[start, end_exclusive)`.
    async fn query_readings(
        &self,
        mac_address: &str,
        start: DateTime<Utc>,
        end_exclusive: DateTime<Utc>,
    ) -> Result<Vec<ReadingData>>;

    /// Insert or overwrite the aggregate row for (device, period, metric).
    async fn upsert_aggregate(
        &self,
        mac_address: &str,
        period: PeriodKey,
        metric_name: &str,
        stats: &MetricStats,
    ) -> Result<()>;

    /// Delete the device's readings strictly older than `cutoff`.
    async fn delete_readings_before(
        &self,
        mac_address: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<u64>;

    async fn list_readings(&self, query: &ReadingQuery) -> Result<ReadingPage>;

    async fn latest_reading(&self, mac_address: &str) -> Result<Option<Reading>>;

    /// Monthly rows of a year, optionally a single month, ordered by month then metric.
    async fn monthly_aggregates(
        &self,
        mac_address: &str,
        year: i32,
        month: Option<u32>,
    ) -> Result<Vec<PeriodAggregate>>;

    /// Yearly rows ordered by metric.
    async fn yearly_aggregates(&self, mac_address: &str, year: i32)
        -> Result<Vec<PeriodAggregate>>;
}
