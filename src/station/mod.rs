//! Weather station collection pipeline.
//!
//! This module fetches the latest reading from the Ambient Weather API,
//! converts it to metric units, stores it, keeps the monthly and yearly
//! aggregates current, enforces the raw-data retention window and hands
//! each new reading to the broadcaster.

pub mod aggregate;
pub mod client;
pub mod collector;
pub mod convert;
pub mod data;
pub mod retention;
pub mod traits;

// Re-export commonly used items
pub use aggregate::AggregateEngine;
pub use client::{AmbientClient, ApiCredentials, FetchOutcome};
pub use collector::{Collector, CollectorConfig, TickOutcome};
pub use convert::{convert, numeric_fields};
pub use data::{MetricStats, PeriodAggregate, PeriodKey, Reading, ReadingData};
pub use retention::RetentionPurger;
pub use traits::WeatherSource;
