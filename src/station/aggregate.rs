//! Recompute-based period aggregation.
//!
//! Every recompute scans all stored readings of the period and overwrites
//! the per-metric rows, so the result is the same no matter how often or in
//! which order it runs.

use crate::error::Result;
use crate::station::convert::numeric_fields;
use crate::station::data::{MetricStats, PeriodKey, ReadingData};
use crate::storage::Store;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Recomputes min/max/avg/count aggregates from stored readings.
#[derive(Clone)]
pub struct AggregateEngine {
    store: Arc<dyn Store>,
}

impl AggregateEngine {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Recompute and upsert every metric of `period` for the device.
    ///
    /// Returns the number of metric rows written; zero when the period has
    /// no readings.
    pub async fn recompute_period(&self, mac_address: &str, period: PeriodKey) -> Result<usize> {
        let (start, end) = period.bounds()?;
        let readings = self.store.query_readings(mac_address, start, end).await?;
        if readings.is_empty() {
            return Ok(0);
        }

        let metrics = summarize(&readings);
        for (metric_name, stats) in &metrics {
            self.store
                .upsert_aggregate(mac_address, period, metric_name, stats)
                .await?;
        }

        debug!(
            device = mac_address,
            period = %period,
            readings = readings.len(),
            metrics = metrics.len(),
            "Recomputed aggregates"
        );
        Ok(metrics.len())
    }
}

/// Per-metric statistics over a set of converted readings.
pub fn summarize(readings: &[ReadingData]) -> BTreeMap<String, MetricStats> {
    let mut values: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for reading in readings {
        for (metric_name, value) in numeric_fields(reading) {
            values.entry(metric_name).or_default().push(value);
        }
    }

    values
        .into_iter()
        .filter_map(|(metric_name, values)| {
            MetricStats::from_values(&values).map(|stats| (metric_name, stats))
        })
        .collect()
}
