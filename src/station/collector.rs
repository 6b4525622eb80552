//! The fetch / convert / store / aggregate / purge / publish loop.

use crate::broadcast::ReadingBroadcaster;
use crate::error::Result;
use crate::station::aggregate::AggregateEngine;
use crate::station::client::FetchOutcome;
use crate::station::convert::convert;
use crate::station::data::PeriodKey;
use crate::station::retention::RetentionPurger;
use crate::station::traits::WeatherSource;
use crate::storage::Store;
use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Extra delay after an HTTP 429 before the normal interval sleep.
pub const RATE_LIMIT_BACKOFF: Duration = Duration::from_secs(5);

/// Settings of one collection loop.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Device (MAC) identifier readings are stored under
    pub mac_address: String,
    /// Sleep between ticks
    pub interval: Duration,
    /// Age in days after which raw readings are purged
    pub retention_days: u32,
    /// Extra sleep after a rate-limit response
    pub rate_limit_backoff: Duration,
}

impl CollectorConfig {
    pub fn new(mac_address: impl Into<String>, interval: Duration, retention_days: u32) -> Self {
        Self {
            mac_address: mac_address.into(),
            interval,
            retention_days,
            rate_limit_backoff: RATE_LIMIT_BACKOFF,
        }
    }
}

/// What a single tick did.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// A reading was stored, aggregated and published
    Collected {
        timestamp: DateTime<Utc>,
        purged: u64,
        delivered: usize,
    },
    /// Upstream had nothing to report
    NoData,
    /// Upstream answered 429
    RateLimited,
    /// Upstream answered with another error status
    UpstreamError { status: u16 },
    /// Upstream could not be reached
    TransportError,
    /// Anything else went wrong; remaining steps were skipped
    Failed,
}

/// Periodically pulls the latest reading and runs it through the pipeline.
pub struct Collector {
    config: CollectorConfig,
    source: Arc<dyn WeatherSource>,
    store: Arc<dyn Store>,
    aggregates: AggregateEngine,
    purger: RetentionPurger,
    broadcaster: Arc<ReadingBroadcaster>,
}

impl Collector {
    pub fn new(
        config: CollectorConfig,
        source: Arc<dyn WeatherSource>,
        store: Arc<dyn Store>,
        broadcaster: Arc<ReadingBroadcaster>,
    ) -> Self {
        Self {
            aggregates: AggregateEngine::new(Arc::clone(&store)),
            purger: RetentionPurger::new(Arc::clone(&store), config.retention_days),
            config,
            source,
            store,
            broadcaster,
        }
    }

    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    /// Run ticks until `shutdown` fires (or its sender is dropped).
    ///
    /// Shutdown is only observed between ticks, so an in-flight tick always
    /// finishes its remaining steps first.
    pub async fn run(self, mut shutdown: watch::Receiver<()>) {
        info!(
            device = %self.config.mac_address,
            interval_secs = self.config.interval.as_secs(),
            retention_days = self.config.retention_days,
            "Starting collector"
        );

        loop {
            let outcome = AssertUnwindSafe(self.tick())
                .catch_unwind()
                .await
                .unwrap_or_else(|_| {
                    error!("Collection tick panicked");
                    TickOutcome::Failed
                });

            let delay = self.delay_after(&outcome);
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.changed() => break,
            }
        }

        info!("Collector stopped");
    }

    /// Time to wait before the next tick.
    pub fn delay_after(&self, outcome: &TickOutcome) -> Duration {
        match outcome {
            TickOutcome::RateLimited => self
                .config
                .interval
                .saturating_add(self.config.rate_limit_backoff),
            _ => self.config.interval,
        }
    }

    /// Run one collection cycle. Never fails; failures become outcomes.
    pub async fn tick(&self) -> TickOutcome {
        match self.collect().await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(error = %e, details = ?e, "Unexpected error in collection loop");
                TickOutcome::Failed
            }
        }
    }

    async fn collect(&self) -> Result<TickOutcome> {
        let mac = self.config.mac_address.as_str();

        let raw = match self.source.fetch_latest().await? {
            FetchOutcome::Reading(raw) => raw,
            FetchOutcome::NoData => {
                warn!("No data returned from weather API");
                return Ok(TickOutcome::NoData);
            }
            FetchOutcome::RateLimited => {
                warn!(
                    backoff_secs = self.config.rate_limit_backoff.as_secs(),
                    "Weather API rate limited, backing off"
                );
                return Ok(TickOutcome::RateLimited);
            }
            FetchOutcome::UpstreamError { status, body } => {
                error!(status, body = %body, "Weather API HTTP error");
                return Ok(TickOutcome::UpstreamError { status });
            }
            FetchOutcome::TransportError(e) => {
                error!(error = %e, "Weather API request error");
                return Ok(TickOutcome::TransportError);
            }
        };

        let converted = convert(&raw);
        let timestamp = Utc::now();
        self.store.insert_reading(timestamp, mac, &converted).await?;

        self.aggregates
            .recompute_period(mac, PeriodKey::month_of(timestamp))
            .await?;
        self.aggregates
            .recompute_period(mac, PeriodKey::year_of(timestamp))
            .await?;

        // A failed purge is retried implicitly on the next tick.
        let purged = match self.purger.purge(mac, timestamp).await {
            Ok(0) => 0,
            Ok(deleted) => {
                info!(deleted, "Purged old readings");
                deleted
            }
            Err(e) => {
                warn!(error = %e, "Failed to purge old readings");
                0
            }
        };

        let report = self.broadcaster.publish(Arc::new(converted));
        debug!(
            timestamp = %timestamp.to_rfc3339(),
            delivered = report.delivered,
            dropped = report.dropped,
            "Collected and stored reading"
        );

        Ok(TickOutcome::Collected {
            timestamp,
            purged,
            delivered: report.delivered,
        })
    }
}
