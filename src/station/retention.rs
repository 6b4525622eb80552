//! Retention window enforcement for raw readings.

use crate::error::Result;
use crate::storage::Store;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

/// Deletes raw readings older than a fixed window.
#[derive(Clone)]
pub struct RetentionPurger {
    store: Arc<dyn Store>,
    window: Duration,
}

impl RetentionPurger {
    pub fn new(store: Arc<dyn Store>, retention_days: u32) -> Self {
        Self {
            store,
            window: Duration::days(i64::from(retention_days)),
        }
    }

    /// Oldest instant still retained when the clock reads `now`.
    ///
    /// `None` when the window reaches back past the earliest representable
    /// instant, in which case nothing is old enough to purge.
    pub fn cutoff(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        now.checked_sub_signed(self.window)
    }

    /// Delete the device's readings strictly older than `cutoff`.
    pub async fn purge_older_than(&self, mac_address: &str, cutoff: DateTime<Utc>) -> Result<u64> {
        self.store.delete_readings_before(mac_address, cutoff).await
    }

    /// Purge relative to `now`.
    pub async fn purge(&self, mac_address: &str, now: DateTime<Utc>) -> Result<u64> {
        match self.cutoff(now) {
            Some(cutoff) => self.purge_older_than(mac_address, cutoff).await,
            None => Ok(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteStore;
    use serde_json::json;

    #[tokio::test]
    async fn test_purge_respects_window() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let purger = RetentionPurger::new(store.clone(), 7);
        let now = Utc::now();
        let data = json!({"uv": 2}).as_object().cloned().unwrap();

        store
            .insert_reading(now - Duration::days(8), "AA", &data)
            .await
            .unwrap();
        store
            .insert_reading(now - Duration::days(6), "AA", &data)
            .await
            .unwrap();
        store
            .insert_reading(now - Duration::days(8), "BB", &data)
            .await
            .unwrap();

        assert_eq!(purger.cutoff(now), Some(now - Duration::days(7)));
        assert_eq!(purger.purge("AA", now).await.unwrap(), 1);
        assert_eq!(purger.purge("AA", now).await.unwrap(), 0);
        assert!(store.latest_reading("BB").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_huge_window_purges_nothing() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let purger = RetentionPurger::new(store.clone(), 200_000_000);
        let now = Utc::now();
        let data = json!({"uv": 2}).as_object().cloned().unwrap();

        store
            .insert_reading(now - Duration::days(3650), "AA", &data)
            .await
            .unwrap();

        assert_eq!(purger.cutoff(now), None);
        assert_eq!(purger.purge("AA", now).await.unwrap(), 0);
        assert!(store.latest_reading("AA").await.unwrap().is_some());

        let widest = RetentionPurger::new(store.clone(), u32::MAX);
        assert_eq!(widest.purge("AA", now).await.unwrap(), 0);
    }
}
