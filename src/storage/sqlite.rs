//! SQLite-backed [`Store`].
//!
//! A single connection sits behind a mutex; every operation runs on the
//! blocking pool so the collection loop and HTTP handlers never stall the
//! async reactor on disk I/O.

use super::{ReadingPage, ReadingQuery, Store};
use crate::error::{Result, StationError};
use crate::station::data::{MetricStats, PeriodAggregate, PeriodKey, Reading, ReadingData};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS readings (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        ts_ms       INTEGER NOT NULL,
        device      TEXT NOT NULL,
        data        TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_readings_device_ts ON readings(device, ts_ms);

    CREATE TABLE IF NOT EXISTS monthly_aggregates (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        device      TEXT NOT NULL,
        year        INTEGER NOT NULL,
        month       INTEGER NOT NULL,
        metric      TEXT NOT NULL,
        min_value   REAL NOT NULL,
        max_value   REAL NOT NULL,
        avg_value   REAL NOT NULL,
        count       INTEGER NOT NULL,
        UNIQUE (device, year, month, metric)
    );

    CREATE TABLE IF NOT EXISTS yearly_aggregates (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        device      TEXT NOT NULL,
        year        INTEGER NOT NULL,
        metric      TEXT NOT NULL,
        min_value   REAL NOT NULL,
        max_value   REAL NOT NULL,
        avg_value   REAL NOT NULL,
        count       INTEGER NOT NULL,
        UNIQUE (device, year, metric)
    );";

/// Raw aggregate row as read from SQLite: (month, metric, min, max, avg, count).
type AggregateRow = (Option<u32>, String, f64, f64, f64, i64);

/// SQLite store shared by the collector and the web layer.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) the database file at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::init(conn)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `op` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().unwrap_or_else(PoisonError::into_inner);
            op(&mut guard)
        })
        .await?
    }
}

fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| StationError::storage_error(format!("timestamp out of range: {}", ms)))
}

fn decode_data(raw: &str) -> Result<ReadingData> {
    Ok(serde_json::from_str(raw)?)
}

fn to_aggregate(mac_address: &str, year: i32, row: AggregateRow) -> PeriodAggregate {
    let (month, metric_name, min, max, avg, count) = row;
    let period = match month {
        Some(month) => PeriodKey::Month { year, month },
        None => PeriodKey::Year { year },
    };

    PeriodAggregate {
        mac_address: mac_address.to_string(),
        period,
        metric_name,
        stats: MetricStats {
            min,
            max,
            avg,
            count: count.max(0) as u64,
        },
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn insert_reading(
        &self,
        timestamp: DateTime<Utc>,
        mac_address: &str,
        data: &ReadingData,
    ) -> Result<i64> {
        let device = mac_address.to_string();
        let encoded = serde_json::to_string(data)?;

        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO readings (ts_ms, device, data) VALUES (?1, ?2, ?3)",
                params![to_millis(timestamp), device, encoded],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    async fn query_readings(
        &self,
        mac_address: &str,
        start: DateTime<Utc>,
        end_exclusive: DateTime<Utc>,
    ) -> Result<Vec<ReadingData>> {
        let device = mac_address.to_string();

        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT data FROM readings \
                 WHERE device = ?1 AND ts_ms >= ?2 AND ts_ms < ?3 \
                 ORDER BY ts_ms",
            )?;
            let rows = stmt
                .query_map(
                    params![device, to_millis(start), to_millis(end_exclusive)],
                    |row| row.get::<_, String>(0),
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            rows.iter().map(|raw| decode_data(raw)).collect()
        })
        .await
    }

    async fn upsert_aggregate(
        &self,
        mac_address: &str,
        period: PeriodKey,
        metric_name: &str,
        stats: &MetricStats,
    ) -> Result<()> {
        let device = mac_address.to_string();
        let metric = metric_name.to_string();
        let stats = *stats;
        let count = i64::try_from(stats.count).unwrap_or(i64::MAX);

        self.with_conn(move |conn| {
            match period {
                PeriodKey::Month { year, month } => conn.execute(
                    "INSERT INTO monthly_aggregates \
                        (device, year, month, metric, min_value, max_value, avg_value, count) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8) \
                     ON CONFLICT(device, year, month, metric) DO UPDATE SET \
                        min_value = excluded.min_value, \
                        max_value = excluded.max_value, \
                        avg_value = excluded.avg_value, \
                        count = excluded.count",
                    params![device, year, month, metric, stats.min, stats.max, stats.avg, count],
                )?,
                PeriodKey::Year { year } => conn.execute(
                    "INSERT INTO yearly_aggregates \
                        (device, year, metric, min_value, max_value, avg_value, count) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7) \
                     ON CONFLICT(device, year, metric) DO UPDATE SET \
                        min_value = excluded.min_value, \
                        max_value = excluded.max_value, \
                        avg_value = excluded.avg_value, \
                        count = excluded.count",
                    params![device, year, metric, stats.min, stats.max, stats.avg, count],
                )?,
            };
            Ok(())
        })
        .await
    }

    async fn delete_readings_before(
        &self,
        mac_address: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<u64> {
        let device = mac_address.to_string();

        self.with_conn(move |conn| {
            let deleted = conn.execute(
                "DELETE FROM readings WHERE device = ?1 AND ts_ms < ?2",
                params![device, to_millis(cutoff)],
            )?;
            Ok(deleted as u64)
        })
        .await
    }

    async fn list_readings(&self, query: &ReadingQuery) -> Result<ReadingPage> {
        let query = query.clone();

        self.with_conn(move |conn| {
            let start = query.start.map(to_millis).unwrap_or(i64::MIN);
            let end = query.end.map(to_millis).unwrap_or(i64::MAX);

            let total: i64 = conn.query_row(
                "SELECT COUNT(*) FROM readings \
                 WHERE device = ?1 AND ts_ms >= ?2 AND ts_ms <= ?3",
                params![query.mac_address, start, end],
                |row| row.get(0),
            )?;

            let mut stmt = conn.prepare(
                "SELECT id, ts_ms, device, data FROM readings \
                 WHERE device = ?1 AND ts_ms >= ?2 AND ts_ms <= ?3 \
                 ORDER BY ts_ms DESC, id DESC LIMIT ?4 OFFSET ?5",
            )?;
            let rows = stmt
                .query_map(
                    params![query.mac_address, start, end, query.limit, query.offset],
                    |row| {
                        Ok((
                            row.get::<_, i64>(0)?,
                            row.get::<_, i64>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, String>(3)?,
                        ))
                    },
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let items = rows
                .into_iter()
                .map(|(id, ts_ms, mac_address, data)| {
                    Ok(Reading {
                        id,
                        timestamp: from_millis(ts_ms)?,
                        mac_address,
                        data: decode_data(&data)?,
                    })
                })
                .collect::<Result<Vec<_>>>()?;

            Ok(ReadingPage {
                items,
                total: total.max(0) as u64,
                limit: query.limit,
                offset: query.offset,
            })
        })
        .await
    }

    async fn latest_reading(&self, mac_address: &str) -> Result<Option<Reading>> {
        let device = mac_address.to_string();

        self.with_conn(move |conn| {
            let row = conn
                .query_row(
                    "SELECT id, ts_ms, device, data FROM readings \
                     WHERE device = ?1 ORDER BY ts_ms DESC, id DESC LIMIT 1",
                    params![device],
                    |row| {
                        Ok((
                            row.get::<_, i64>(0)?,
                            row.get::<_, i64>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, String>(3)?,
                        ))
                    },
                )
                .optional()?;

            row.map(|(id, ts_ms, mac_address, data)| {
                Ok(Reading {
                    id,
                    timestamp: from_millis(ts_ms)?,
                    mac_address,
                    data: decode_data(&data)?,
                })
            })
            .transpose()
        })
        .await
    }

    async fn monthly_aggregates(
        &self,
        mac_address: &str,
        year: i32,
        month: Option<u32>,
    ) -> Result<Vec<PeriodAggregate>> {
        let device = mac_address.to_string();

        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT month, metric, min_value, max_value, avg_value, count \
                 FROM monthly_aggregates \
                 WHERE device = ?1 AND year = ?2 AND (?3 IS NULL OR month = ?3) \
                 ORDER BY month, metric",
            )?;
            let rows = stmt
                .query_map(params![device, year, month], |row| {
                    Ok((
                        Some(row.get::<_, u32>(0)?),
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                    ))
                })?
                .collect::<std::result::Result<Vec<AggregateRow>, _>>()?;

            Ok(rows
                .into_iter()
                .map(|row| to_aggregate(&device, year, row))
                .collect())
        })
        .await
    }

    async fn yearly_aggregates(
        &self,
        mac_address: &str,
        year: i32,
    ) -> Result<Vec<PeriodAggregate>> {
        let device = mac_address.to_string();

        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT metric, min_value, max_value, avg_value, count \
                 FROM yearly_aggregates \
                 WHERE device = ?1 AND year = ?2 \
                 ORDER BY metric",
            )?;
            let rows = stmt
                .query_map(params![device, year], |row| {
                    Ok((
                        None,
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                    ))
                })?
                .collect::<std::result::Result<Vec<AggregateRow>, _>>()?;

            Ok(rows
                .into_iter()
                .map(|row| to_aggregate(&device, year, row))
                .collect())
        })
        .await
    }
}
