//! Data structures for readings and period aggregates.

use crate::error::{Result, StationError};
use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Converted metric values of one reading, keyed by metric name.
pub type ReadingData = serde_json::Map<String, serde_json::Value>;

/// One stored, timestamped snapshot of a station's sensors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Row identifier assigned by the store
    pub id: i64,
    /// Instant the reading was collected (UTC)
    pub timestamp: DateTime<Utc>,
    /// Device (MAC) identifier of the station
    pub mac_address: String,
    /// Converted metric values
    pub data: ReadingData,
}

/// An aggregation window for one device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PeriodKey {
    /// A calendar month (1-12)
    Month { year: i32, month: u32 },
    /// A calendar year
    Year { year: i32 },
}

impl PeriodKey {
    /// The calendar month containing `ts`.
    pub fn month_of(ts: DateTime<Utc>) -> Self {
        Self::Month {
            year: ts.year(),
            month: ts.month(),
        }
    }

    /// The calendar year containing `ts`.
    pub fn year_of(ts: DateTime<Utc>) -> Self {
        Self::Year { year: ts.year() }
    }

    pub fn year(&self) -> i32 {
        match *self {
            Self::Month { year, .. } | Self::Year { year } => year,
        }
    }

    pub fn month(&self) -> Option<u32> {
        match *self {
            Self::Month { month, .. } => Some(month),
            Self::Year { .. } => None,
        }
    }

    /// Half-open `[start, end)` instant range covered by this period.
    pub fn bounds(&self) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
        let (start, end) = match *self {
            Self::Month { year, month } => {
                let (next_year, next_month) = if month == 12 {
                    (year + 1, 1)
                } else {
                    (year, month + 1)
                };
                (
                    Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0).single(),
                    Utc.with_ymd_and_hms(next_year, next_month, 1, 0, 0, 0)
                        .single(),
                )
            }
            Self::Year { year } => (
                Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0).single(),
                Utc.with_ymd_and_hms(year + 1, 1, 1, 0, 0, 0).single(),
            ),
        };

        match (start, end) {
            (Some(start), Some(end)) => Ok((start, end)),
            _ => Err(StationError::storage_error(format!(
                "invalid aggregation period {}",
                self
            ))),
        }
    }
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Month { year, month } => write!(f, "{:04}-{:02}", year, month),
            Self::Year { year } => write!(f, "{:04}", year),
        }
    }
}

/// Summary statistics of one metric over one period.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricStats {
    pub min: f64,
    pub max: f64,
    /// Arithmetic mean rounded to 2 decimal places
    pub avg: f64,
    /// Number of contributing values
    pub count: u64,
}

impl MetricStats {
    /// Compute statistics over `values`; `None` when there are no values.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }

        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let sum: f64 = values.iter().sum();

        Some(Self {
            min,
            max,
            avg: super::convert::round2(sum / values.len() as f64),
            count: values.len() as u64,
        })
    }
}

/// A stored aggregate row: one metric of one device over one period.
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodAggregate {
    pub mac_address: String,
    pub period: PeriodKey,
    pub metric_name: String,
    pub stats: MetricStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_month_bounds_roll_over_december() {
        let (start, end) = PeriodKey::Month {
            year: 2024,
            month: 12,
        }
        .bounds()
        .unwrap();

        assert_eq!(start, Utc.with_ymd_and_hms(2024, 12, 1, 0, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_invalid_month_is_rejected() {
        let period = PeriodKey::Month {
            year: 2024,
            month: 13,
        };
        assert!(period.bounds().is_err());
    }

    #[test]
    fn test_period_of_timestamp() {
        let ts = Utc.with_ymd_and_hms(2023, 7, 19, 13, 45, 0).unwrap();
        assert_eq!(
            PeriodKey::month_of(ts),
            PeriodKey::Month {
                year: 2023,
                month: 7
            }
        );
        assert_eq!(PeriodKey::year_of(ts), PeriodKey::Year { year: 2023 });
        assert_eq!(PeriodKey::month_of(ts).to_string(), "2023-07");
    }

    #[test]
    fn test_metric_stats() {
        let stats = MetricStats::from_values(&[22.22, 16.5]).unwrap();
        assert_eq!(stats.min, 16.5);
        assert_eq!(stats.max, 22.22);
        assert_eq!(stats.avg, 19.36);
        assert_eq!(stats.count, 2);

        assert!(MetricStats::from_values(&[]).is_none());
    }

    #[test]
    fn test_average_ties_round_to_even() {
        let stats = MetricStats::from_values(&[1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]).unwrap();
        assert_eq!(stats.avg, 0.12);

        let stats = MetricStats::from_values(&[3.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]).unwrap();
        assert_eq!(stats.avg, 0.38);
    }
}
