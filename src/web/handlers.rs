//! HTTP handlers for the query endpoints.

use crate::station::data::{PeriodAggregate, Reading};
use crate::storage::{ReadingPage, ReadingQuery};
use crate::web::AppState;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tracing::error;

/// Default page size of `/api/daily`
pub const DEFAULT_PAGE_LIMIT: u32 = 100;

/// Largest accepted page size of `/api/daily`
pub const MAX_PAGE_LIMIT: u32 = 1000;

type ApiError = (StatusCode, Json<Value>);
type ApiResult<T> = Result<Json<T>, ApiError>;

fn bad_request(message: impl Into<String>) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": message.into() })),
    )
}

fn internal_error(err: impl std::fmt::Display) -> ApiError {
    error!("Query failed: {}", err);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "internal server error" })),
    )
}

#[derive(Debug, Default, Deserialize)]
pub struct DailyParams {
    pub mac_address: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DeviceParams {
    pub mac_address: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MonthlyParams {
    pub mac_address: Option<String>,
    pub year: Option<i32>,
    pub month: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct YearlyParams {
    pub mac_address: Option<String>,
    pub year: Option<i32>,
}

/// Statistics of one metric in an aggregate response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AggregateMetric {
    pub metric_name: String,
    pub min_value: f64,
    pub max_value: f64,
    pub avg_value: f64,
    pub count: u64,
}

impl From<&PeriodAggregate> for AggregateMetric {
    fn from(row: &PeriodAggregate) -> Self {
        Self {
            metric_name: row.metric_name.clone(),
            min_value: row.stats.min,
            max_value: row.stats.max,
            avg_value: row.stats.avg,
            count: row.stats.count,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonthlyAggregateResponse {
    pub mac_address: String,
    pub year: i32,
    pub month: u32,
    pub metrics: Vec<AggregateMetric>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct YearlyAggregateResponse {
    pub mac_address: String,
    pub year: i32,
    pub metrics: Vec<AggregateMetric>,
}

fn device_or_default(state: &AppState, requested: Option<String>) -> String {
    requested
        .filter(|mac| !mac.is_empty())
        .unwrap_or_else(|| state.mac_address.clone())
}

/// Health check endpoint.
pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "weather-station",
        "version": env!("CARGO_PKG_VERSION"),
        "subscribers": state.broadcaster.subscriber_count(),
        "timestamp": Utc::now().to_rfc3339()
    }))
}

/// Paginated raw readings, newest first.
pub async fn list_daily(
    State(state): State<AppState>,
    Query(params): Query<DailyParams>,
) -> ApiResult<ReadingPage> {
    let limit = params.limit.unwrap_or(DEFAULT_PAGE_LIMIT);
    if !(1..=MAX_PAGE_LIMIT).contains(&limit) {
        return Err(bad_request(format!(
            "limit must be between 1 and {}",
            MAX_PAGE_LIMIT
        )));
    }

    let query = ReadingQuery {
        mac_address: device_or_default(&state, params.mac_address),
        start: params.start,
        end: params.end,
        limit,
        offset: params.offset.unwrap_or(0),
    };

    state
        .store
        .list_readings(&query)
        .await
        .map(Json)
        .map_err(internal_error)
}

/// The most recent raw reading, or `null`.
pub async fn latest_daily(
    State(state): State<AppState>,
    Query(params): Query<DeviceParams>,
) -> ApiResult<Option<Reading>> {
    let mac = device_or_default(&state, params.mac_address);
    state
        .store
        .latest_reading(&mac)
        .await
        .map(Json)
        .map_err(internal_error)
}

/// Monthly aggregates of a year (default: current UTC year), grouped by month.
pub async fn list_monthly(
    State(state): State<AppState>,
    Query(params): Query<MonthlyParams>,
) -> ApiResult<Vec<MonthlyAggregateResponse>> {
    if let Some(month) = params.month {
        if !(1..=12).contains(&month) {
            return Err(bad_request("month must be between 1 and 12"));
        }
    }

    let mac = device_or_default(&state, params.mac_address);
    let year = params.year.unwrap_or_else(|| Utc::now().year());
    let rows = state
        .store
        .monthly_aggregates(&mac, year, params.month)
        .await
        .map_err(internal_error)?;

    let mut grouped: BTreeMap<u32, Vec<AggregateMetric>> = BTreeMap::new();
    for row in &rows {
        if let Some(month) = row.period.month() {
            grouped.entry(month).or_default().push(row.into());
        }
    }

    Ok(Json(
        grouped
            .into_iter()
            .map(|(month, metrics)| MonthlyAggregateResponse {
                mac_address: mac.clone(),
                year,
                month,
                metrics,
            })
            .collect(),
    ))
}

/// Yearly aggregates (default: current UTC year).
pub async fn list_yearly(
    State(state): State<AppState>,
    Query(params): Query<YearlyParams>,
) -> ApiResult<Vec<YearlyAggregateResponse>> {
    let mac = device_or_default(&state, params.mac_address);
    let year = params.year.unwrap_or_else(|| Utc::now().year());
    let rows = state
        .store
        .yearly_aggregates(&mac, year)
        .await
        .map_err(internal_error)?;

    if rows.is_empty() {
        return Ok(Json(Vec::new()));
    }

    Ok(Json(vec![YearlyAggregateResponse {
        mac_address: mac,
        year,
        metrics: rows.iter().map(AggregateMetric::from).collect(),
    }]))
}
