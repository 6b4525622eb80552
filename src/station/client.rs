//! HTTP client for the Ambient Weather REST API.

use crate::error::{Result, StationError};
use crate::station::data::ReadingData;
use crate::station::traits::WeatherSource;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// Default base URL of the Ambient Weather REST API.
pub const DEFAULT_API_BASE: &str = "https://rt.ambientweather.net/v1";

/// Timeout for a single upstream round trip.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest response body excerpt carried in an upstream error.
const BODY_EXCERPT_LEN: usize = 200;

/// Result of one fetch against the upstream API.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// The latest raw reading
    Reading(ReadingData),
    /// The API answered successfully but had no readings
    NoData,
    /// HTTP 429
    RateLimited,
    /// Any other non-success status
    UpstreamError { status: u16, body: String },
    /// Timeout, connection failure or other transport problem
    TransportError(String),
}

/// Credentials and device identity for the upstream API.
#[derive(Debug, Clone)]
pub struct ApiCredentials {
    pub api_key: String,
    pub application_key: String,
    pub mac_address: String,
}

/// Client for the `devices/{mac}` endpoint of the Ambient Weather API.
pub struct AmbientClient {
    client: Client,
    device_url: String,
    credentials: ApiCredentials,
}

impl AmbientClient {
    /// Create a client against `api_base` with the default request timeout.
    pub fn new(api_base: &str, credentials: ApiCredentials) -> Result<Self> {
        Self::with_timeout(api_base, credentials, REQUEST_TIMEOUT)
    }

    pub fn with_timeout(
        api_base: &str,
        credentials: ApiCredentials,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        let device_url = format!(
            "{}/devices/{}",
            api_base.trim_end_matches('/'),
            credentials.mac_address
        );

        Ok(Self {
            client,
            device_url,
            credentials,
        })
    }

    /// Full URL of the device endpoint, without query parameters.
    pub fn device_url(&self) -> &str {
        &self.device_url
    }
}

#[async_trait]
impl WeatherSource for AmbientClient {
    async fn fetch_latest(&self) -> Result<FetchOutcome> {
        debug!(url = %self.device_url, "Fetching latest reading");

        let response = match self
            .client
            .get(&self.device_url)
            .query(&[
                ("apiKey", self.credentials.api_key.as_str()),
                ("applicationKey", self.credentials.application_key.as_str()),
                ("limit", "1"),
            ])
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return Ok(FetchOutcome::TransportError(e.to_string())),
        };

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Ok(FetchOutcome::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Ok(FetchOutcome::UpstreamError {
                status: status.as_u16(),
                body: excerpt(&body),
            });
        }

        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => return Ok(FetchOutcome::TransportError(e.to_string())),
        };
        let payload: Value = serde_json::from_slice(&body)?;
        latest_from_payload(payload)
    }
}

/// Pick the latest reading out of the upstream JSON array.
pub fn latest_from_payload(payload: Value) -> Result<FetchOutcome> {
    let Value::Array(items) = payload else {
        let body = excerpt(&payload.to_string());
        warn!(body = %body, "Weather API returned a non-array body");
        return Err(StationError::payload_error(format!(
            "expected a JSON array of readings, got {}",
            body
        )));
    };

    match items.into_iter().next() {
        None => Ok(FetchOutcome::NoData),
        Some(Value::Object(reading)) => Ok(FetchOutcome::Reading(reading)),
        Some(other) => Err(StationError::payload_error(format!(
            "expected a reading object, got {}",
            other
        ))),
    }
}

fn excerpt(body: &str) -> String {
    body.chars().take(BODY_EXCERPT_LEN).collect()
}
