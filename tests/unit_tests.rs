use chrono::{TimeZone, Utc};
use serde_json::json;
use weather_station::{
    error::StationError,
    station::{
        aggregate::summarize, client::latest_from_payload, convert, numeric_fields, MetricStats,
        PeriodKey, ReadingData,
    },
    FetchOutcome, Settings, WebConfig, DEFAULT_WEB_PORT,
};

fn data(value: serde_json::Value) -> ReadingData {
    value.as_object().cloned().unwrap()
}

/// Every known field is renamed and converted, unknown ones pass through
#[test]
fn test_full_reading_conversion() {
    let raw = data(json!({
        "tempf": 32.0,
        "tempinf": 212.0,
        "windspeedmph": 10.0,
        "baromrelin": 29.92,
        "hourlyrainin": 1.0,
        "humidity": 55,
        "winddir": 180,
        "macAddress": "00:11:22:33:44:55",
        "lastRain": "2024-01-01T00:00:00.000Z",
        "mystery": "kept"
    }));

    let converted = convert(&raw);

    assert_eq!(converted["temp_c"], json!(0.0));
    assert_eq!(converted["temp_in_c"], json!(100.0));
    assert_eq!(converted["wind_speed_kmh"], json!(16.09));
    assert_eq!(converted["barom_rel_hpa"], json!(1013.21));
    assert_eq!(converted["hourly_rain_mm"], json!(25.4));
    assert_eq!(converted["humidity"], json!(55));
    assert_eq!(converted["wind_dir"], json!(180));
    assert_eq!(converted["mystery"], json!("kept"));
    assert!(!converted.contains_key("macAddress"));
    assert!(!converted.contains_key("lastRain"));
}

/// Non-numeric values under numeric keys are kept as-is and never aggregated
#[test]
fn test_non_numeric_values_are_not_aggregated() {
    let converted = convert(&data(json!({
        "tempf": "n/a",
        "humidity": 40,
        "battout": true,
        "tz": "America/New_York"
    })));

    assert_eq!(converted["temp_c"], json!("n/a"));

    let numeric = numeric_fields(&converted);
    assert_eq!(numeric.len(), 1);
    assert_eq!(numeric.get("humidity"), Some(&40.0));
}

#[test]
fn test_summarize_per_metric() {
    let readings = vec![
        data(json!({"temp_c": 10.0, "humidity": 50})),
        data(json!({"temp_c": 20.0})),
        data(json!({"temp_c": 15.5, "humidity": 70, "note": "ignored"})),
    ];

    let summary = summarize(&readings);
    assert_eq!(summary.len(), 2);

    let temp = &summary["temp_c"];
    assert_eq!(temp.min, 10.0);
    assert_eq!(temp.max, 20.0);
    assert_eq!(temp.avg, 15.17);
    assert_eq!(temp.count, 3);

    let humidity = &summary["humidity"];
    assert_eq!(humidity.avg, 60.0);
    assert_eq!(humidity.count, 2);
}

#[test]
fn test_metric_stats_of_nothing() {
    assert_eq!(MetricStats::from_values(&[]), None);
}

#[test]
fn test_period_keys_and_bounds() {
    let ts = Utc.with_ymd_and_hms(2024, 12, 31, 23, 59, 59).unwrap();

    let month = PeriodKey::month_of(ts);
    assert_eq!(month.to_string(), "2024-12");
    let (start, end) = month.bounds().unwrap();
    assert_eq!(start, Utc.with_ymd_and_hms(2024, 12, 1, 0, 0, 0).unwrap());
    assert_eq!(end, Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());

    let year = PeriodKey::year_of(ts);
    assert_eq!(year.month(), None);
    let (start, end) = year.bounds().unwrap();
    assert_eq!(start, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
    assert_eq!(end, Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());
}

#[test]
fn test_upstream_payload_shapes() {
    assert_eq!(latest_from_payload(json!([])).unwrap(), FetchOutcome::NoData);

    let outcome = latest_from_payload(json!([{"tempf": 50.0}, {"tempf": 40.0}])).unwrap();
    assert_eq!(outcome, FetchOutcome::Reading(data(json!({"tempf": 50.0}))));

    assert!(matches!(
        latest_from_payload(json!({"error": "boom"})),
        Err(StationError::Payload(_))
    ));
    assert!(latest_from_payload(json!([42])).is_err());
}

#[test]
fn test_station_error_types() {
    let config_error = StationError::config_error("bad interval");
    assert!(matches!(config_error, StationError::Config(_)));
    assert_eq!(config_error.to_string(), "Configuration error: bad interval");

    let storage_error = StationError::storage_error("locked");
    assert!(matches!(storage_error, StationError::Storage(_)));

    let web_error = StationError::web_server_error("bind failed");
    assert!(matches!(web_error, StationError::WebServer(_)));

    let json_error = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
    let wrapped: StationError = json_error.into();
    assert!(matches!(wrapped, StationError::Serialization(_)));
}

#[test]
fn test_web_config() {
    let config = WebConfig::default();
    assert_eq!(config.host, "0.0.0.0");
    assert_eq!(config.port, DEFAULT_WEB_PORT);
    assert!(config.enable_cors);

    let custom = WebConfig::new("127.0.0.1", 9000).with_cors(false);
    assert_eq!(custom.bind_address(), "127.0.0.1:9000");
    assert!(!custom.enable_cors);
}

#[test]
fn test_settings_from_lookup() {
    let settings = Settings::from_lookup(|name| match name {
        "AWN_API_KEY" => Some("key".to_string()),
        "AWN_APPLICATION_KEY" => Some("app".to_string()),
        "AWN_MAC_ADDRESS" => Some("00:11:22:33:44:55".to_string()),
        "COLLECTION_INTERVAL_SECONDS" => Some(" 30 ".to_string()),
        _ => None,
    })
    .unwrap();

    assert_eq!(settings.collection_interval_secs, 30);
    let credentials = settings.credentials().unwrap();
    assert_eq!(credentials.mac_address, "00:11:22:33:44:55");
}
