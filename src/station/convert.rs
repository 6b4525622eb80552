//! Imperial to metric conversion of raw station fields.
//!
//! The upstream API reports temperatures in Fahrenheit, wind in mph,
//! pressure in inHg and rainfall in inches. [`convert`] maps a raw reading
//! onto metric field names through the static [`FIELD_MAPPINGS`] table;
//! [`numeric_fields`] then picks out the values that can be aggregated.

use super::data::ReadingData;
use lazy_static::lazy_static;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use Conversion::{
    FahrenheitToCelsius as F2C, InHgToHpa as HG2HPA, InchesToMm as IN2MM, MphToKmh as MPH2KMH,
};

/// Round to 2 decimal places, ties to even.
pub(crate) fn round2(value: f64) -> f64 {
    let scaled = value * 100.0;
    let rounded = if (scaled - scaled.trunc()).abs() == 0.5 {
        2.0 * (scaled / 2.0).round()
    } else {
        scaled.round()
    };
    rounded / 100.0
}

/// A unit conversion applied to a numeric source value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conversion {
    FahrenheitToCelsius,
    MphToKmh,
    InHgToHpa,
    InchesToMm,
}

impl Conversion {
    /// Convert `value` and round the result to 2 decimal places.
    pub fn apply(self, value: f64) -> f64 {
        let converted = match self {
            Self::FahrenheitToCelsius => (value - 32.0) * 5.0 / 9.0,
            Self::MphToKmh => value * 1.60934,
            Self::InHgToHpa => value * 33.8639,
            Self::InchesToMm => value * 25.4,
        };
        round2(converted)
    }
}

/// Maps one upstream field onto its output name and optional conversion.
#[derive(Debug, Clone, Copy)]
pub struct FieldMapping {
    pub source: &'static str,
    pub target: &'static str,
    pub conversion: Option<Conversion>,
}

const fn map(
    source: &'static str,
    target: &'static str,
    conversion: Option<Conversion>,
) -> FieldMapping {
    FieldMapping {
        source,
        target,
        conversion,
    }
}

/// Every upstream field with a known metric name.
pub const FIELD_MAPPINGS: &[FieldMapping] = &[
    // Temperature
    map("tempf", "temp_c", Some(F2C)),
    map("tempinf", "temp_in_c", Some(F2C)),
    map("temp1f", "temp1_c", Some(F2C)),
    map("temp2f", "temp2_c", Some(F2C)),
    map("temp3f", "temp3_c", Some(F2C)),
    map("temp4f", "temp4_c", Some(F2C)),
    map("temp5f", "temp5_c", Some(F2C)),
    map("temp6f", "temp6_c", Some(F2C)),
    map("temp7f", "temp7_c", Some(F2C)),
    map("temp8f", "temp8_c", Some(F2C)),
    map("temp9f", "temp9_c", Some(F2C)),
    map("temp10f", "temp10_c", Some(F2C)),
    map("feelsLike", "feels_like_c", Some(F2C)),
    map("feelsLikein", "feels_like_in_c", Some(F2C)),
    map("feelsLike1", "feels_like1_c", Some(F2C)),
    map("feelsLike2", "feels_like2_c", Some(F2C)),
    map("feelsLike3", "feels_like3_c", Some(F2C)),
    map("feelsLike4", "feels_like4_c", Some(F2C)),
    map("feelsLike5", "feels_like5_c", Some(F2C)),
    map("feelsLike6", "feels_like6_c", Some(F2C)),
    map("feelsLike7", "feels_like7_c", Some(F2C)),
    map("feelsLike8", "feels_like8_c", Some(F2C)),
    map("feelsLike9", "feels_like9_c", Some(F2C)),
    map("feelsLike10", "feels_like10_c", Some(F2C)),
    map("dewPoint", "dew_point_c", Some(F2C)),
    map("dewPointin", "dew_point_in_c", Some(F2C)),
    map("dewPoint1", "dew_point1_c", Some(F2C)),
    map("dewPoint2", "dew_point2_c", Some(F2C)),
    map("dewPoint3", "dew_point3_c", Some(F2C)),
    map("dewPoint4", "dew_point4_c", Some(F2C)),
    map("dewPoint5", "dew_point5_c", Some(F2C)),
    map("dewPoint6", "dew_point6_c", Some(F2C)),
    map("dewPoint7", "dew_point7_c", Some(F2C)),
    map("dewPoint8", "dew_point8_c", Some(F2C)),
    map("dewPoint9", "dew_point9_c", Some(F2C)),
    map("dewPoint10", "dew_point10_c", Some(F2C)),
    // Wind speed
    map("windspeedmph", "wind_speed_kmh", Some(MPH2KMH)),
    map("windgustmph", "wind_gust_kmh", Some(MPH2KMH)),
    map("maxdailygust", "max_daily_gust_kmh", Some(MPH2KMH)),
    map("windspdmph_avg2m", "wind_speed_avg_2m_kmh", Some(MPH2KMH)),
    map("windspdmph_avg10m", "wind_speed_avg_10m_kmh", Some(MPH2KMH)),
    // Pressure
    map("baromrelin", "barom_rel_hpa", Some(HG2HPA)),
    map("baromabsin", "barom_abs_hpa", Some(HG2HPA)),
    // Rainfall
    map("hourlyrainin", "hourly_rain_mm", Some(IN2MM)),
    map("dailyrainin", "daily_rain_mm", Some(IN2MM)),
    map("weeklyrainin", "weekly_rain_mm", Some(IN2MM)),
    map("monthlyrainin", "monthly_rain_mm", Some(IN2MM)),
    map("yearlyrainin", "yearly_rain_mm", Some(IN2MM)),
    map("eventrainin", "event_rain_mm", Some(IN2MM)),
    map("totalrainin", "total_rain_mm", Some(IN2MM)),
    map("24hourrainin", "rain_24h_mm", Some(IN2MM)),
    // Renamed only
    map("humidity", "humidity", None),
    map("humidityin", "humidity_in", None),
    map("humidity1", "humidity1", None),
    map("humidity2", "humidity2", None),
    map("humidity3", "humidity3", None),
    map("humidity4", "humidity4", None),
    map("humidity5", "humidity5", None),
    map("humidity6", "humidity6", None),
    map("humidity7", "humidity7", None),
    map("humidity8", "humidity8", None),
    map("humidity9", "humidity9", None),
    map("humidity10", "humidity10", None),
    map("winddir", "wind_dir", None),
    map("windgustdir", "wind_gust_dir", None),
    map("winddir_avg2m", "wind_dir_avg_2m", None),
    map("winddir_avg10m", "wind_dir_avg_10m", None),
    map("uv", "uv", None),
    map("solarradiation", "solar_radiation", None),
    map("date", "date", None),
    map("dateutc", "date_utc", None),
    map("tz", "tz", None),
];

/// Device metadata fields, never part of a converted reading.
pub const EXCLUDED_FIELDS: &[&str] = &["macAddress", "device", "loc", "lastRain"];

/// Converted fields that are never aggregated, even when numeric.
pub const NON_NUMERIC_FIELDS: &[&str] = &["date", "date_utc", "tz"];

lazy_static! {
    static ref MAPPINGS_BY_SOURCE: HashMap<&'static str, FieldMapping> = FIELD_MAPPINGS
        .iter()
        .map(|mapping| (mapping.source, *mapping))
        .collect();
    static ref EXCLUDED: HashSet<&'static str> = EXCLUDED_FIELDS.iter().copied().collect();
}

/// Look up the mapping for an upstream field name.
pub fn mapping_for(source: &str) -> Option<&'static FieldMapping> {
    MAPPINGS_BY_SOURCE.get(source)
}

/// Convert a raw upstream reading to metric units.
///
/// Excluded metadata is dropped, mapped fields are renamed (and converted
/// when numeric), unknown fields pass through untouched.
pub fn convert(raw: &ReadingData) -> ReadingData {
    let mut converted = ReadingData::new();

    for (key, value) in raw {
        if EXCLUDED.contains(key.as_str()) {
            continue;
        }

        match mapping_for(key) {
            Some(mapping) => {
                let value = match (mapping.conversion, as_number(value)) {
                    (Some(conversion), Some(number)) => Value::from(conversion.apply(number)),
                    _ => value.clone(),
                };
                converted.insert(mapping.target.to_string(), value);
            }
            None => {
                converted.insert(key.clone(), value.clone());
            }
        }
    }

    converted
}

/// Extract the numeric entries of a converted reading that can be aggregated.
pub fn numeric_fields(converted: &ReadingData) -> BTreeMap<String, f64> {
    converted
        .iter()
        .filter(|(key, _)| !NON_NUMERIC_FIELDS.contains(&key.as_str()))
        .filter_map(|(key, value)| as_number(value).map(|number| (key.clone(), number)))
        .collect()
}

// Booleans are not numbers here.
fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        _ => None,
    }
}
