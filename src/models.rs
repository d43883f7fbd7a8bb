use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};

// ============================================================================
// IQAir API Models
// ============================================================================

/// Envelope of every `/city` response.
///
/// `data` is kept loosely typed here: its shape depends on `status`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawReading {
    pub status: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// Payload carried by a non-success response
#[derive(Debug, Deserialize)]
pub struct FailureData {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct CityData {
    pub city: String,
    pub state: String,
    pub country: String,
    pub current: CurrentConditions,
}

/// Sub-readings stay undecoded here; each one is decoded on its own.
#[derive(Debug, Deserialize)]
pub struct CurrentConditions {
    #[serde(default)]
    pub weather: serde_json::Value,
    #[serde(default)]
    pub pollution: serde_json::Value,
}

/// Any field but the timestamp may be null or absent upstream.
#[derive(Debug, Deserialize)]
pub struct WeatherReading {
    pub ts: DateTime<Utc>,
    /// Temperature in Celsius
    pub tp: Option<FieldValue>,
    /// Atmospheric pressure in hPa
    pub pr: Option<FieldValue>,
    /// Humidity in %
    pub hu: Option<FieldValue>,
    /// Wind speed in m/s
    #[serde(default, deserialize_with = "float_from_number_or_string")]
    pub ws: Option<f64>,
    /// Wind direction in degrees (N=0, E=90, S=180, W=270)
    pub wd: Option<FieldValue>,
    /// Icon code, see https://www.airvisual.com/images/<icon>.png
    pub ic: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PollutionReading {
    pub ts: DateTime<Utc>,
    /// AQI based on the US EPA standard
    pub aqius: Option<FieldValue>,
    /// AQI based on the China MEP standard
    pub aqicn: Option<FieldValue>,
}

/// Upstream sends wind speed as an integer, a float or occasionally a string.
fn float_from_number_or_string<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(f64),
        Text(String),
    }

    match Option::<NumberOrString>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumberOrString::Number(value)) => Ok(Some(value)),
        Some(NumberOrString::Text(text)) => {
            text.trim().parse().map(Some).map_err(serde::de::Error::custom)
        }
    }
}

// ============================================================================
// Output Models
// ============================================================================

/// A configured polling target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub name: String,
    pub country: String,
    pub state: String,
    pub city: String,
}

/// A single field value of a time-series record
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Integer(i64),
    Float(f64),
    Text(String),
}

/// One point destined for the time-series database
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub measurement: String,
    pub tags: BTreeMap<String, String>,
    pub time: DateTime<Utc>,
    pub fields: BTreeMap<String, FieldValue>,
}
