use std::collections::BTreeMap;

use serde::Deserialize;

use crate::constants::STATUS_SUCCESS;
use crate::error::BuildError;
use crate::models::{
    CityData, FailureData, FieldValue, Location, PollutionReading, RawReading, Record, WeatherReading,
};

/// Turns IQAir readings into weather and pollution records.
///
/// A measurement with no configured name is never emitted.
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    weather: Option<String>,
    pollution: Option<String>,
}

impl RecordBuilder {
    /// Blank names count as unset
    pub fn new(weather: Option<String>, pollution: Option<String>) -> Self {
        let named = |name: Option<String>| name.filter(|n| !n.trim().is_empty());
        let builder = Self {
            weather: named(weather),
            pollution: named(pollution),
        };
        if builder.is_disabled() {
            tracing::warn!(
                "Neither measurement_weather nor measurement_pollution is set; no records will be imported"
            );
        }
        builder
    }

    /// True when neither measurement has a name
    pub fn is_disabled(&self) -> bool {
        self.weather.is_none() && self.pollution.is_none()
    }

    /// Builds the configured records for one reading.
    ///
    /// A sub-reading that fails to decode is logged and skipped on its own;
    /// only a broken envelope fails the whole reading.
    pub fn build(&self, reading: &RawReading, location: &Location) -> Result<Vec<Record>, BuildError> {
        if self.is_disabled() {
            return Ok(Vec::new());
        }
        if reading.status != STATUS_SUCCESS {
            let message = FailureData::deserialize(&reading.data)
                .map(|failure| failure.message)
                .unwrap_or_else(|_| reading.status.clone());
            return Err(BuildError::Unsuccessful { message });
        }

        let data = CityData::deserialize(&reading.data)?;
        let tags = BTreeMap::from([
            ("location".to_string(), location.name.clone()),
            ("city".to_string(), data.city.clone()),
            ("state".to_string(), data.state.clone()),
            ("country".to_string(), data.country.clone()),
        ]);

        let mut records = Vec::with_capacity(2);

        if let Some(measurement) = &self.weather {
            match WeatherReading::deserialize(&data.current.weather) {
                Ok(weather) => records.extend(weather_record(measurement, &tags, weather)),
                Err(e) => tracing::warn!("Skipping weather for {}: {}", location.name, e),
            }
        }

        if let Some(measurement) = &self.pollution {
            match PollutionReading::deserialize(&data.current.pollution) {
                Ok(pollution) => records.extend(pollution_record(measurement, &tags, pollution)),
                Err(e) => tracing::warn!("Skipping pollution for {}: {}", location.name, e),
            }
        }

        Ok(records)
    }
}

fn weather_record(
    measurement: &str,
    tags: &BTreeMap<String, String>,
    weather: WeatherReading,
) -> Option<Record> {
    let fields = present_fields([
        ("temperature", weather.tp),
        ("pressure", weather.pr),
        ("humidity", weather.hu),
        // Always a float so the series never flips type
        ("wind_speed", weather.ws.map(FieldValue::Float)),
        ("wind_direction", weather.wd),
        ("icon", weather.ic.map(FieldValue::Text)),
    ])?;
    Some(Record {
        measurement: measurement.to_string(),
        tags: tags.clone(),
        time: weather.ts,
        fields,
    })
}

fn pollution_record(
    measurement: &str,
    tags: &BTreeMap<String, String>,
    pollution: PollutionReading,
) -> Option<Record> {
    let fields = present_fields([("aqi_us", pollution.aqius), ("aqi_cn", pollution.aqicn)])?;
    Some(Record {
        measurement: measurement.to_string(),
        tags: tags.clone(),
        time: pollution.ts,
        fields,
    })
}

/// Drops absent values; `None` when nothing is left to write.
fn present_fields<const N: usize>(
    fields: [(&str, Option<FieldValue>); N],
) -> Option<BTreeMap<String, FieldValue>> {
    let fields: BTreeMap<String, FieldValue> = fields
        .into_iter()
        .filter_map(|(name, value)| Some((name.to_string(), value?)))
        .collect();
    (!fields.is_empty()).then_some(fields)
}
