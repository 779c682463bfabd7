use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// All measurements taken by a station for one point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservationPeriod {
    pub period: DateTime<Utc>,
    #[serde(default)]
    pub measurements: Vec<Measurement>,
}

/// A single reading (air temperature, wind speed, rainfall since 9am, etc)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Measurement {
    /// kind of reading, as named by the issuing service (e.g. `air_temperature`)
    #[serde(rename = "type")]
    pub kind: String,
    /// kept as text, the issuing service does not guarantee numeric values
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    /// accumulation window in minutes, for readings like rainfall
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_timestamp_utc: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_timestamp_utc: Option<DateTime<Utc>>,
}
