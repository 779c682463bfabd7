use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::period::ObservationPeriod;

/// Identifier assigned to a station by the issuing service
pub type StationID = String;

/// Everything one station reported in one issuance of the observation product.
///
/// There is deliberately no `id` field: the record's identity is always derived
/// from `(station_id, issue_time_utc)` (see [`WeatherStationObservation::id`]), so
/// two records for the same station and issuance always collide in the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherStationObservation {
    pub station_id: StationID,
    pub name: String,
    pub region: String,
    pub issue_time_utc: DateTime<Utc>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub latitude: String,
    #[serde(default)]
    pub longitude: String,
    #[serde(default)]
    pub timezone: String,
    #[serde(default)]
    pub height: String,
    #[serde(default)]
    pub observations: Vec<ObservationPeriod>,
}

impl WeatherStationObservation {
    /// The record's key: `{station_id}-{issue time}`.
    ///
    /// The issue time is rendered with seven fractional digits and a `Z` suffix
    /// (`2020-03-01T06:30:00.0000000Z`), which keeps keys stable against
    /// documents already written by other loaders of the same product.
    pub fn id(&self) -> String {
        format!(
            "{}-{}.{:07}Z",
            self.station_id,
            self.issue_time_utc.format("%Y-%m-%dT%H:%M:%S"),
            self.issue_time_utc.timestamp_subsec_nanos() / 100,
        )
    }

    /// View of this record as it is stored, with the derived key as `_id`
    pub fn stored(&self) -> StoredObservation<'_> {
        StoredObservation {
            id: self.id(),
            observation: self,
        }
    }
}

/// Serialization-only form of a record, as written to the document store
#[derive(Debug, Clone, Serialize)]
pub struct StoredObservation<'a> {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(flatten)]
    pub observation: &'a WeatherStationObservation,
}
