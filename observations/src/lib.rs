//! Observation records as issued by a weather service, one record per station per issuance.
//!
//! Records are built by whatever fetched and parsed the report; this crate only
//! defines their shape and how they are keyed once they reach a document store.

pub mod model;

pub use model::{
    period::{Measurement, ObservationPeriod},
    station::{StationID, StoredObservation, WeatherStationObservation},
};
