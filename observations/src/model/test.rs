use chrono::{TimeZone, Utc};

use super::{period::Measurement, period::ObservationPeriod, station::WeatherStationObservation};

fn station(id: &str, minute: u32) -> WeatherStationObservation {
    WeatherStationObservation {
        station_id: id.to_string(),
        name: "Sydney - Observatory Hill".to_string(),
        region: "New South Wales".to_string(),
        issue_time_utc: Utc.with_ymd_and_hms(2020, 3, 1, 6, minute, 0).unwrap(),
        description: "Sydney (Observatory Hill)".to_string(),
        latitude: "-33.8607".to_string(),
        longitude: "151.2050".to_string(),
        timezone: "Australia/Sydney".to_string(),
        height: "39.0".to_string(),
        observations: vec![ObservationPeriod {
            period: Utc.with_ymd_and_hms(2020, 3, 1, 6, 0, 0).unwrap(),
            measurements: vec![Measurement {
                kind: "air_temperature".to_string(),
                value: "21.4".to_string(),
                unit: Some("Celsius".to_string()),
                duration: None,
                start_timestamp_utc: None,
                end_timestamp_utc: None,
            }],
        }],
    }
}

#[test]
fn id_is_derived_from_station_and_issue_time() {
    let obs = station("066062", 30);
    assert_eq!(obs.id(), "066062-2020-03-01T06:30:00.0000000Z");
}

#[test]
fn id_keeps_sub_second_precision() {
    let mut obs = station("066062", 30);
    obs.issue_time_utc = obs.issue_time_utc + chrono::Duration::milliseconds(125);
    assert_eq!(obs.id(), "066062-2020-03-01T06:30:00.1250000Z");
}

#[test]
fn same_station_and_issuance_collide() {
    let a = station("066062", 30);
    let mut b = station("066062", 30);
    b.name = "renamed".to_string();
    assert_eq!(a.id(), b.id());
    assert_ne!(a.id(), station("066062", 0).id());
    assert_ne!(a.id(), station("066037", 30).id());
}

#[test]
fn stored_form_carries_derived_key() {
    let obs = station("066062", 30);
    let json = serde_json::to_value(obs.stored()).unwrap();
    assert_eq!(json["_id"], "066062-2020-03-01T06:30:00.0000000Z");
    assert_eq!(json["stationId"], "066062");
    assert_eq!(json["observations"][0]["measurements"][0]["type"], "air_temperature");
    assert!(json["observations"][0]["measurements"][0].get("duration").is_none());
}

#[test]
fn stored_key_is_ignored_when_reading_back() {
    let obs = station("066062", 30);
    let mut json = serde_json::to_value(obs.stored()).unwrap();
    json["_id"] = serde_json::Value::String("something-else".to_string());
    let read: WeatherStationObservation = serde_json::from_value(json).unwrap();
    assert_eq!(read, obs);
    assert_eq!(read.id(), obs.id());
}
