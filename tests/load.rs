use std::{io::Write, time::Duration};

use observation_loader::{
    core::config,
    loader::{BatchOutcome, BulkWriter, FixedJitter, RetryBudget},
    source::{JsonFileSource, ObservationSource},
    store::{memory::Fault, MemoryStore},
};
use tracing_test::traced_test;

fn report(stations: usize, issued: &str) -> String {
    let records = (0..stations)
        .map(|n| {
            serde_json::json!({
                "stationId": format!("0940{n:02}"),
                "name": format!("Station {n}"),
                "region": "Tasmania",
                "issueTimeUtc": issued,
                "latitude": "-42.89",
                "longitude": "147.33",
                "observations": [{
                    "period": issued,
                    "measurements": [
                        { "type": "air_temperature", "value": "11.2", "unit": "Celsius" },
                        { "type": "wind_spd_kmh", "value": "17", "unit": "km/h" }
                    ]
                }]
            })
        })
        .collect::<Vec<_>>();
    serde_json::to_string_pretty(&records).unwrap()
}

fn write_report(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[tokio::test(start_paused = true)]
#[traced_test]
async fn each_issuance_is_loaded_once() {
    let first = write_report(&report(12, "2021-07-04T03:00:00Z"));
    let second = write_report(&report(12, "2021-07-04T03:30:00Z"));

    let store = MemoryStore::new();
    store.push_insert_fault(Fault::throttle(150));
    let mut writer = BulkWriter::new(store, FixedJitter(Duration::from_millis(1000)));

    let batch = JsonFileSource::new(first.path().to_path_buf())
        .load_observations()
        .await
        .unwrap();
    let outcome = writer
        .write(batch.clone(), RetryBudget::DEFAULT, true)
        .await
        .unwrap();
    assert_eq!(
        outcome,
        BatchOutcome::Written {
            records: 12,
            attempts: 2
        }
    );

    // the same report fetched again
    let outcome = writer
        .write(batch, RetryBudget::DEFAULT, true)
        .await
        .unwrap();
    assert_eq!(outcome, BatchOutcome::AlreadyPresent);

    let batch = JsonFileSource::new(second.path().to_path_buf())
        .load_observations()
        .await
        .unwrap();
    let outcome = writer
        .write(batch, RetryBudget::DEFAULT, true)
        .await
        .unwrap();
    assert!(matches!(outcome, BatchOutcome::Written { records: 12, .. }));

    let store = writer.into_store();
    assert_eq!(store.len(), 24);
    assert_eq!(store.insert_calls(), 3);
    assert!(store.contains("094000-2021-07-04T03:00:00.0000000Z"));
    assert!(store.contains("094011-2021-07-04T03:30:00.0000000Z"));
    assert_eq!(store.writes_of("094006-2021-07-04T03:00:00.0000000Z"), 1);
}

#[tokio::test]
async fn config_file_round_trip() {
    let file = write_report(
        r#"
[datastore]
connection_string = "mongodb://localhost:27017"
use_tls = false
database_name = "weather"
collection_name = "observations"

[loader]
max_retries = 4
jitter_seed = 99

[source]
path = "/tmp/observations.json"
"#,
    );
    let cfg = config::open(file.path()).await.unwrap();
    assert_eq!(cfg.loader.max_retries, 4);
    assert_eq!(cfg.loader.jitter_seed, Some(99));
    assert_eq!(cfg.datastore.connection_string, "mongodb://localhost:27017");
    assert!(!cfg.datastore.use_tls);
}

#[tokio::test]
async fn missing_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("loader.toml");
    let err = config::open(&path).await.unwrap_err();
    let config::ConfigError::Read { path: reported, source } = &err else {
        panic!("expected a read error, got {err:?}");
    };
    assert_eq!(reported, &path);
    assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
    assert!(err.to_string().contains("loader.toml"), "{err}");
}
