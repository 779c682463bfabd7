//! In-process store with the same failure modes as a throttled document store.
//!
//! Inserts are ordered: the first rejected record stops the batch and every record after it
//! is reported as unprocessed, the way the Mongo wire protocol reports an ordered `insertMany`.
//! Faults are queued up front and consumed one per call.

use std::{
    collections::{BTreeMap, HashMap, VecDeque},
    sync::{Mutex, MutexGuard},
};

use observations::WeatherStationObservation;

use super::{BulkWriteFailure, ObservationStore, RecordError, StoreError};

pub const DUPLICATE_KEY_CODE: i32 = 11000;
pub const THROTTLED_CODE: i32 = 16500;

/// What to do instead of a plain successful call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// land the first half of the batch, throttle the next record, leave the rest unprocessed
    Throttle { retry_after_ms: u64 },
    /// land the first `accept` records, reject the next with `message`, leave the rest unprocessed
    RejectAfter { accept: usize, code: i32, message: String },
    /// land everything but still report a bulk failure with nothing in it
    EmptyBulkFailure,
    /// refuse the whole operation
    Command { code: i32, message: String },
    Connection(String),
}

impl Fault {
    pub fn throttle(retry_after_ms: u64) -> Self {
        Self::Throttle { retry_after_ms }
    }

    /// a throttled count query, as the store reports it
    pub fn throttled_command(retry_after_ms: u64) -> Self {
        Self::Command {
            code: THROTTLED_CODE,
            message: throttle_message(retry_after_ms),
        }
    }
}

fn throttle_message(retry_after_ms: u64) -> String {
    format!(
        "Error={THROTTLED_CODE}, RetryAfterMs={retry_after_ms}, Details='Response status code does not indicate success: TooManyRequests (429)'"
    )
}

#[derive(Debug, Default)]
struct Inner {
    docs: BTreeMap<String, WeatherStationObservation>,
    insert_faults: VecDeque<Fault>,
    count_faults: VecDeque<Fault>,
    insert_calls: usize,
    count_calls: usize,
    /// how many times each id was written
    writes: HashMap<String, usize>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that already holds `records`
    pub fn with_records(records: impl IntoIterator<Item = WeatherStationObservation>) -> Self {
        let store = Self::new();
        {
            let mut inner = store.lock();
            for record in records {
                inner.docs.insert(record.id(), record);
            }
        }
        store
    }

    pub fn push_insert_fault(&self, fault: Fault) {
        self.lock().insert_faults.push_back(fault);
    }

    pub fn push_count_fault(&self, fault: Fault) {
        self.lock().count_faults.push_back(fault);
    }

    pub fn insert_calls(&self) -> usize {
        self.lock().insert_calls
    }

    pub fn count_calls(&self) -> usize {
        self.lock().count_calls
    }

    pub fn len(&self) -> usize {
        self.lock().docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lock().docs.contains_key(id)
    }

    /// number of times a record with this id was written by `insert_many`
    pub fn writes_of(&self, id: &str) -> usize {
        self.lock().writes.get(id).copied().unwrap_or(0)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Inner {
    /// Ordered insert of `records[..limit]`, returning the first failure
    fn insert_ordered(
        &mut self,
        records: &[WeatherStationObservation],
        limit: usize,
    ) -> Option<RecordError> {
        for (index, record) in records.iter().take(limit).enumerate() {
            let id = record.id();
            if self.docs.contains_key(&id) {
                return Some(RecordError {
                    index,
                    code: DUPLICATE_KEY_CODE,
                    message: format!(
                        "E11000 duplicate key error collection: observations index: _id_ dup key: {{ _id: {id:?} }}"
                    ),
                });
            }
            *self.writes.entry(id.clone()).or_default() += 1;
            self.docs.insert(id, record.clone());
        }
        None
    }

    fn partial(
        &mut self,
        records: &[WeatherStationObservation],
        accept: usize,
        code: i32,
        message: String,
    ) -> StoreError {
        let accept = accept.min(records.len());
        let rejected = self
            .insert_ordered(records, accept)
            .unwrap_or(RecordError {
                index: accept,
                code,
                message,
            });
        StoreError::BulkWrite(BulkWriteFailure {
            unprocessed: (rejected.index + 1..records.len()).collect(),
            write_errors: if rejected.index < records.len() {
                vec![rejected]
            } else {
                vec![]
            },
        })
    }
}

#[async_trait]
impl ObservationStore for MemoryStore {
    async fn count_by_id(&self, id: &str) -> Result<u64, StoreError> {
        let mut inner = self.lock();
        inner.count_calls += 1;
        let fault = inner.count_faults.pop_front();
        match fault {
            Some(Fault::Command { code, message }) => Err(StoreError::Command { code, message }),
            Some(Fault::Connection(msg)) => Err(StoreError::Connection(msg)),
            Some(other) => {
                warn!("MemoryStore: fault {other:?} does not apply to a count query, ignoring");
                Ok(inner.docs.contains_key(id) as u64)
            }
            None => Ok(inner.docs.contains_key(id) as u64),
        }
    }

    async fn insert_many(&self, records: &[WeatherStationObservation]) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.insert_calls += 1;
        let fault = inner.insert_faults.pop_front();
        match fault {
            None => match inner.insert_ordered(records, records.len()) {
                None => Ok(()),
                Some(rejected) => Err(StoreError::BulkWrite(BulkWriteFailure::ordered(
                    vec![rejected],
                    records.len(),
                ))),
            },
            Some(Fault::Throttle { retry_after_ms }) => Err(inner.partial(
                records,
                records.len() / 2,
                THROTTLED_CODE,
                throttle_message(retry_after_ms),
            )),
            Some(Fault::RejectAfter {
                accept,
                code,
                message,
            }) => Err(inner.partial(records, accept, code, message)),
            Some(Fault::EmptyBulkFailure) => {
                if let Some(rejected) = inner.insert_ordered(records, records.len()) {
                    warn!(
                        "MemoryStore: empty bulk failure hides a rejected record: {}",
                        rejected.message
                    );
                }
                Err(StoreError::BulkWrite(BulkWriteFailure::default()))
            }
            Some(Fault::Command { code, message }) => Err(StoreError::Command { code, message }),
            Some(Fault::Connection(msg)) => Err(StoreError::Connection(msg)),
        }
    }
}

#[cfg(test)]
mod test {
    use chrono::{TimeZone, Utc};
    use tracing_test::traced_test;

    use super::*;

    fn record(station: &str) -> WeatherStationObservation {
        WeatherStationObservation {
            station_id: station.to_string(),
            name: station.to_string(),
            region: "Tasmania".to_string(),
            issue_time_utc: Utc.with_ymd_and_hms(2022, 1, 5, 12, 0, 0).unwrap(),
            description: String::new(),
            latitude: String::new(),
            longitude: String::new(),
            timezone: String::new(),
            height: String::new(),
            observations: vec![],
        }
    }

    #[tokio::test]
    #[traced_test]
    async fn duplicate_stops_an_ordered_insert() {
        let store = MemoryStore::with_records([record("094029")]);
        let err = store
            .insert_many(&[record("094008"), record("094029"), record("094212")])
            .await
            .unwrap_err();
        let StoreError::BulkWrite(failure) = err else {
            panic!("expected a bulk write failure, got {err:?}");
        };
        assert_eq!(failure.write_errors.len(), 1);
        assert_eq!(failure.write_errors[0].index, 1);
        assert_eq!(failure.write_errors[0].code, DUPLICATE_KEY_CODE);
        assert_eq!(failure.unprocessed, vec![2]);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    #[traced_test]
    async fn empty_bulk_failure_reports_a_hidden_duplicate() {
        let store = MemoryStore::with_records([record("094029")]);
        store.push_insert_fault(Fault::EmptyBulkFailure);
        let err = store
            .insert_many(&[record("094008"), record("094029")])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::BulkWrite(ref f) if *f == BulkWriteFailure::default()));
        assert!(logs_contain("empty bulk failure hides a rejected record"));
        assert!(logs_contain("E11000 duplicate key error"));
    }

    #[tokio::test]
    #[traced_test]
    async fn empty_bulk_failure_without_duplicates_is_quiet() {
        let store = MemoryStore::new();
        store.push_insert_fault(Fault::EmptyBulkFailure);
        store
            .insert_many(&[record("094008"), record("094029")])
            .await
            .unwrap_err();
        assert_eq!(store.len(), 2);
        assert!(!logs_contain("hides a rejected record"));
    }
}
