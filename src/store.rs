//! The document store, seen only through the two operations a batch load needs.

use observations::WeatherStationObservation;

pub mod memory;
#[cfg(feature = "mongo")]
pub mod mongo;

pub use memory::MemoryStore;
#[cfg(feature = "mongo")]
pub use mongo::MongoStore;

/// One record the store refused during a bulk insert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordError {
    /// position of the record in the submitted batch
    pub index: usize,
    /// the store's own error code (the retry relevant code lives in `message`)
    pub code: i32,
    pub message: String,
}

/// A bulk insert that landed only part of its batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkWriteFailure {
    pub write_errors: Vec<RecordError>,
    /// positions of records the store never got to (an ordered insert stops at the first error)
    pub unprocessed: Vec<usize>,
}

impl BulkWriteFailure {
    /// An ordered insert stops at its first error, so everything after the last reported
    /// error was never attempted
    pub fn ordered(write_errors: Vec<RecordError>, batch_len: usize) -> Self {
        let first_unattempted = write_errors
            .iter()
            .map(|we| we.index + 1)
            .max()
            .unwrap_or(batch_len);
        Self {
            unprocessed: (first_unattempted..batch_len).collect(),
            write_errors,
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error(
        "bulk write partially failed: {} record errors, {} records not attempted",
        .0.write_errors.len(),
        .0.unprocessed.len()
    )]
    BulkWrite(BulkWriteFailure),
    /// the whole operation was refused (bad command, throttled query, ...)
    #[error("command failed (code {code}): {message}")]
    Command { code: i32, message: String },
    /// timeouts, authentication, server selection
    #[error("connection to the data store failed: {0}")]
    Connection(String),
    #[error("could not encode record for the data store: {0}")]
    Encode(String),
}

#[async_trait]
pub trait ObservationStore: Send + Sync {
    /// number of stored records with the given `_id`
    async fn count_by_id(&self, id: &str) -> Result<u64, StoreError>;
    /// insert every record, in order, as a single bulk operation
    async fn insert_many(&self, records: &[WeatherStationObservation]) -> Result<(), StoreError>;
}

impl StoreError {
    /// Error for a failed ordered bulk insert of `batch_len` records.
    ///
    /// A failure with no record errors but a write concern error is reported as a command
    /// failure; one with neither means every record landed.
    pub fn from_ordered_insert(
        write_errors: Vec<RecordError>,
        write_concern: Option<(i32, String)>,
        batch_len: usize,
    ) -> Self {
        match write_concern {
            Some((code, message)) if write_errors.is_empty() => Self::Command { code, message },
            _ => Self::BulkWrite(BulkWriteFailure::ordered(write_errors, batch_len)),
        }
    }
}

#[async_trait]
impl<S: ObservationStore + ?Sized> ObservationStore for Box<S> {
    async fn count_by_id(&self, id: &str) -> Result<u64, StoreError> {
        (**self).count_by_id(id).await
    }
    async fn insert_many(&self, records: &[WeatherStationObservation]) -> Result<(), StoreError> {
        (**self).insert_many(records).await
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn rejected(index: usize) -> RecordError {
        RecordError {
            index,
            code: 16500,
            message: "Error=16500, RetryAfterMs=100".to_string(),
        }
    }

    fn unprocessed(err: StoreError) -> Vec<usize> {
        match err {
            StoreError::BulkWrite(failure) => failure.unprocessed,
            other => panic!("expected a bulk write failure, got {other:?}"),
        }
    }

    #[test]
    fn no_record_errors_leaves_nothing_outstanding() {
        let failure = BulkWriteFailure::ordered(vec![], 5);
        assert_eq!(failure, BulkWriteFailure::default());
    }

    #[test]
    fn records_after_an_error_were_not_attempted() {
        let failure = BulkWriteFailure::ordered(vec![rejected(2)], 6);
        assert_eq!(failure.write_errors, vec![rejected(2)]);
        assert_eq!(failure.unprocessed, vec![3, 4, 5]);
    }

    #[test]
    fn last_error_decides_where_attempts_stopped() {
        let failure = BulkWriteFailure::ordered(vec![rejected(1), rejected(4)], 7);
        assert_eq!(failure.write_errors.len(), 2);
        assert_eq!(failure.unprocessed, vec![5, 6]);
    }

    #[test]
    fn error_on_the_last_record_leaves_nothing_unattempted() {
        let failure = BulkWriteFailure::ordered(vec![rejected(3)], 4);
        assert_eq!(failure.write_errors, vec![rejected(3)]);
        assert!(failure.unprocessed.is_empty());
    }

    #[test]
    fn write_concern_only_failure_is_a_command_error() {
        let err = StoreError::from_ordered_insert(
            vec![],
            Some((64, "waiting for replication timed out".to_string())),
            3,
        );
        let StoreError::Command { code, message } = err else {
            panic!("expected a command error, got {err:?}");
        };
        assert_eq!(code, 64);
        assert_eq!(message, "waiting for replication timed out");
    }

    #[test]
    fn record_errors_win_over_write_concern() {
        let err = StoreError::from_ordered_insert(
            vec![rejected(0)],
            Some((64, "waiting for replication timed out".to_string())),
            3,
        );
        assert_eq!(unprocessed(err), vec![1, 2]);
    }

    #[test]
    fn empty_failure_is_an_empty_bulk_write() {
        let err = StoreError::from_ordered_insert(vec![], None, 3);
        assert!(unprocessed(err).is_empty());
    }
}
