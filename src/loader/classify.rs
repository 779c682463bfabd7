//! Interpreting the store's error descriptions.
//!
//! A throttling document store reports why a write failed inside the error message itself,
//! as comma separated `key=value` pairs:
//!
//! ```text
//! Error=16500, RetryAfterMs=100, Details='Response status code does not indicate success: TooManyRequests (429)'
//! ```
//!
//! Only `Error` and `RetryAfterMs` matter for retrying, everything else is carried along in
//! [`WriteError::details`] for the logs.

use std::{num::ParseIntError, time::Duration};

use crate::store::{BulkWriteFailure, RecordError};

/// Error codes the store uses to signal that a request was throttled (and can be retried)
pub const RETRIABLE_ERROR_CODES: &[i32] = &[16500];

/// A failed write, as far as retrying it is concerned
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteError {
    /// position of the failed record in the batch that was submitted
    pub index: usize,
    /// `0` when the message did not carry a code
    pub error_code: i32,
    /// how long the store asked us to wait before trying again, as sent
    pub retry_after_ms: i64,
    /// the raw message
    pub details: String,
}

impl WriteError {
    pub fn is_retriable(&self) -> bool {
        RETRIABLE_ERROR_CODES.contains(&self.error_code)
    }

    /// The hinted wait, negative hints count as no wait
    pub fn retry_after(&self) -> Duration {
        Duration::from_millis(self.retry_after_ms.max(0).unsigned_abs())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClassifyError {
    #[error("malformed `{key}` value {value:?} in store error message {message:?}: {source}")]
    MalformedValue {
        key: &'static str,
        value: String,
        message: String,
        #[source]
        source: ParseIntError,
    },
}

/// Parse one error message.
///
/// Segments that are not a single `key=value` pair, and keys other than `Error` and
/// `RetryAfterMs`, are skipped. A recognised key with a value that is not an integer fails
/// the whole message: a throttling error we cannot read must not turn into a silent drop.
pub fn parse_error_message(message: &str) -> Result<WriteError, ClassifyError> {
    let mut result = WriteError {
        details: message.to_string(),
        ..Default::default()
    };
    for segment in message.split(',') {
        let attr = segment.trim().split('=').collect::<Vec<_>>();
        let [key, value] = attr.as_slice() else {
            continue;
        };
        let (key, value) = (key.trim(), value.trim());
        let malformed = |key, source| ClassifyError::MalformedValue {
            key,
            value: value.to_string(),
            message: message.to_string(),
            source,
        };
        match key {
            "Error" => {
                result.error_code = value.parse().map_err(|e| malformed("Error", e))?;
            }
            "RetryAfterMs" => {
                result.retry_after_ms = value.parse().map_err(|e| malformed("RetryAfterMs", e))?;
            }
            _ => {}
        }
    }
    Ok(result)
}

/// Classify a single per-record error, keeping its position in the batch
pub fn classify_record_error(error: &RecordError) -> Result<WriteError, ClassifyError> {
    let mut result = parse_error_message(&error.message)?;
    result.index = error.index;
    Ok(result)
}

/// Classify every per-record error of a bulk write failure, in the order the store reported them
pub fn classify_bulk_failure(failure: &BulkWriteFailure) -> Result<Vec<WriteError>, ClassifyError> {
    failure
        .write_errors
        .iter()
        .map(classify_record_error)
        .collect()
}
