//! Bulk loading a batch of observations into a throttling store.
//!
//! A load is: skip the batch if it is already stored ([`guard`]), insert it in one bulk
//! operation, and when the store throttles part of it, classify what failed
//! ([`classify`]), wait, and resubmit only the records that did not land ([`engine`]),
//! for at most [`RetryBudget`] failed attempts.

pub mod budget;
pub mod classify;
pub mod engine;
pub mod guard;
pub mod jitter;


pub use budget::RetryBudget;
pub use classify::{ClassifyError, WriteError};
pub use engine::BulkWriter;
pub use guard::GuardVerdict;
pub use jitter::{FixedJitter, Jitter, RandomJitter};

use crate::store::StoreError;

/// How a load that did not fail ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    /// nothing to load, the store was not touched
    Empty,
    /// the batch was loaded before, nothing was written
    AlreadyPresent,
    /// every record is now stored exactly once
    Written { records: usize, attempts: u32 },
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// the existence check for the batch could not be completed
    #[error("could not check whether the batch is already loaded: {0}")]
    DuplicateCheck(#[source] StoreError),
    /// the whole operation was refused, nothing is retried
    #[error("data store operation failed: {0}")]
    Store(#[from] StoreError),
    #[error(transparent)]
    Classify(#[from] ClassifyError),
    #[error("retry budget exhausted with {} record errors outstanding", errors.len())]
    Exhausted { errors: Vec<WriteError> },
    #[error("data store rejected {} records with errors that cannot be retried", errors.iter().filter(|e| !e.is_retriable()).count())]
    Rejected { errors: Vec<WriteError> },
}

impl LoadError {
    /// The classified record errors of the last attempt, for reporting
    pub fn write_errors(&self) -> &[WriteError] {
        match self {
            Self::Exhausted { errors } | Self::Rejected { errors } => errors,
            Self::DuplicateCheck(_) | Self::Store(_) | Self::Classify(_) => &[],
        }
    }
}
