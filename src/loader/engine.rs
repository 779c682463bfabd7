use std::{
    collections::{BTreeSet, HashSet},
    time::Duration,
};

use observations::WeatherStationObservation;

use super::{
    classify::classify_bulk_failure,
    guard::{check_batch, GuardVerdict},
    BatchOutcome, Jitter, LoadError, RetryBudget, WriteError,
};
use crate::store::{ObservationStore, StoreError};

/// Writes batches of observations into a store, retrying throttled records.
///
/// Loads are strictly sequential (`write` takes `&mut self`); the store connection is
/// reused across every attempt of every load.
pub struct BulkWriter<S, J> {
    store: S,
    jitter: J,
}

impl<S: ObservationStore, J: Jitter> BulkWriter<S, J> {
    pub fn new(store: S, jitter: J) -> Self {
        Self { store, jitter }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Load `batch`, so that every record ends up stored exactly once.
    ///
    /// With `perform_check`, a batch whose first record is already stored is skipped.
    /// Each failed attempt spends one retry from `budget`; the load fails once a bulk
    /// failure arrives with nothing left to spend, or on any error that is not throttling.
    #[instrument(skip_all, fields(records = batch.len(), budget = %budget))]
    pub async fn write(
        &mut self,
        batch: Vec<WeatherStationObservation>,
        budget: RetryBudget,
        perform_check: bool,
    ) -> Result<BatchOutcome, LoadError> {
        let Some(probe) = batch.first() else {
            info!("No records to insert - nothing to do.");
            return Ok(BatchOutcome::Empty);
        };

        let mut budget = budget;
        if perform_check {
            match check_batch(&self.store, probe, budget).await {
                GuardVerdict::AlreadyPresent => return Ok(BatchOutcome::AlreadyPresent),
                GuardVerdict::QueryFailed(err) => return Err(err),
                GuardVerdict::Proceed(left) => budget = left,
            }
        }

        let records = batch.len();
        let mut pending = batch;
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            info!("Records to be inserted: {} (attempt {attempts})", pending.len());
            let failure = match self.store.insert_many(&pending).await {
                Ok(()) => {
                    info!("Datastore updated");
                    return Ok(BatchOutcome::Written { records, attempts });
                }
                Err(StoreError::BulkWrite(failure)) => failure,
                Err(err) => {
                    error!("Unhandled exception: {err}");
                    return Err(LoadError::Store(err));
                }
            };

            let errors = classify_bulk_failure(&failure).map_err(|e| {
                error!("Could not classify bulk write failure: {e}");
                LoadError::Classify(e)
            })?;
            for e in &errors {
                warn!(
                    index = e.index,
                    code = e.error_code,
                    retry_after_ms = e.retry_after_ms,
                    "record not written: {}",
                    e.details
                );
            }

            let Some(next) = budget.spend() else {
                error!(
                    "Datastore update exception (no retries available): {} record errors, {} records unprocessed",
                    errors.len(),
                    failure.unprocessed.len()
                );
                return Err(LoadError::Exhausted { errors });
            };
            if errors.iter().any(|e| !e.is_retriable()) {
                error!("Datastore rejected records with errors that cannot be retried");
                return Err(LoadError::Rejected { errors });
            }

            let remaining = narrow(pending, &errors, &failure.unprocessed);
            if remaining.is_empty() {
                // every record the store complained about is accounted for
                info!("Bulk write reported a failure, but no records are outstanding");
                return Ok(BatchOutcome::Written { records, attempts });
            }

            let wait = backoff(&errors) + self.jitter.next_delay();
            warn!(
                "Retrying {} records in {}ms ({next} left)",
                remaining.len(),
                wait.as_millis()
            );
            tokio::time::sleep(wait).await;
            pending = remaining;
            budget = next;
        }
    }
}

/// Records of `pending` that did not land: the ones with errors plus the ones never attempted,
/// in their original order and without repeating a record id.
fn narrow(
    pending: Vec<WeatherStationObservation>,
    errors: &[WriteError],
    unprocessed: &[usize],
) -> Vec<WeatherStationObservation> {
    let len = pending.len();
    let failed = errors
        .iter()
        .map(|e| e.index)
        .chain(unprocessed.iter().copied())
        .filter(|&index| {
            let valid = index < len;
            if !valid {
                warn!("store reported record {index}, but only {len} were submitted, ignoring");
            }
            valid
        })
        .collect::<BTreeSet<usize>>();

    let mut seen = HashSet::new();
    pending
        .into_iter()
        .enumerate()
        .filter(|(index, _)| failed.contains(index))
        .map(|(_, record)| record)
        .filter(|record| seen.insert(record.id()))
        .collect()
}

/// The longest wait any of the errors asked for
fn backoff(errors: &[WriteError]) -> Duration {
    errors
        .iter()
        .map(WriteError::retry_after)
        .max()
        .unwrap_or_default()
}
