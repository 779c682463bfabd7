//! Skipping batches that were already loaded.
//!
//! Every record of a batch comes from the same issuance of the product, so the batch is
//! either entirely stored or not at all; one probe record answers for all of them.

use observations::WeatherStationObservation;

use super::{classify::parse_error_message, LoadError, RetryBudget};
use crate::store::{ObservationStore, StoreError};

#[derive(Debug)]
pub enum GuardVerdict {
    /// the probe is stored, skip the batch
    AlreadyPresent,
    /// the probe is not stored; carries what is left of the budget after any retried queries
    Proceed(RetryBudget),
    /// the existence query failed for good
    QueryFailed(LoadError),
}

/// Check whether `probe` is already stored.
///
/// A query the store throttles is retried after the store's hinted wait, spending one retry
/// from `budget` each time.
pub async fn check_batch<S: ObservationStore + ?Sized>(
    store: &S,
    probe: &WeatherStationObservation,
    mut budget: RetryBudget,
) -> GuardVerdict {
    let id = probe.id();
    loop {
        let err = match store.count_by_id(&id).await {
            Ok(0) => {
                debug!(%id, "batch not loaded yet");
                return GuardVerdict::Proceed(budget);
            }
            Ok(count) => {
                info!(%id, count, "Datastore not updated as data exists");
                return GuardVerdict::AlreadyPresent;
            }
            Err(err) => err,
        };
        warn!("Couldn't perform check: {err}");

        let message = match &err {
            StoreError::Command { message, .. } => Some(message.clone()),
            _ => None,
        };
        let Some(message) = message else {
            error!("Duplicate check failed, not retrying: {err}");
            return GuardVerdict::QueryFailed(LoadError::DuplicateCheck(err));
        };
        let Some(next) = budget.spend() else {
            error!("Datastore update exception (no retries available): {err}");
            return GuardVerdict::QueryFailed(LoadError::DuplicateCheck(err));
        };
        let classified = match parse_error_message(&message) {
            Ok(classified) => classified,
            Err(e) => {
                error!("Could not classify duplicate check failure: {e}");
                return GuardVerdict::QueryFailed(LoadError::Classify(e));
            }
        };
        if !classified.is_retriable() {
            error!(
                code = classified.error_code,
                "Duplicate check failed with an error that cannot be retried"
            );
            return GuardVerdict::QueryFailed(LoadError::DuplicateCheck(err));
        }

        info!(
            "Retrying duplicate check in {}ms ({} left)",
            classified.retry_after_ms, next
        );
        tokio::time::sleep(classified.retry_after()).await;
        budget = next;
    }
}
