//! Full-replace synchronization of one source's destination

use crate::record::TenderRecord;
use crate::state::OutcomeStatus;
use crate::storage::DocumentStore;
use serde::Serialize;

/// What happened to one destination during a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncOutcome {
    pub records_written: usize,
    pub destination_replaced: bool,

    /// The old snapshot was cleared but the new one is incomplete
    pub destination_inconsistent: bool,

    pub status: OutcomeStatus,
    pub skip_reasons: Vec<String>,
    pub error_detail: Option<String>,
}

impl SyncOutcome {
    fn new(status: OutcomeStatus) -> Self {
        Self {
            records_written: 0,
            destination_replaced: false,
            destination_inconsistent: false,
            status,
            skip_reasons: Vec::new(),
            error_detail: None,
        }
    }

    /// Outcome for a source that never reached synchronization
    pub fn untouched(status: OutcomeStatus, detail: impl Into<String>) -> Self {
        Self {
            error_detail: Some(detail.into()),
            ..Self::new(status)
        }
    }

    /// Attaches the row-level skip reasons gathered before synchronization
    pub fn with_skip_reasons(mut self, skip_reasons: Vec<String>) -> Self {
        self.skip_reasons = skip_reasons;
        self
    }
}

/// Replaces the contents of `destination` with `records`
///
/// - no records: the destination is left alone (`no_data_skipped`)
/// - clear fails: the destination is left alone (`fatal`)
/// - clear succeeds, insert is partial: `partial_failure`, flagged inconsistent
pub fn sync(
    store: &mut dyn DocumentStore,
    destination: &str,
    records: &[TenderRecord],
) -> SyncOutcome {
    if records.is_empty() {
        tracing::warn!(
            destination = %destination,
            "No records extracted, leaving destination untouched"
        );
        return SyncOutcome::new(OutcomeStatus::NoDataSkipped);
    }

    let removed = match store.clear(destination) {
        Ok(removed) => removed,
        Err(e) => {
            tracing::error!(destination = %destination, error = %e, "Failed to clear destination");
            return SyncOutcome::untouched(OutcomeStatus::Fatal, format!("clear failed: {}", e));
        }
    };

    let mut outcome = SyncOutcome::new(OutcomeStatus::Ok);
    outcome.destination_replaced = true;

    match store.insert_many(destination, records) {
        Ok(report) => {
            outcome.records_written = report.inserted;
            if !report.is_complete() {
                tracing::error!(
                    destination = %destination,
                    inserted = report.inserted,
                    failed = report.failures.len(),
                    "Destination left inconsistent: insert partially failed"
                );
                outcome.status = OutcomeStatus::PartialFailure;
                outcome.destination_inconsistent = true;
                outcome.error_detail = Some(format!(
                    "{} of {} inserts failed; first: {}",
                    report.failures.len(),
                    records.len(),
                    report.failures[0]
                ));
            }
        }
        Err(e) => {
            tracing::error!(
                destination = %destination,
                error = %e,
                "Destination left inconsistent: insert failed after clear"
            );
            outcome.status = OutcomeStatus::PartialFailure;
            outcome.destination_inconsistent = true;
            outcome.error_detail = Some(format!("insert failed after clear: {}", e));
        }
    }

    tracing::info!(
        destination = %destination,
        removed,
        written = outcome.records_written,
        "Destination replaced"
    );

    outcome
}
