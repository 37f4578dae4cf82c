//! Run summary types and JSON export

use crate::output::OutputResult;
use crate::state::{OutcomeStatus, TraversalState};
use crate::storage::SyncOutcome;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Result of one source's pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceReport {
    pub source: String,
    pub destination: String,
    pub outcome_status: OutcomeStatus,
    pub records_written: usize,
    pub skipped_row_count: usize,
    pub duplicates_dropped: usize,
    pub pages_fetched: u32,

    /// How pagination ended; `None` if the traversal never completed
    pub traversal: Option<TraversalState>,

    pub destination_replaced: bool,
    pub destination_inconsistent: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,

    pub skip_reasons: Vec<String>,
}

impl SourceReport {
    /// Report for a source that failed before synchronization
    pub fn fatal(source: &str, destination: &str, detail: impl Into<String>) -> Self {
        Self::from_sync(source, destination, SyncOutcome::untouched(OutcomeStatus::Fatal, detail))
    }

    /// Report built from a synchronization outcome
    pub fn from_sync(source: &str, destination: &str, outcome: SyncOutcome) -> Self {
        Self {
            source: source.to_string(),
            destination: destination.to_string(),
            outcome_status: outcome.status,
            records_written: outcome.records_written,
            skipped_row_count: outcome.skip_reasons.len(),
            duplicates_dropped: 0,
            pages_fetched: 0,
            traversal: None,
            destination_replaced: outcome.destination_replaced,
            destination_inconsistent: outcome.destination_inconsistent,
            error_detail: outcome.error_detail,
            skip_reasons: outcome.skip_reasons,
        }
    }
}

/// Summary of one complete run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub config_hash: String,
    pub sources: Vec<SourceReport>,
}

impl RunSummary {
    pub fn source(&self, key: &str) -> Option<&SourceReport> {
        self.sources.iter().find(|report| report.source == key)
    }

    pub fn total_records(&self) -> usize {
        self.sources.iter().map(|report| report.records_written).sum()
    }

    /// Number of sources per outcome status, including zero counts
    pub fn status_counts(&self) -> BTreeMap<OutcomeStatus, usize> {
        let mut counts: BTreeMap<OutcomeStatus, usize> =
            OutcomeStatus::all().into_iter().map(|status| (status, 0)).collect();
        for report in &self.sources {
            *counts.entry(report.outcome_status).or_insert(0) += 1;
        }
        counts
    }

    /// True if any source ended worse than `ok`
    pub fn needs_attention(&self) -> bool {
        self.sources
            .iter()
            .any(|report| report.outcome_status.needs_attention())
    }

    /// True if any source reported `fatal`
    pub fn has_fatal(&self) -> bool {
        self.sources
            .iter()
            .any(|report| report.outcome_status == OutcomeStatus::Fatal)
    }

    pub fn to_json(&self) -> OutputResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Writes the summary as pretty-printed JSON
    pub fn write_json(&self, path: &Path) -> OutputResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, self.to_json()?)?;
        Ok(())
    }
}
