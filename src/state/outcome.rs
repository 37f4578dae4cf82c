use serde::Serialize;
use std::fmt;

/// Result class of one source's end-to-end run
///
/// Variants are ordered by severity so a source's status can be escalated
/// as problems accumulate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// Snapshot replaced, traversal exhausted the listing
    Ok,

    /// Nothing was extracted; the stored snapshot was left alone
    NoDataSkipped,

    /// Data was written but the run was truncated or the insert partially failed
    PartialFailure,

    /// The source produced no output; the stored snapshot was left alone
    Fatal,
}

impl OutcomeStatus {
    /// Returns the more severe of the two statuses
    pub fn escalate(self, other: OutcomeStatus) -> OutcomeStatus {
        self.max(other)
    }

    /// Returns true if operators should look at this source
    pub fn needs_attention(&self) -> bool {
        !matches!(self, Self::Ok)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::NoDataSkipped => "no_data_skipped",
            Self::PartialFailure => "partial_failure",
            Self::Fatal => "fatal",
        }
    }

    pub fn all() -> [OutcomeStatus; 4] {
        [
            Self::Ok,
            Self::NoDataSkipped,
            Self::PartialFailure,
            Self::Fatal,
        ]
    }
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
