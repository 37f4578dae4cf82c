//! Traversal state definitions for the pagination engine
//!
//! A source's traversal starts `Idle`, alternates between `Fetching` and
//! `Extracting` once per page, and ends in exactly one terminal state.

use serde::Serialize;
use std::fmt;

/// Represents the current state of a source's pagination traversal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TraversalState {
    // ===== Active States =====
    /// Cursor created, nothing fetched yet
    Idle,

    /// A page request is in flight
    Fetching,

    /// The adapter is extracting rows from the fetched page
    Extracting,

    // ===== Terminal States =====
    /// The adapter returned no next locator
    Done,

    /// The next locator pointed at a page already visited
    CycleDetected,

    /// The page ceiling was reached while a next locator was still pending
    CeilingReached,

    /// A page fetch failed after at least one successful page
    Failed,
}

impl TraversalState {
    /// Returns true if this is a terminal state (no further pages are fetched)
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Idle | Self::Fetching | Self::Extracting)
    }

    /// Returns true if the traversal stopped before the listing was exhausted
    pub fn is_truncated(&self) -> bool {
        matches!(self, Self::CycleDetected | Self::CeilingReached | Self::Failed)
    }

    /// Returns true if the state machine permits moving from `self` to `next`
    pub fn can_transition_to(&self, next: TraversalState) -> bool {
        use TraversalState::*;
        matches!(
            (self, next),
            (Idle, Fetching)
                | (Fetching, Extracting)
                | (Fetching, Failed)
                | (Extracting, Fetching)
                | (Extracting, Done)
                | (Extracting, CycleDetected)
                | (Extracting, CeilingReached)
        )
    }

    /// Converts the state to its summary string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Fetching => "fetching",
            Self::Extracting => "extracting",
            Self::Done => "done",
            Self::CycleDetected => "cycle_detected",
            Self::CeilingReached => "ceiling_reached",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for TraversalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
