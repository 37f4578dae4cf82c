//! State module for tracking pipeline progress
//!
//! # Components
//!
//! - `TraversalState`: the pagination state machine of one source
//! - `PageCursor`: the page about to be fetched plus every locator already visited
//! - `OutcomeStatus`: the per-source result class reported in the run summary

mod cursor;
mod outcome;
mod traversal_state;

// Re-export main types
pub use cursor::PageCursor;
pub use outcome::OutcomeStatus;
pub use traversal_state::TraversalState;
