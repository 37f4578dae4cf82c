//! Output module for run summaries
//!
//! This module handles:
//! - The per-source and run-level summary types
//! - Exporting the summary as JSON
//! - Printing the summary as a console table

mod console;
mod summary;

pub use console::{format_summary_table, print_summary};
pub use summary::{RunSummary, SourceReport};

use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize summary: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;
