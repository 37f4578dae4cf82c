//! Tender-Sweep: a tender notice aggregator
//!
//! This crate fetches tender listings from many heterogeneous institutional web
//! pages, extracts them through per-source site adapters, normalizes them into
//! storage-ready records, and replaces each source's stored snapshot on every run.

pub mod adapter;
pub mod config;
pub mod crawler;
pub mod output;
pub mod record;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Tender-Sweep operations
#[derive(Debug, Error)]
pub enum TenderError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] crawler::FetchError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("No adapter registered for source '{source_key}' (kind '{kind}')")]
    UnknownAdapter { source_key: String, kind: String },

    #[error("Invalid traversal transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: state::TraversalState,
        to: state::TraversalState,
    },

    #[error("Cancelled")]
    Cancelled,
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid CSS selector: {0}")]
    InvalidSelector(String),
}

// Re-export commonly used types
pub use adapter::{AdapterRegistry, Extraction, RawRow, RawValue, SiteAdapter};
pub use config::{Config, SourceSpec};
pub use crawler::{Coordinator, FetchPolicy, Fetcher};
pub use output::{RunSummary, SourceReport};
pub use record::TenderRecord;
pub use state::{OutcomeStatus, TraversalState};
pub use storage::{DocumentStore, SqliteStore, SyncOutcome};
