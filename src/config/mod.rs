//! Configuration module for Tender-Sweep
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use tender_sweep::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("sources.toml")).unwrap();
//! println!("Configured sources: {}", config.sources.len());
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    AdapterConfig, Config, FetchConfig, FieldKind, FieldSpec, OutputConfig, PipelineConfig,
    RetryOverrides, SourceSpec, StorageConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::validate;
