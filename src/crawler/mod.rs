//! Crawler module: fetching, pagination and run coordination
//!
//! This module contains the network-facing half of the pipeline, including:
//! - HTTP fetching with retry, backoff and cancellation
//! - Pagination traversal of a single source
//! - Concurrent coordination of all sources in a run

mod coordinator;
mod fetcher;
mod traversal;

pub use coordinator::Coordinator;
pub use fetcher::{build_http_client, FetchError, FetchPolicy, FetchedPage, Fetcher};
pub use traversal::{traverse, PageRows, Traversal, TraversalOptions};
