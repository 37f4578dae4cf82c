//! Run orchestration
//!
//! The coordinator launches one pipeline per source:
//! traversal, normalization, then synchronization into the source's
//! destination. Pipelines run concurrently up to
//! `pipeline.max-concurrent-sources`, and every error is contained at the
//! source boundary: one failing or panicking source never stops the others.
//!
//! Each source runs under its own child of the run's cancellation token, so a
//! single source can be cancelled without touching the rest.

use crate::adapter::AdapterRegistry;
use crate::config::{Config, SourceSpec};
use crate::crawler::{traverse, FetchPolicy, Fetcher, TraversalOptions};
use crate::output::{RunSummary, SourceReport};
use crate::record::Normalizer;
use crate::state::OutcomeStatus;
use crate::storage::{open_store, shared, sync, SharedStore, StorageError};
use crate::{ConfigError, TenderError};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Everything a source pipeline needs, shared by all of them
struct PipelineContext {
    config: Arc<Config>,
    store: SharedStore,
    registry: Arc<AdapterRegistry>,
    fetcher: Arc<Fetcher>,
    cancel: CancellationToken,
}

/// Main run coordinator
pub struct Coordinator {
    context: Arc<PipelineContext>,
    source_tokens: HashMap<String, CancellationToken>,
    config_hash: String,
    only: Vec<String>,
}

impl Coordinator {
    /// Creates a coordinator that opens the configured store and uses the
    /// built-in adapters
    ///
    /// The store is opened on the blocking pool; store drivers may block.
    pub async fn new(config: Config) -> Result<Self, TenderError> {
        let connection = config.storage.connection.clone();
        let store = tokio::task::spawn_blocking(move || open_store(&connection))
            .await
            .map_err(|e| StorageError::Database(format!("opening store panicked: {}", e)))??;
        Ok(Self::with_store(
            config,
            shared(store),
            AdapterRegistry::with_builtin(),
        ))
    }

    /// Creates a coordinator over an existing store and adapter registry
    pub fn with_store(config: Config, store: SharedStore, registry: AdapterRegistry) -> Self {
        let fetcher = Fetcher::from_config(&config.fetch);
        let cancel = CancellationToken::new();
        let source_tokens = config
            .sources
            .iter()
            .map(|source| (source.key.clone(), cancel.child_token()))
            .collect();

        Self {
            context: Arc::new(PipelineContext {
                config: Arc::new(config),
                store,
                registry: Arc::new(registry),
                fetcher: Arc::new(fetcher),
                cancel,
            }),
            source_tokens,
            config_hash: String::new(),
            only: Vec::new(),
        }
    }

    /// Records the configuration hash in the run summary
    pub fn with_config_hash(mut self, config_hash: impl Into<String>) -> Self {
        self.config_hash = config_hash.into();
        self
    }

    /// Restricts the run to the given source keys
    pub fn with_only(mut self, keys: Vec<String>) -> Result<Self, TenderError> {
        for key in &keys {
            if self.context.config.source(key).is_none() {
                return Err(ConfigError::Validation(format!("unknown source key '{}'", key)).into());
            }
        }
        self.only = keys;
        Ok(self)
    }

    /// The token that cancels every pipeline of this run
    pub fn cancellation_token(&self) -> CancellationToken {
        self.context.cancel.clone()
    }

    /// Cancels one source's pipeline, leaving the others running
    ///
    /// Returns false if no source has that key.
    pub fn cancel_source(&self, key: &str) -> bool {
        match self.source_tokens.get(key) {
            Some(token) => {
                tracing::warn!(source = %key, "Cancelling source");
                token.cancel();
                true
            }
            None => false,
        }
    }

    fn source_token(&self, key: &str) -> CancellationToken {
        self.source_tokens
            .get(key)
            .cloned()
            .unwrap_or_else(|| self.context.cancel.child_token())
    }

    pub fn store(&self) -> SharedStore {
        Arc::clone(&self.context.store)
    }

    pub fn config(&self) -> &Config {
        &self.context.config
    }

    /// Sources this run will process, in configuration order
    pub fn selected_sources(&self) -> Vec<&SourceSpec> {
        self.context
            .config
            .sources
            .iter()
            .filter(|source| self.only.is_empty() || self.only.contains(&source.key))
            .collect()
    }

    /// Runs every selected source and collects one report per source
    ///
    /// Reports are in configuration order regardless of completion order.
    pub async fn run(&self) -> RunSummary {
        let started_at = Utc::now();
        let sources: Vec<SourceSpec> = self.selected_sources().into_iter().cloned().collect();
        let limit = self.context.config.pipeline.max_concurrent_sources.max(1);
        let semaphore = Arc::new(Semaphore::new(limit));

        tracing::info!(
            sources = sources.len(),
            max_concurrent = limit,
            "Starting run"
        );

        let mut handles = Vec::with_capacity(sources.len());
        for source in &sources {
            let context = Arc::clone(&self.context);
            let semaphore = Arc::clone(&semaphore);
            let source = source.clone();
            let cancel = self.source_token(&source.key);

            handles.push(tokio::spawn(async move {
                let permit = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    permit = semaphore.acquire_owned() => permit.ok(),
                };
                let Some(_permit) = permit else {
                    return SourceReport::fatal(
                        &source.key,
                        &source.destination,
                        "cancelled before start",
                    );
                };
                run_source(&context, &source, &cancel).await
            }));
        }

        let mut reports = Vec::with_capacity(handles.len());
        for (source, handle) in sources.iter().zip(handles) {
            let report = match handle.await {
                Ok(report) => report,
                Err(e) => {
                    tracing::error!(source = %source.key, error = %e, "Source pipeline panicked");
                    SourceReport::fatal(
                        &source.key,
                        &source.destination,
                        format!("pipeline panicked: {}", e),
                    )
                }
            };
            reports.push(report);
        }

        let summary = RunSummary {
            started_at,
            finished_at: Utc::now(),
            config_hash: self.config_hash.clone(),
            sources: reports,
        };

        tracing::info!(
            sources = summary.sources.len(),
            records = summary.total_records(),
            needs_attention = summary.needs_attention(),
            "Run finished"
        );

        summary
    }
}

/// Runs one source end to end; never fails, every problem lands in the report
async fn run_source(
    context: &PipelineContext,
    source: &SourceSpec,
    cancel: &CancellationToken,
) -> SourceReport {
    let key = source.key.as_str();
    tracing::info!(source = %key, url = %source.start_url, "Source started");

    let adapter = match context.registry.resolve(source) {
        Ok(adapter) => adapter,
        Err(e) => return fatal(source, e.to_string()),
    };

    let start = match Url::parse(&source.start_url) {
        Ok(url) => url,
        Err(e) => return fatal(source, format!("invalid start URL: {}", e)),
    };

    let policy = FetchPolicy::for_source(&context.config.fetch, source);
    let options = TraversalOptions {
        max_pages: source
            .max_pages
            .unwrap_or(context.config.pipeline.max_pages),
        paginate: source.paginate,
    };

    let traversal = match traverse(
        &context.fetcher,
        adapter.as_ref(),
        start,
        &policy,
        options,
        cancel,
    )
    .await
    {
        Ok(traversal) => traversal,
        Err(TenderError::Cancelled) => return fatal(source, "cancelled before sync"),
        Err(e) => return fatal(source, e.to_string()),
    };

    if cancel.is_cancelled() {
        return fatal(source, "cancelled before sync");
    }

    let batch = Normalizer::for_source(source, Utc::now()).normalize_pages(&traversal.pages);

    if batch.duplicates_dropped > 0 {
        tracing::debug!(
            source = %key,
            duplicates = batch.duplicates_dropped,
            "Dropped duplicate records"
        );
    }

    let mut skip_reasons = traversal.skipped.clone();
    skip_reasons.extend(batch.skipped);

    let store = Arc::clone(&context.store);
    let destination = source.destination.clone();
    let records = batch.records;
    // Poisoning left by another source's panic is ignored
    let synced = tokio::task::spawn_blocking(move || {
        let mut store = store.lock().unwrap_or_else(PoisonError::into_inner);
        sync(&mut *store, &destination, &records)
    })
    .await;

    let outcome = match synced {
        Ok(outcome) => outcome.with_skip_reasons(skip_reasons),
        Err(e) => return fatal(source, format!("sync panicked: {}", e)),
    };

    let mut report = SourceReport::from_sync(key, &source.destination, outcome);
    report.pages_fetched = traversal.pages_fetched;
    report.duplicates_dropped = batch.duplicates_dropped;
    report.traversal = Some(traversal.final_state);

    if traversal.is_truncated() {
        report.outcome_status = report.outcome_status.escalate(OutcomeStatus::PartialFailure);
        if report.error_detail.is_none() {
            report.error_detail = traversal.detail.clone();
        }
    } else if report.outcome_status == OutcomeStatus::NoDataSkipped && report.error_detail.is_none() {
        report.error_detail = Some(if report.skipped_row_count > 0 {
            format!(
                "all {} extracted rows were skipped",
                report.skipped_row_count
            )
        } else if traversal.container_missing {
            "listing container not found".to_string()
        } else {
            "no rows extracted".to_string()
        });
    }

    tracing::info!(
        source = %key,
        status = %report.outcome_status,
        records = report.records_written,
        skipped = report.skipped_row_count,
        pages = report.pages_fetched,
        traversal = %traversal.final_state,
        "Source finished"
    );

    report
}

fn fatal(source: &SourceSpec, detail: impl Into<String>) -> SourceReport {
    let detail = detail.into();
    tracing::error!(source = %source.key, detail = %detail, "Source failed");
    SourceReport::fatal(&source.key, &source.destination, detail)
}
