use crate::config::types::{
    AdapterConfig, Config, FetchConfig, FieldSpec, PipelineConfig, RetryOverrides, SourceSpec,
};
use crate::ConfigError;
use scraper::Selector;
use std::collections::HashSet;
use url::Url;

/// Field names the normalizer writes itself
const RESERVED_FIELDS: &[&str] = &["identity_key", "scraped_at", "_id"];

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_fetch_config(&config.fetch)?;
    validate_pipeline_config(&config.pipeline)?;

    if config.storage.connection.trim().is_empty() {
        return Err(ConfigError::Validation(
            "storage connection cannot be empty".to_string(),
        ));
    }

    let mut keys = HashSet::new();
    let mut destinations = HashSet::new();
    for source in &config.sources {
        if !keys.insert(source.key.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate source key '{}'",
                source.key
            )));
        }
        // Two sources sharing a collection would become concurrent writers
        if !destinations.insert(source.destination.as_str()) {
            return Err(ConfigError::Validation(format!(
                "destination '{}' is used by more than one source",
                source.destination
            )));
        }
        validate_source(source)?;
    }

    Ok(())
}

/// Validates fetch defaults
fn validate_fetch_config(config: &FetchConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    validate_attempts(config.max_attempts)?;
    validate_timeouts(config.connect_timeout_secs, config.read_timeout_secs)?;
    validate_statuses(&config.retryable_statuses)?;

    Ok(())
}

/// Validates pipeline limits
fn validate_pipeline_config(config: &PipelineConfig) -> Result<(), ConfigError> {
    if config.max_concurrent_sources < 1 || config.max_concurrent_sources > 64 {
        return Err(ConfigError::Validation(format!(
            "max_concurrent_sources must be between 1 and 64, got {}",
            config.max_concurrent_sources
        )));
    }

    if config.max_pages < 1 {
        return Err(ConfigError::Validation(
            "max_pages must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates one source definition
fn validate_source(source: &SourceSpec) -> Result<(), ConfigError> {
    if source.key.is_empty() {
        return Err(ConfigError::Validation(
            "source key cannot be empty".to_string(),
        ));
    }

    validate_collection_name(&source.destination)?;

    let url = Url::parse(&source.start_url).map_err(|e| {
        ConfigError::InvalidUrl(format!(
            "Invalid start URL '{}' for source '{}': {}",
            source.start_url, source.key, e
        ))
    })?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "Start URL '{}' must use http or https",
            source.start_url
        )));
    }

    if source.max_pages == Some(0) {
        return Err(ConfigError::Validation(format!(
            "max_pages for source '{}' must be >= 1",
            source.key
        )));
    }

    validate_overrides(&source.retry)?;
    validate_fields(source)?;
    validate_adapter(source, &source.adapter)?;

    Ok(())
}

fn validate_overrides(retry: &RetryOverrides) -> Result<(), ConfigError> {
    if let Some(attempts) = retry.max_attempts {
        validate_attempts(attempts)?;
    }
    validate_timeouts(
        retry.connect_timeout_secs.unwrap_or(1),
        retry.read_timeout_secs.unwrap_or(1),
    )?;
    if let Some(statuses) = &retry.retryable_statuses {
        validate_statuses(statuses)?;
    }
    Ok(())
}

fn validate_attempts(attempts: u32) -> Result<(), ConfigError> {
    if !(1..=20).contains(&attempts) {
        return Err(ConfigError::Validation(format!(
            "max_attempts must be between 1 and 20, got {}",
            attempts
        )));
    }
    Ok(())
}

fn validate_timeouts(connect: u64, read: u64) -> Result<(), ConfigError> {
    if connect == 0 || read == 0 {
        return Err(ConfigError::Validation(
            "timeouts must be at least one second".to_string(),
        ));
    }
    Ok(())
}

fn validate_statuses(statuses: &[u16]) -> Result<(), ConfigError> {
    if let Some(status) = statuses.iter().find(|s| !(400..=599).contains(*s)) {
        return Err(ConfigError::Validation(format!(
            "retryable status {} is not an HTTP error status",
            status
        )));
    }
    Ok(())
}

/// Validates the field schema and key-field references
fn validate_fields(source: &SourceSpec) -> Result<(), ConfigError> {
    if source.fields.is_empty() {
        return Err(ConfigError::Validation(format!(
            "source '{}' must declare at least one field",
            source.key
        )));
    }

    let mut names = HashSet::new();
    for field in &source.fields {
        if field.name.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "source '{}' has a field with an empty name",
                source.key
            )));
        }
        if RESERVED_FIELDS.contains(&field.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "field name '{}' is reserved",
                field.name
            )));
        }
        if !names.insert(field.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "source '{}' declares field '{}' twice",
                source.key, field.name
            )));
        }
        if let Some(selector) = &field.selector {
            validate_selector(selector)?;
        }
    }

    for key in &source.key_fields {
        if !names.contains(key.as_str()) {
            return Err(ConfigError::Validation(format!(
                "key field '{}' of source '{}' is not a declared field",
                key, source.key
            )));
        }
    }

    Ok(())
}

/// Validates adapter parameters for the built-in kinds
///
/// Unknown kinds are accepted here; they must be registered with the
/// adapter registry before the run, otherwise that source fails on its own.
fn validate_adapter(source: &SourceSpec, adapter: &AdapterConfig) -> Result<(), ConfigError> {
    for selector in [&adapter.container, &adapter.rows, &adapter.cells, &adapter.next]
        .into_iter()
        .flatten()
    {
        validate_selector(selector)?;
    }

    match adapter.kind.as_str() {
        "table" => {
            if let Some(field) = source.fields.iter().find(|f| f.column.is_none()) {
                return Err(ConfigError::Validation(format!(
                    "table field '{}' of source '{}' needs a column index",
                    field.name, source.key
                )));
            }
        }
        "blocks" => {
            require(adapter.container.as_ref(), "container", source)?;
            require(adapter.rows.as_ref(), "rows", source)?;
        }
        "links" => {
            validate_link_fields(source, &source.fields)?;
        }
        "" => {
            return Err(ConfigError::Validation(format!(
                "source '{}' has an empty adapter kind",
                source.key
            )));
        }
        _ => {}
    }

    Ok(())
}

fn validate_link_fields(source: &SourceSpec, fields: &[FieldSpec]) -> Result<(), ConfigError> {
    if let Some(field) = fields.iter().find(|f| f.selector.is_some() || f.column.is_some()) {
        return Err(ConfigError::Validation(format!(
            "links field '{}' of source '{}' cannot use a column or selector",
            field.name, source.key
        )));
    }
    Ok(())
}

fn require(value: Option<&String>, name: &str, source: &SourceSpec) -> Result<(), ConfigError> {
    if value.is_none() {
        return Err(ConfigError::Validation(format!(
            "{} adapter of source '{}' requires '{}'",
            source.adapter.kind, source.key, name
        )));
    }
    Ok(())
}

/// Validates that a CSS selector compiles
fn validate_selector(selector: &str) -> Result<(), ConfigError> {
    Selector::parse(selector)
        .map(|_| ())
        .map_err(|e| ConfigError::InvalidSelector(format!("'{}': {:?}", selector, e)))
}

/// Validates a collection name: ASCII letters, digits, and underscores
fn validate_collection_name(name: &str) -> Result<(), ConfigError> {
    if name.is_empty() {
        return Err(ConfigError::Validation(
            "destination cannot be empty".to_string(),
        ));
    }

    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(ConfigError::Validation(format!(
            "destination '{}' may only contain letters, digits, and underscores",
            name
        )));
    }

    Ok(())
}
