use crate::adapter::{BlockAdapter, LinkListAdapter, SiteAdapter, TableAdapter};
use crate::config::{AdapterConfig, FieldSpec, SourceSpec};
use crate::{ConfigError, TenderError};
use std::collections::HashMap;
use std::sync::Arc;

/// Builds an adapter for one source from its declarative parameters
pub type AdapterFactory =
    fn(&AdapterConfig, &[FieldSpec]) -> Result<Arc<dyn SiteAdapter>, ConfigError>;

/// Resolves each source to its site adapter
///
/// Lookup order: an adapter registered for the source key, then the factory
/// registered for the source's adapter kind.
#[derive(Default)]
pub struct AdapterRegistry {
    kinds: HashMap<String, AdapterFactory>,
    overrides: HashMap<String, Arc<dyn SiteAdapter>>,
}

impl AdapterRegistry {
    /// An empty registry with no kinds at all
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the `table`, `blocks` and `links` kinds
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register_kind("table", build_table);
        registry.register_kind("blocks", build_blocks);
        registry.register_kind("links", build_links);
        registry
    }

    pub fn register_kind(&mut self, kind: impl Into<String>, factory: AdapterFactory) {
        self.kinds.insert(kind.into(), factory);
    }

    /// Binds a hand-written adapter to a single source key
    pub fn register_source(&mut self, source_key: impl Into<String>, adapter: Arc<dyn SiteAdapter>) {
        self.overrides.insert(source_key.into(), adapter);
    }

    pub fn has_kind(&self, kind: &str) -> bool {
        self.kinds.contains_key(kind)
    }

    /// Returns the adapter for `source`
    pub fn resolve(&self, source: &SourceSpec) -> Result<Arc<dyn SiteAdapter>, TenderError> {
        if let Some(adapter) = self.overrides.get(&source.key) {
            return Ok(Arc::clone(adapter));
        }

        let factory = self
            .kinds
            .get(&source.adapter.kind)
            .ok_or_else(|| TenderError::UnknownAdapter {
                source_key: source.key.clone(),
                kind: source.adapter.kind.clone(),
            })?;

        Ok(factory(&source.adapter, &source.fields)?)
    }
}

fn build_table(config: &AdapterConfig, fields: &[FieldSpec]) -> Result<Arc<dyn SiteAdapter>, ConfigError> {
    Ok(Arc::new(TableAdapter::from_config(config, fields)?))
}

fn build_blocks(config: &AdapterConfig, fields: &[FieldSpec]) -> Result<Arc<dyn SiteAdapter>, ConfigError> {
    Ok(Arc::new(BlockAdapter::from_config(config, fields)?))
}

fn build_links(config: &AdapterConfig, fields: &[FieldSpec]) -> Result<Arc<dyn SiteAdapter>, ConfigError> {
    Ok(Arc::new(LinkListAdapter::from_config(config, fields)?))
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<&String> = self.kinds.keys().collect();
        kinds.sort();
        let mut overrides: Vec<&String> = self.overrides.keys().collect();
        overrides.sort();
        f.debug_struct("AdapterRegistry")
            .field("kinds", &kinds)
            .field("overrides", &overrides)
            .finish()
    }
}
