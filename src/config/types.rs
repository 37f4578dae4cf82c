use serde::Deserialize;

/// Main configuration structure for Tender-Sweep
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default, rename = "source")]
    pub sources: Vec<SourceSpec>,
}

impl Config {
    /// Looks up a source by its key
    pub fn source(&self, key: &str) -> Option<&SourceSpec> {
        self.sources.iter().find(|s| s.key == key)
    }
}

/// Default HTTP behavior, overridable per source
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FetchConfig {
    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// TCP/TLS connect timeout (seconds)
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Per-attempt response timeout (seconds)
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,

    /// Total attempts per page, including the first one
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base delay for exponential backoff (milliseconds)
    #[serde(default = "default_backoff_base")]
    pub backoff_base_ms: u64,

    /// HTTP statuses that trigger a retry
    #[serde(default = "default_retryable_statuses")]
    pub retryable_statuses: Vec<u16>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            connect_timeout_secs: default_connect_timeout(),
            read_timeout_secs: default_read_timeout(),
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base(),
            retryable_statuses: default_retryable_statuses(),
        }
    }
}

/// Run-level pipeline limits
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PipelineConfig {
    /// Maximum number of sources processed at the same time
    #[serde(default = "default_max_concurrent_sources")]
    pub max_concurrent_sources: usize,

    /// Hard ceiling on pages fetched per source
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_sources: default_max_concurrent_sources(),
            max_pages: default_max_pages(),
        }
    }
}

/// Document store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Connection string, e.g. `sqlite://tenders.db` or `sqlite::memory:`
    pub connection: String,
}

/// Output configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Where the JSON run summary is written (optional)
    #[serde(default)]
    pub summary_path: Option<String>,
}

/// One tender source
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SourceSpec {
    /// Unique source key
    pub key: String,

    /// First listing page
    pub start_url: String,

    /// Collection that holds this source's snapshot
    pub destination: String,

    /// Follow "next page" locators produced by the adapter
    #[serde(default = "default_true")]
    pub paginate: bool,

    /// Relax TLS validation for servers with legacy handshakes
    #[serde(default)]
    pub legacy_tls: bool,

    /// Per-source page ceiling; falls back to `pipeline.max-pages`
    #[serde(default)]
    pub max_pages: Option<u32>,

    #[serde(default)]
    pub retry: RetryOverrides,

    pub adapter: AdapterConfig,

    #[serde(default)]
    pub fields: Vec<FieldSpec>,

    /// Fields that identify a tender within this source
    #[serde(default)]
    pub key_fields: Vec<String>,
}

impl SourceSpec {
    /// Looks up a field definition by name
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Optional per-source overrides of [`FetchConfig`]
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RetryOverrides {
    pub max_attempts: Option<u32>,
    pub backoff_base_ms: Option<u64>,
    pub retryable_statuses: Option<Vec<u16>>,
    pub connect_timeout_secs: Option<u64>,
    pub read_timeout_secs: Option<u64>,
}

/// Adapter selection and its declarative parameters
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AdapterConfig {
    /// Adapter kind: `table`, `blocks`, `links`, or a registered custom kind
    pub kind: String,

    /// Element that holds the listing
    #[serde(default)]
    pub container: Option<String>,

    /// Row (or block, or anchor) selector inside the container
    #[serde(default)]
    pub rows: Option<String>,

    /// Cell selector inside a row (`table` only)
    #[serde(default)]
    pub cells: Option<String>,

    /// Leading rows to ignore, e.g. a header row (`table` only)
    #[serde(default)]
    pub skip_rows: usize,

    /// Selector of the "next page" link
    #[serde(default)]
    pub next: Option<String>,
}

/// How a field is extracted and normalized
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    /// Single-line text; whitespace runs collapse to one space
    #[default]
    Text,
    /// Multi-paragraph text; line breaks are preserved
    Lines,
    /// Hyperlink target, resolved to an absolute URL
    Link,
    /// Calendar date (optionally with time), stored as ISO-8601
    Date,
}

/// One field of a source's record schema
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FieldSpec {
    pub name: String,

    #[serde(default)]
    pub kind: FieldKind,

    /// Cell index (`table` adapters)
    #[serde(default)]
    pub column: Option<usize>,

    /// Sub-selector within the row/block (`blocks` adapters)
    #[serde(default)]
    pub selector: Option<String>,

    /// Skip the row when this field is empty
    #[serde(default)]
    pub required: bool,
}

fn default_user_agent() -> String {
    "Mozilla/5.0".to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_read_timeout() -> u64 {
    30
}

fn default_max_attempts() -> u32 {
    5
}

fn default_backoff_base() -> u64 {
    2000
}

fn default_retryable_statuses() -> Vec<u16> {
    vec![500, 502, 503, 504]
}

fn default_max_concurrent_sources() -> usize {
    4
}

fn default_max_pages() -> u32 {
    200
}

fn default_true() -> bool {
    true
}
