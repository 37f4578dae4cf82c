//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests of the pipeline, including:
//! - Building pooled HTTP clients (a relaxed-TLS variant for legacy servers)
//! - Bounded retries with exponential backoff
//! - Prompt cancellation of in-flight requests and backoff sleeps
//!
//! # Retry Logic
//!
//! | Condition | Action |
//! |-----------|--------|
//! | 2xx | Success |
//! | Status in `retryable_statuses` | Retry with backoff |
//! | Timeout, connect error, reset, body read error | Retry with backoff |
//! | Any other non-2xx | Immediate `FetchError::Status` |
//! | Redirect chain > 10 | Immediate `FetchError::Transport` |
//! | Attempts exhausted | `FetchError::Exhausted` |

use crate::config::{FetchConfig, RetryOverrides, SourceSpec};
use reqwest::header::{HeaderMap, HeaderValue, CONNECTION};
use reqwest::{redirect::Policy, Client};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Largest exponent used for backoff, so delays cannot overflow
const MAX_BACKOFF_SHIFT: u32 = 16;

/// Maximum redirect hops followed per request
const MAX_REDIRECTS: usize = 10;

/// Errors produced while fetching a page
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("Gave up on {url} after {attempts} attempts: {last}")]
    Exhausted {
        url: String,
        attempts: u32,
        last: String,
        status: Option<u16>,
    },

    #[error("Request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("Fetch of {0} cancelled")]
    Cancelled(String),

    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

impl FetchError {
    /// The HTTP status involved, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Exhausted { status, .. } => *status,
            _ => None,
        }
    }
}

/// Timeout and retry policy of one source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub retryable_statuses: Vec<u16>,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub legacy_tls: bool,
}

impl FetchPolicy {
    /// Merges run-wide defaults with a source's overrides
    pub fn resolve(defaults: &FetchConfig, overrides: &RetryOverrides, legacy_tls: bool) -> Self {
        Self {
            max_attempts: overrides.max_attempts.unwrap_or(defaults.max_attempts),
            backoff_base: Duration::from_millis(
                overrides.backoff_base_ms.unwrap_or(defaults.backoff_base_ms),
            ),
            retryable_statuses: overrides
                .retryable_statuses
                .clone()
                .unwrap_or_else(|| defaults.retryable_statuses.clone()),
            connect_timeout: Duration::from_secs(
                overrides
                    .connect_timeout_secs
                    .unwrap_or(defaults.connect_timeout_secs),
            ),
            read_timeout: Duration::from_secs(
                overrides.read_timeout_secs.unwrap_or(defaults.read_timeout_secs),
            ),
            legacy_tls,
        }
    }

    pub fn for_source(defaults: &FetchConfig, source: &SourceSpec) -> Self {
        Self::resolve(defaults, &source.retry, source.legacy_tls)
    }

    /// Delay after the `failed_attempt`-th (0-based) failed attempt
    pub fn backoff_for(&self, failed_attempt: u32) -> Duration {
        let factor = 1u32 << failed_attempt.min(MAX_BACKOFF_SHIFT);
        self.backoff_base.saturating_mul(factor)
    }

    pub fn is_retryable(&self, status: u16) -> bool {
        self.retryable_statuses.contains(&status)
    }
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self::resolve(&FetchConfig::default(), &RetryOverrides::default(), false)
    }
}

/// A successfully fetched page
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub body: String,

    /// URL after redirects; relative links on the page resolve against it
    pub final_url: Url,

    pub status: u16,

    /// Attempts it took, including the successful one
    pub attempts: u32,
}

/// Result of a single attempt
enum Attempt {
    Success(FetchedPage),
    Retry { cause: String, status: Option<u16> },
    Fatal(FetchError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct ClientKey {
    legacy_tls: bool,
    connect_timeout: Duration,
}

/// Shared HTTP fetcher
///
/// Clients (and their connection pools) are built lazily and reused by every
/// source with the same TLS mode and connect timeout.
#[derive(Debug)]
pub struct Fetcher {
    user_agent: String,
    clients: Mutex<HashMap<ClientKey, Client>>,
}

impl Fetcher {
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
            clients: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &FetchConfig) -> Self {
        Self::new(config.user_agent.clone())
    }

    fn client_for(&self, policy: &FetchPolicy) -> Result<Client, FetchError> {
        let key = ClientKey {
            legacy_tls: policy.legacy_tls,
            connect_timeout: policy.connect_timeout,
        };

        let mut clients = self
            .clients
            .lock()
            .map_err(|_| FetchError::Transport {
                url: String::new(),
                message: "client pool lock poisoned".to_string(),
            })?;

        if let Some(client) = clients.get(&key) {
            return Ok(client.clone());
        }

        let client = build_http_client(&self.user_agent, policy.connect_timeout, policy.legacy_tls)?;
        clients.insert(key, client.clone());
        Ok(client)
    }

    /// Fetches `url` according to `policy`
    ///
    /// Every attempt and every backoff sleep races `cancel`; cancellation
    /// returns [`FetchError::Cancelled`] without waiting for the request.
    pub async fn fetch(
        &self,
        url: &Url,
        policy: &FetchPolicy,
        cancel: &CancellationToken,
    ) -> Result<FetchedPage, FetchError> {
        if !matches!(url.scheme(), "http" | "https") {
            return Err(FetchError::InvalidUrl(url.to_string()));
        }

        let client = self.client_for(policy)?;
        let max_attempts = policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            tracing::debug!(url = %url, attempt, "Fetching page");

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(FetchError::Cancelled(url.to_string())),
                result = try_once(&client, url, policy) => result,
            };

            let (cause, status) = match result {
                Attempt::Success(mut page) => {
                    page.attempts = attempt;
                    return Ok(page);
                }
                Attempt::Fatal(e) => return Err(e),
                Attempt::Retry { cause, status } => (cause, status),
            };

            if attempt >= max_attempts {
                tracing::warn!(url = %url, attempts = attempt, cause = %cause, "Retries exhausted");
                return Err(FetchError::Exhausted {
                    url: url.to_string(),
                    attempts: attempt,
                    last: cause,
                    status,
                });
            }

            let delay = policy.backoff_for(attempt - 1);
            tracing::warn!(
                url = %url,
                attempt,
                status = ?status,
                cause = %cause,
                delay_ms = delay.as_millis() as u64,
                "Transient failure, retrying"
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(FetchError::Cancelled(url.to_string())),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

async fn try_once(client: &Client, url: &Url, policy: &FetchPolicy) -> Attempt {
    let response = match client
        .get(url.clone())
        .timeout(policy.read_timeout)
        .send()
        .await
    {
        Ok(response) => response,
        Err(e) if e.is_builder() || e.is_redirect() => {
            return Attempt::Fatal(FetchError::Transport {
                url: url.to_string(),
                message: e.to_string(),
            })
        }
        Err(e) => {
            return Attempt::Retry {
                cause: describe_transport_error(&e),
                status: None,
            }
        }
    };

    let status = response.status().as_u16();
    let final_url = response.url().clone();

    if !response.status().is_success() {
        if policy.is_retryable(status) {
            return Attempt::Retry {
                cause: format!("HTTP {}", status),
                status: Some(status),
            };
        }
        return Attempt::Fatal(FetchError::Status {
            url: url.to_string(),
            status,
        });
    }

    match response.text().await {
        Ok(body) => Attempt::Success(FetchedPage {
            body,
            final_url,
            status,
            attempts: 0,
        }),
        Err(e) => Attempt::Retry {
            cause: format!("body read failed: {}", e),
            status: Some(status),
        },
    }
}

fn describe_transport_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        "request timeout".to_string()
    } else if e.is_connect() {
        format!("connect error: {}", e)
    } else {
        e.to_string()
    }
}

/// Builds an HTTP client
///
/// `legacy_tls` turns off certificate validation altogether. That is broader
/// than tolerating a legacy handshake (unsafe renegotiation and the like):
/// rustls has no switch for those, so the only way to reach such servers is
/// to accept any certificate, which also drops protection against
/// impersonation. It is only ever enabled for sources that ask for it.
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use tender_sweep::crawler::build_http_client;
///
/// let client = build_http_client("Mozilla/5.0", Duration::from_secs(10), false).unwrap();
/// ```
pub fn build_http_client(
    user_agent: &str,
    connect_timeout: Duration,
    legacy_tls: bool,
) -> Result<Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    headers.insert(CONNECTION, HeaderValue::from_static("close"));

    Client::builder()
        .user_agent(user_agent)
        .default_headers(headers)
        .connect_timeout(connect_timeout)
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .danger_accept_invalid_certs(legacy_tls)
        .build()
}
