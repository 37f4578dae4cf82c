//! Site adapters: the source-specific HTML → row extraction layer
//!
//! Every source publishes its listing differently. An adapter owns the
//! knowledge of one layout and turns a fetched page into raw rows plus an
//! optional "next page" locator. Adapters never touch the network or the
//! store, and never fail on malformed-but-parseable HTML: a missing listing
//! container is reported as zero rows with `container_found = false`.
//!
//! # Built-in kinds
//!
//! | Kind | Layout | Field mapping |
//! |------|--------|---------------|
//! | `table` | `<table>` rows and cells | `column` index |
//! | `blocks` | card-like row blocks (`div.views-row`) | `selector` within the block |
//! | `links` | a bare list of anchors | anchor text or href |

mod blocks;
mod extract;
mod links;
mod registry;
mod table;

pub use blocks::BlockAdapter;
pub use links::LinkListAdapter;
pub use registry::{AdapterFactory, AdapterRegistry};
pub use table::TableAdapter;

use std::fmt;

/// A raw value pulled out of one cell or sub-element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawValue {
    /// Text nodes joined with spaces
    Text(String),
    /// Text nodes joined with line breaks
    Lines(String),
    /// An unresolved href attribute
    Link(String),
    /// The optional cell or element was not present
    Missing,
}

impl RawValue {
    /// Returns the raw string content, if any
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) | Self::Lines(s) | Self::Link(s) => Some(s),
            Self::Missing => None,
        }
    }
}

/// Ordered mapping from field name to raw extracted value
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow {
    values: Vec<(String, RawValue)>,

    /// 1-based position of the source element on its page
    position: Option<usize>,
}

impl RawRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// A row remembering where on the page it came from
    pub fn at(position: usize) -> Self {
        Self {
            values: Vec::new(),
            position: Some(position),
        }
    }

    /// Position of the source element, as used in skip reasons
    pub fn position(&self) -> Option<usize> {
        self.position
    }

    pub fn push(&mut self, field: impl Into<String>, value: RawValue) {
        self.values.push((field.into(), value));
    }

    /// Builder-style [`push`](Self::push)
    pub fn with(mut self, field: impl Into<String>, value: RawValue) -> Self {
        self.push(field, value);
        self
    }

    pub fn get(&self, field: &str) -> Option<&RawValue> {
        self.values
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RawValue)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Everything an adapter learned from one page
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    /// Rows in document order
    pub rows: Vec<RawRow>,

    /// Unresolved "next page" href, if the page has one
    pub next_page: Option<String>,

    /// False if the listing container was absent from the page
    pub container_found: bool,

    /// Rows dropped for structural reasons (e.g. too few cells)
    pub skipped: Vec<String>,
}

impl Extraction {
    /// The result for a page whose listing container is missing
    pub fn container_missing() -> Self {
        Self {
            container_found: false,
            ..Self::default()
        }
    }
}

/// Source-specific extraction capability
///
/// Implementations must be pure functions of the HTML input.
pub trait SiteAdapter: Send + Sync + fmt::Debug {
    /// Extracts rows and the next-page locator from one page
    fn extract(&self, html: &str) -> Extraction;
}
