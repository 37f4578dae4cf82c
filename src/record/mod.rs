//! Normalized tender records

mod dates;
mod identity;
mod normalize;

pub use dates::parse_date;
pub use identity::identity_key;
pub use normalize::{NormalizedBatch, Normalizer};

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// One storage-ready tender notice
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TenderRecord {
    pub identity_key: String,
    pub scraped_at: DateTime<Utc>,

    /// Normalized field values; `None` serializes as `null`
    #[serde(flatten)]
    pub fields: BTreeMap<String, Option<String>>,
}

impl TenderRecord {
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(|value| value.as_deref())
    }

    /// The JSON document stored for this record
    pub fn to_document(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}
