use crate::adapter::{RawRow, RawValue};
use crate::config::{FieldKind, FieldSpec, SourceSpec};
use crate::crawler::PageRows;
use crate::record::{identity_key, parse_date, TenderRecord};
use crate::url::resolve_link;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};
use url::Url;

/// Output of normalizing every page of one traversal
#[derive(Debug, Default)]
pub struct NormalizedBatch {
    /// Unique records, in page order
    pub records: Vec<TenderRecord>,

    /// Why individual rows were dropped
    pub skipped: Vec<String>,

    /// Rows dropped because an earlier row had the same identity key
    pub duplicates_dropped: usize,
}

/// Turns raw rows into records according to a source's field schema
#[derive(Debug)]
pub struct Normalizer<'a> {
    fields: &'a [FieldSpec],
    key_fields: &'a [String],
    scraped_at: DateTime<Utc>,
}

impl<'a> Normalizer<'a> {
    pub fn new(fields: &'a [FieldSpec], key_fields: &'a [String], scraped_at: DateTime<Utc>) -> Self {
        Self {
            fields,
            key_fields,
            scraped_at,
        }
    }

    pub fn for_source(source: &'a SourceSpec, scraped_at: DateTime<Utc>) -> Self {
        Self::new(&source.fields, &source.key_fields, scraped_at)
    }

    /// Normalizes one row, or returns the reason it was skipped
    ///
    /// `base_url` is the final URL of the page the row came from; relative
    /// links resolve against it.
    pub fn normalize(&self, row: &RawRow, base_url: &Url) -> Result<TenderRecord, String> {
        let mut values = Vec::with_capacity(self.fields.len());

        for field in self.fields {
            let value = match row.get(&field.name) {
                Some(raw) => normalize_value(raw, field.kind, base_url)
                    .map_err(|reason| format!("field '{}': {}", field.name, reason))?,
                None => None,
            };

            if field.required && value.is_none() {
                return Err(format!("field '{}' is required but empty", field.name));
            }
            values.push((field.name.clone(), value));
        }

        if values.iter().all(|(_, value)| value.is_none()) {
            return Err("row has no values".to_string());
        }

        let identity_key = identity_key(&values, self.key_fields);

        Ok(TenderRecord {
            identity_key,
            scraped_at: self.scraped_at,
            fields: values.into_iter().collect::<BTreeMap<_, _>>(),
        })
    }

    /// Normalizes all pages of a traversal, dropping duplicates
    ///
    /// The first occurrence of an identity key wins.
    pub fn normalize_pages(&self, pages: &[PageRows]) -> NormalizedBatch {
        let mut batch = NormalizedBatch::default();
        let mut seen = HashSet::new();

        for page in pages {
            for (index, row) in page.rows.iter().enumerate() {
                match self.normalize(row, &page.page_url) {
                    Ok(record) => {
                        if seen.insert(record.identity_key.clone()) {
                            batch.records.push(record);
                        } else {
                            batch.duplicates_dropped += 1;
                        }
                    }
                    Err(reason) => {
                        // Number rows the way the adapter saw them on the page
                        let position = row.position().unwrap_or(index + 1);
                        batch
                            .skipped
                            .push(format!("{} row {}: {}", page.page_url, position, reason));
                    }
                }
            }
        }

        batch
    }
}

fn normalize_value(raw: &RawValue, kind: FieldKind, base_url: &Url) -> Result<Option<String>, String> {
    let Some(raw) = raw.as_str() else {
        return Ok(None);
    };

    let value = match kind {
        FieldKind::Text => non_empty(collapse_whitespace(raw)),
        FieldKind::Lines => non_empty(normalize_lines(raw)),
        FieldKind::Link => resolve_link(raw, base_url).map(|url| url.to_string()),
        FieldKind::Date => match non_empty(collapse_whitespace(raw)) {
            Some(text) => Some(parse_date(&text).ok_or_else(|| format!("unparseable date '{}'", text))?),
            None => None,
        },
    };

    Ok(value)
}

fn collapse_whitespace(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn normalize_lines(raw: &str) -> String {
    raw.lines()
        .map(collapse_whitespace)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}
