//! Link-list adapter: one tender per anchor

use crate::adapter::extract::{compile, compile_or, next_link};
use crate::adapter::{Extraction, RawRow, RawValue, SiteAdapter};
use crate::config::{AdapterConfig, FieldKind, FieldSpec};
use crate::ConfigError;
use scraper::{Html, Selector};

/// Extracts one row per matched anchor
///
/// `link` fields receive the anchor's href; every other field receives the
/// anchor text. Anchors without an href are ignored.
#[derive(Debug)]
pub struct LinkListAdapter {
    container: Option<Selector>,
    anchors: Selector,
    fields: Vec<(String, FieldKind)>,
    next: Option<Selector>,
}

impl LinkListAdapter {
    pub fn from_config(config: &AdapterConfig, fields: &[FieldSpec]) -> Result<Self, ConfigError> {
        Ok(Self {
            container: config.container.as_deref().map(compile).transpose()?,
            anchors: compile_or(config.rows.as_deref(), "a[href]")?,
            fields: fields.iter().map(|f| (f.name.clone(), f.kind)).collect(),
            next: config.next.as_deref().map(compile).transpose()?,
        })
    }
}

impl SiteAdapter for LinkListAdapter {
    fn extract(&self, html: &str) -> Extraction {
        let document = Html::parse_document(html);

        let root = match &self.container {
            Some(selector) => match document.select(selector).next() {
                Some(element) => element,
                None => return Extraction::container_missing(),
            },
            None => document.root_element(),
        };

        let mut rows = Vec::new();
        for (index, anchor) in root.select(&self.anchors).enumerate() {
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            let text = anchor.text().collect::<Vec<_>>().join(" ");

            let mut row = RawRow::at(index + 1);
            for (name, kind) in &self.fields {
                let value = match kind {
                    FieldKind::Link => RawValue::Link(href.to_string()),
                    FieldKind::Lines => RawValue::Lines(text.clone()),
                    FieldKind::Text | FieldKind::Date => RawValue::Text(text.clone()),
                };
                row.push(name.clone(), value);
            }
            rows.push(row);
        }

        // Without a container the whole page is searched; an empty match
        // there means the listing is absent rather than empty
        let container_found = self.container.is_some() || !rows.is_empty();

        Extraction {
            rows,
            next_page: self
                .next
                .as_ref()
                .and_then(|selector| next_link(&document, selector)),
            container_found,
            skipped: Vec::new(),
        }
    }
}
