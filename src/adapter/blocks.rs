//! Block adapter: one tender per card-like element (`div.views-row` and friends)

use crate::adapter::extract::{compile, element_value, next_link};
use crate::adapter::{Extraction, RawRow, RawValue, SiteAdapter};
use crate::config::{AdapterConfig, FieldKind, FieldSpec};
use crate::ConfigError;
use scraper::{ElementRef, Html, Selector};

/// A field bound to a sub-selector of the block
#[derive(Debug)]
struct BlockField {
    name: String,
    kind: FieldKind,
    /// None means the block element itself
    selector: Option<Selector>,
}

/// Extracts rows from repeated block elements inside a container
#[derive(Debug)]
pub struct BlockAdapter {
    container: Selector,
    blocks: Selector,
    fields: Vec<BlockField>,
    next: Option<Selector>,
}

impl BlockAdapter {
    pub fn from_config(config: &AdapterConfig, fields: &[FieldSpec]) -> Result<Self, ConfigError> {
        let container = config
            .container
            .as_deref()
            .ok_or_else(|| ConfigError::Validation("blocks adapter requires 'container'".into()))?;
        let blocks = config
            .rows
            .as_deref()
            .ok_or_else(|| ConfigError::Validation("blocks adapter requires 'rows'".into()))?;

        let fields = fields
            .iter()
            .map(|field| {
                Ok(BlockField {
                    name: field.name.clone(),
                    kind: field.kind,
                    selector: field.selector.as_deref().map(compile).transpose()?,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        Ok(Self {
            container: compile(container)?,
            blocks: compile(blocks)?,
            fields,
            next: config.next.as_deref().map(compile).transpose()?,
        })
    }

    fn extract_block(&self, position: usize, block: ElementRef<'_>) -> RawRow {
        let mut row = RawRow::at(position);
        for field in &self.fields {
            let target = match &field.selector {
                Some(selector) => block.select(selector).next(),
                None => Some(block),
            };
            let value = target
                .map(|element| element_value(element, field.kind))
                .unwrap_or(RawValue::Missing);
            row.push(field.name.clone(), value);
        }
        row
    }
}

impl SiteAdapter for BlockAdapter {
    fn extract(&self, html: &str) -> Extraction {
        let document = Html::parse_document(html);

        let Some(container) = document.select(&self.container).next() else {
            return Extraction::container_missing();
        };

        let mut extraction = Extraction {
            container_found: true,
            ..Extraction::default()
        };

        for (index, block) in container.select(&self.blocks).enumerate() {
            let row = self.extract_block(index + 1, block);
            if row.iter().all(|(_, value)| *value == RawValue::Missing) {
                extraction
                    .skipped
                    .push(format!("block {}: no configured field present", index + 1));
                continue;
            }
            extraction.rows.push(row);
        }

        extraction.next_page = self
            .next
            .as_ref()
            .and_then(|selector| next_link(&document, selector));

        extraction
    }
}
