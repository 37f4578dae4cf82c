//! Table adapter: one tender per `<tr>`, one field per cell index

use crate::adapter::extract::{compile, compile_or, element_value, next_link};
use crate::adapter::{Extraction, RawRow, RawValue, SiteAdapter};
use crate::config::{AdapterConfig, FieldKind, FieldSpec};
use crate::ConfigError;
use scraper::{ElementRef, Html, Selector};

/// A field bound to a cell index
#[derive(Debug, Clone)]
struct Column {
    name: String,
    kind: FieldKind,
    index: usize,
}

/// Extracts rows from an HTML table
///
/// Rows with no cells at all (header rows made of `<th>`, spacer rows) are
/// passed over silently. Rows with some cells but fewer than the highest
/// configured column index requires are skipped with a reason.
#[derive(Debug)]
pub struct TableAdapter {
    container: Selector,
    rows: Selector,
    cells: Selector,
    skip_rows: usize,
    columns: Vec<Column>,
    min_cells: usize,
    next: Option<Selector>,
}

impl TableAdapter {
    /// Builds a table adapter from its configuration
    ///
    /// Defaults: container `table`, rows `tr`, cells `td`.
    pub fn from_config(config: &AdapterConfig, fields: &[FieldSpec]) -> Result<Self, ConfigError> {
        let columns = fields
            .iter()
            .map(|field| {
                field
                    .column
                    .map(|index| Column {
                        name: field.name.clone(),
                        kind: field.kind,
                        index,
                    })
                    .ok_or_else(|| {
                        ConfigError::Validation(format!(
                            "table field '{}' needs a column index",
                            field.name
                        ))
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let min_cells = columns.iter().map(|c| c.index + 1).max().unwrap_or(0);

        Ok(Self {
            container: compile_or(config.container.as_deref(), "table")?,
            rows: compile_or(config.rows.as_deref(), "tr")?,
            cells: compile_or(config.cells.as_deref(), "td")?,
            skip_rows: config.skip_rows,
            columns,
            min_cells,
            next: config.next.as_deref().map(compile).transpose()?,
        })
    }

    fn extract_row(&self, position: usize, cells: &[ElementRef<'_>]) -> RawRow {
        let mut row = RawRow::at(position);
        for column in &self.columns {
            let value = cells
                .get(column.index)
                .map(|cell| element_value(*cell, column.kind))
                .unwrap_or(RawValue::Missing);
            row.push(column.name.clone(), value);
        }
        row
    }
}

impl SiteAdapter for TableAdapter {
    fn extract(&self, html: &str) -> Extraction {
        let document = Html::parse_document(html);

        let Some(container) = document.select(&self.container).next() else {
            return Extraction::container_missing();
        };

        let mut extraction = Extraction {
            container_found: true,
            ..Extraction::default()
        };

        for (index, row) in container.select(&self.rows).enumerate().skip(self.skip_rows) {
            let cells: Vec<ElementRef<'_>> = row.select(&self.cells).collect();

            if cells.is_empty() {
                continue;
            }

            if cells.len() < self.min_cells {
                extraction.skipped.push(format!(
                    "row {}: {} cells, expected at least {}",
                    index + 1,
                    cells.len(),
                    self.min_cells
                ));
                continue;
            }

            extraction.rows.push(self.extract_row(index + 1, &cells));
        }

        extraction.next_page = self
            .next
            .as_ref()
            .and_then(|selector| next_link(&document, selector));

        extraction
    }
}
