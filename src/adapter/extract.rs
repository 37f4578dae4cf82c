//! Shared extraction helpers for the declarative adapters

use crate::adapter::RawValue;
use crate::config::FieldKind;
use crate::ConfigError;
use scraper::{ElementRef, Html, Selector};

/// Compiles a configured CSS selector
pub(crate) fn compile(selector: &str) -> Result<Selector, ConfigError> {
    Selector::parse(selector)
        .map_err(|e| ConfigError::InvalidSelector(format!("'{}': {:?}", selector, e)))
}

/// Compiles an optional configured selector, falling back to `default`
pub(crate) fn compile_or(selector: Option<&str>, default: &str) -> Result<Selector, ConfigError> {
    compile(selector.unwrap_or(default))
}

/// Extracts a raw value from an element according to the field kind
///
/// - `Link`: href of the element itself if it is an anchor, else of its first
///   descendant anchor; `Missing` when there is none
/// - `Lines`: text nodes joined with line breaks
/// - `Text` / `Date`: text nodes joined with spaces
pub(crate) fn element_value(element: ElementRef<'_>, kind: FieldKind) -> RawValue {
    match kind {
        FieldKind::Link => anchor_href(element)
            .map(RawValue::Link)
            .unwrap_or(RawValue::Missing),
        FieldKind::Lines => RawValue::Lines(element.text().collect::<Vec<_>>().join("\n")),
        FieldKind::Text | FieldKind::Date => {
            RawValue::Text(element.text().collect::<Vec<_>>().join(" "))
        }
    }
}

/// Returns the href of `element` or of its first descendant anchor
pub(crate) fn anchor_href(element: ElementRef<'_>) -> Option<String> {
    if element.value().name() == "a" {
        if let Some(href) = element.value().attr("href") {
            return Some(href.to_string());
        }
    }

    let a_selector = Selector::parse("a[href]").ok()?;
    element
        .select(&a_selector)
        .next()
        .and_then(|a| a.value().attr("href"))
        .map(|href| href.to_string())
}

/// Finds the "next page" href on a page
///
/// Placeholder hrefs (`#`, `javascript:`) on a disabled pager button are
/// treated as "no next page".
pub(crate) fn next_link(document: &Html, selector: &Selector) -> Option<String> {
    let element = document.select(selector).next()?;
    let href = anchor_href(element)?;
    let trimmed = href.trim();

    if trimmed.is_empty()
        || trimmed.starts_with('#')
        || trimmed.to_ascii_lowercase().starts_with("javascript:")
    {
        return None;
    }

    Some(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first<'a>(document: &'a Html, selector: &str) -> ElementRef<'a> {
        let selector = Selector::parse(selector).unwrap();
        document.select(&selector).next().unwrap()
    }

    #[test]
    fn test_text_value_joins_nodes() {
        let html = Html::parse_fragment("<p>Supply of <b>seeds</b><br>2025</p>");
        let value = element_value(first(&html, "p"), FieldKind::Text);
        assert_eq!(value, RawValue::Text("Supply of  seeds 2025".to_string()));
    }

    #[test]
    fn test_lines_value_keeps_breaks() {
        let document = Html::parse_document(
            "<table><tr><td>Tender for boats<br>Corrigendum 1</td></tr></table>",
        );
        let value = element_value(first(&document, "td"), FieldKind::Lines);
        assert_eq!(
            value,
            RawValue::Lines("Tender for boats\nCorrigendum 1".to_string())
        );
    }

    #[test]
    fn test_link_value_from_descendant() {
        let html = Html::parse_fragment(r#"<div><span><a href="/a.pdf">PDF</a></span></div>"#);
        let value = element_value(first(&html, "div"), FieldKind::Link);
        assert_eq!(value, RawValue::Link("/a.pdf".to_string()));
    }

    #[test]
    fn test_link_value_from_anchor_itself() {
        let html = Html::parse_fragment(r#"<a href="b.pdf">PDF</a>"#);
        let value = element_value(first(&html, "a"), FieldKind::Link);
        assert_eq!(value, RawValue::Link("b.pdf".to_string()));
    }

    #[test]
    fn test_link_value_missing() {
        let html = Html::parse_fragment("<div>No document</div>");
        assert_eq!(element_value(first(&html, "div"), FieldKind::Link), RawValue::Missing);
    }

    #[test]
    fn test_next_link() {
        let html = Html::parse_document(
            r#"<ul><li class="pager__item--next"><a href="?page=1">Next</a></li></ul>"#,
        );
        let selector = Selector::parse("li.pager__item--next").unwrap();
        assert_eq!(next_link(&html, &selector), Some("?page=1".to_string()));
    }

    #[test]
    fn test_next_link_placeholder() {
        let html = Html::parse_document(r#"<a class="next" href="javascript:void(0)">Next</a>"#);
        let selector = Selector::parse("a.next").unwrap();
        assert_eq!(next_link(&html, &selector), None);
    }

    #[test]
    fn test_compile_rejects_garbage() {
        assert!(compile("div[[").is_err());
        assert!(compile("table.views-table tbody tr").is_ok());
    }
}
