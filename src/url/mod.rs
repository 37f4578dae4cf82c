//! URL helpers shared by adapters, the normalizer, and the traversal engine
//!
//! Listing pages link to documents and pager targets with every convention
//! imaginable: absolute URLs, root-relative paths, bare file names, and
//! `javascript:` placeholders. Everything that is kept is resolved against
//! the page it was found on.

use url::Url;

/// Resolves a link href to an absolute URL and validates it
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - fragment-only links
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
///
/// # Examples
///
/// ```
/// use tender_sweep::url::resolve_link;
/// use url::Url;
///
/// let base = Url::parse("https://bdabathinda.in/en/tenders").unwrap();
/// let resolved = resolve_link(" /sites/default/files/t1.pdf ", &base).unwrap();
/// assert_eq!(resolved.as_str(), "https://bdabathinda.in/sites/default/files/t1.pdf");
/// ```
pub fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if lower.starts_with("javascript:")
        || lower.starts_with("mailto:")
        || lower.starts_with("tel:")
        || lower.starts_with("data:")
    {
        return None;
    }

    let absolute = base_url.join(href).ok()?;
    if absolute.scheme() == "http" || absolute.scheme() == "https" {
        Some(absolute)
    } else {
        None
    }
}

/// Returns the key under which a page is remembered as visited
///
/// Two locators that differ only by fragment point at the same page.
pub fn locator_key(url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);
    url.to_string()
}
