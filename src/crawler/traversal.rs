//! Pagination traversal engine
//!
//! Drives one source from its start URL through every "next page" locator its
//! adapter reports, until the listing ends, a cycle or the page ceiling is
//! hit, or a later page fails.

use crate::adapter::{RawRow, SiteAdapter};
use crate::crawler::{FetchError, FetchPolicy, Fetcher};
use crate::state::{PageCursor, TraversalState};
use crate::url::resolve_link;
use crate::TenderError;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Rows extracted from one page, with the URL they resolve against
#[derive(Debug, Clone)]
pub struct PageRows {
    pub page_url: Url,
    pub rows: Vec<RawRow>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraversalOptions {
    /// Hard ceiling on pages fetched
    pub max_pages: u32,

    /// Follow next-page locators at all
    pub paginate: bool,
}

impl Default for TraversalOptions {
    fn default() -> Self {
        Self {
            max_pages: 200,
            paginate: true,
        }
    }
}

/// Everything gathered by one traversal
#[derive(Debug, Clone)]
pub struct Traversal {
    /// Pages in fetch order
    pub pages: Vec<PageRows>,
    pub pages_fetched: u32,
    pub final_state: TraversalState,

    /// Why the traversal stopped early, for truncated traversals
    pub detail: Option<String>,

    /// At least one page lacked the listing container
    pub container_missing: bool,

    /// Structural row skips reported by the adapter
    pub skipped: Vec<String>,
}

impl Traversal {
    pub fn row_count(&self) -> usize {
        self.pages.iter().map(|page| page.rows.len()).sum()
    }

    pub fn is_truncated(&self) -> bool {
        self.final_state.is_truncated()
    }
}

/// Walks a paginated listing starting at `start`
///
/// A fetch failure on the first page is an error; nothing was gathered that
/// could be trusted. Cancellation on any page returns
/// [`TenderError::Cancelled`]. A failure on a later page ends the traversal in
/// [`TraversalState::Failed`] with the rows gathered so far.
pub async fn traverse(
    fetcher: &Fetcher,
    adapter: &dyn SiteAdapter,
    start: Url,
    policy: &FetchPolicy,
    options: TraversalOptions,
    cancel: &CancellationToken,
) -> Result<Traversal, TenderError> {
    let mut cursor = PageCursor::new(start);
    let mut pages = Vec::new();
    let mut skipped = Vec::new();
    let mut container_missing = false;
    let mut detail = None;

    loop {
        cursor.transition(TraversalState::Fetching)?;

        let page = match fetcher.fetch(cursor.current(), policy, cancel).await {
            Ok(page) => page,
            Err(FetchError::Cancelled(_)) => return Err(TenderError::Cancelled),
            Err(e) if cursor.pages_fetched() == 0 => return Err(e.into()),
            Err(e) => {
                tracing::warn!(
                    url = %cursor.current(),
                    page = cursor.pages_fetched() + 1,
                    error = %e,
                    "Later page failed, keeping rows gathered so far"
                );
                detail = Some(format!(
                    "page {} failed: {}",
                    cursor.pages_fetched() + 1,
                    e
                ));
                cursor.transition(TraversalState::Failed)?;
                break;
            }
        };

        cursor.transition(TraversalState::Extracting)?;
        cursor.mark_visited(&page.final_url);

        let extraction = adapter.extract(&page.body);
        if !extraction.container_found {
            tracing::warn!(url = %page.final_url, "Listing container not found");
            container_missing = true;
        }

        tracing::debug!(
            url = %page.final_url,
            page = cursor.pages_fetched(),
            rows = extraction.rows.len(),
            "Extracted page"
        );

        skipped.extend(
            extraction
                .skipped
                .into_iter()
                .map(|reason| format!("{} {}", page.final_url, reason)),
        );

        let next = if options.paginate {
            extraction
                .next_page
                .as_deref()
                .and_then(|href| resolve_link(href, &page.final_url))
        } else {
            None
        };

        pages.push(PageRows {
            page_url: page.final_url,
            rows: extraction.rows,
        });

        let Some(next) = next else {
            cursor.transition(TraversalState::Done)?;
            break;
        };

        if cursor.has_visited(&next) {
            tracing::warn!(next = %next, "Pagination cycle detected");
            detail = Some(format!("pagination cycle: {} already visited", next));
            cursor.transition(TraversalState::CycleDetected)?;
            break;
        }

        if cursor.pages_fetched() >= options.max_pages {
            tracing::warn!(
                max_pages = options.max_pages,
                next = %next,
                "Page ceiling reached"
            );
            detail = Some(format!(
                "page ceiling of {} reached with {} pending",
                options.max_pages, next
            ));
            cursor.transition(TraversalState::CeilingReached)?;
            break;
        }

        cursor.advance(next);
    }

    Ok(Traversal {
        pages,
        pages_fetched: cursor.pages_fetched(),
        final_state: cursor.state(),
        detail,
        container_missing,
        skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{Extraction, RawValue};
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Reads one row out of `<p class="row">` and the next link from `<a class="next">`
    #[derive(Debug)]
    struct PagerAdapter;

    impl SiteAdapter for PagerAdapter {
        fn extract(&self, html: &str) -> Extraction {
            let document = scraper::Html::parse_document(html);
            let row_selector = scraper::Selector::parse("p.row").unwrap();
            let next_selector = scraper::Selector::parse("a.next").unwrap();

            let rows = document
                .select(&row_selector)
                .map(|p| {
                    RawRow::new().with("title", RawValue::Text(p.text().collect::<String>()))
                })
                .collect();
            let next_page = document
                .select(&next_selector)
                .next()
                .and_then(|a| a.value().attr("href"))
                .map(str::to_string);

            Extraction {
                rows,
                next_page,
                container_found: true,
                skipped: Vec::new(),
            }
        }
    }

    fn page(row: &str, next: Option<&str>) -> String {
        let next = next
            .map(|href| format!(r#"<a class="next" href="{}">Next</a>"#, href))
            .unwrap_or_default();
        format!(r#"<html><body><p class="row">{}</p>{}</body></html>"#, row, next)
    }

    async fn mount_page(server: &MockServer, page_no: &str, body: String) {
        Mock::given(method("GET"))
            .and(path("/list"))
            .and(query_param("page", page_no))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .expect(1)
            .mount(server)
            .await;
    }

    fn policy() -> FetchPolicy {
        FetchPolicy {
            max_attempts: 2,
            backoff_base: Duration::from_millis(1),
            ..FetchPolicy::default()
        }
    }

    fn start(server: &MockServer) -> Url {
        Url::parse(&format!("{}/list?page=1", server.uri())).unwrap()
    }

    #[tokio::test]
    async fn test_follows_pages_until_done() {
        let server = MockServer::start().await;
        mount_page(&server, "1", page("a", Some("?page=2"))).await;
        mount_page(&server, "2", page("b", None)).await;

        let traversal = traverse(
            &Fetcher::new("Mozilla/5.0"),
            &PagerAdapter,
            start(&server),
            &policy(),
            TraversalOptions::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(traversal.final_state, TraversalState::Done);
        assert_eq!(traversal.pages_fetched, 2);
        assert_eq!(traversal.row_count(), 2);
        assert!(!traversal.is_truncated());
    }

    #[tokio::test]
    async fn test_cycle_back_to_start() {
        let server = MockServer::start().await;
        mount_page(&server, "1", page("a", Some("?page=2"))).await;
        mount_page(&server, "2", page("b", Some("?page=3"))).await;
        mount_page(&server, "3", page("c", Some("?page=1#top"))).await;

        let traversal = traverse(
            &Fetcher::new("Mozilla/5.0"),
            &PagerAdapter,
            start(&server),
            &policy(),
            TraversalOptions::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(traversal.final_state, TraversalState::CycleDetected);
        assert_eq!(traversal.pages_fetched, 3);
        let titles: Vec<&str> = traversal
            .pages
            .iter()
            .flat_map(|p| p.rows.iter())
            .filter_map(|row| row.get("title").and_then(RawValue::as_str))
            .collect();
        assert_eq!(titles, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_ceiling_reached() {
        let server = MockServer::start().await;
        mount_page(&server, "1", page("a", Some("?page=2"))).await;
        mount_page(&server, "2", page("b", Some("?page=3"))).await;

        let traversal = traverse(
            &Fetcher::new("Mozilla/5.0"),
            &PagerAdapter,
            start(&server),
            &policy(),
            TraversalOptions {
                max_pages: 2,
                paginate: true,
            },
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(traversal.final_state, TraversalState::CeilingReached);
        assert_eq!(traversal.row_count(), 2);
    }

    #[tokio::test]
    async fn test_pagination_disabled_ignores_next() {
        let server = MockServer::start().await;
        mount_page(&server, "1", page("a", Some("?page=2"))).await;

        let traversal = traverse(
            &Fetcher::new("Mozilla/5.0"),
            &PagerAdapter,
            start(&server),
            &policy(),
            TraversalOptions {
                max_pages: 200,
                paginate: false,
            },
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(traversal.final_state, TraversalState::Done);
        assert_eq!(traversal.pages_fetched, 1);
    }

    #[tokio::test]
    async fn test_later_page_failure_keeps_rows() {
        let server = MockServer::start().await;
        mount_page(&server, "1", page("a", Some("?page=2"))).await;
        Mock::given(method("GET"))
            .and(path("/list"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let traversal = traverse(
            &Fetcher::new("Mozilla/5.0"),
            &PagerAdapter,
            start(&server),
            &policy(),
            TraversalOptions::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(traversal.final_state, TraversalState::Failed);
        assert_eq!(traversal.row_count(), 1);
        assert!(traversal.detail.unwrap().starts_with("page 2 failed"));
    }

    #[tokio::test]
    async fn test_first_page_failure_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let result = traverse(
            &Fetcher::new("Mozilla/5.0"),
            &PagerAdapter,
            start(&server),
            &policy(),
            TraversalOptions::default(),
            &CancellationToken::new(),
        )
        .await;

        assert!(matches!(
            result,
            Err(TenderError::Fetch(FetchError::Status { status: 404, .. }))
        ));
    }

    #[tokio::test]
    async fn test_cancellation_is_reported_as_cancelled() {
        let server = MockServer::start().await;
        mount_page(&server, "1", page("a", Some("?page=2"))).await;
        Mock::given(method("GET"))
            .and(path("/list"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            trigger.cancel();
        });

        let result = traverse(
            &Fetcher::new("Mozilla/5.0"),
            &PagerAdapter,
            start(&server),
            &policy(),
            TraversalOptions::default(),
            &cancel,
        )
        .await;

        // Cancelled on a later page is still an error, not a truncated traversal
        assert!(matches!(result, Err(TenderError::Cancelled)));
    }
}
