//! Integration tests for the tender pipeline
//!
//! These tests use wiremock to serve fixture listings and run whole sources
//! end-to-end: fetch, paginate, extract, normalize and synchronize.

use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::PoisonError;
use std::time::Duration;
use tender_sweep::config::{parse_config, Config};
use tender_sweep::storage::{
    shared, DocumentStore, InsertReport, SharedStore, SqliteStore, StorageResult,
};
use tender_sweep::{AdapterRegistry, Coordinator, OutcomeStatus, TenderRecord, TraversalState};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DESTINATION: &str = "bda_tenders";

/// A table source served from `{base}/bda/list`
fn bda_source(base: &str) -> String {
    format!(
        r#"
[[source]]
key = "bda"
start-url = "{base}/bda/list"
destination = "{DESTINATION}"
key-fields = ["sr_no"]

[source.adapter]
kind = "table"
container = "table.views-table"
rows = "tbody tr"
next = "li.pager__item--next a"

[[source.fields]]
name = "sr_no"
column = 0
required = true

[[source.fields]]
name = "description"
column = 1

[[source.fields]]
name = "closing_date"
kind = "date"
column = 2

[[source.fields]]
name = "document"
kind = "link"
column = 3
"#
    )
}

/// A block source served from `{base}/cur/tenders`
fn cur_source(base: &str) -> String {
    format!(
        r#"
[[source]]
key = "cur"
start-url = "{base}/cur/tenders"
destination = "cur_tenders"
paginate = false

[source.adapter]
kind = "blocks"
container = "div.innerpage"
rows = "div.views-row"

[[source.fields]]
name = "title"
selector = "h2"
required = true

[[source.fields]]
name = "pdf_url"
kind = "link"
selector = "a[href]"
"#
    )
}

fn config(sources: &[String]) -> Config {
    let toml = format!(
        r#"
[fetch]
max-attempts = 2
backoff-base-ms = 1

[pipeline]
max-concurrent-sources = 2

[storage]
connection = "sqlite::memory:"
{}
"#,
        sources.join("\n")
    );
    parse_config(&toml).expect("test config should be valid")
}

/// Renders a listing table; each row is (sr_no, description, closing date, document href)
fn table_page(rows: &[(&str, &str, &str, &str)], next: Option<&str>) -> String {
    let body: String = rows
        .iter()
        .map(|(sr, description, date, href)| {
            format!(
                r#"<tr><td>{sr}</td><td>{description}</td><td>{date}</td><td><a href="{href}">View</a></td></tr>"#
            )
        })
        .collect();
    let pager = next
        .map(|href| {
            format!(r#"<ul class="pager"><li class="pager__item--next"><a href="{href}">Next ›</a></li></ul>"#)
        })
        .unwrap_or_default();
    format!(
        r#"<html><body><table class="views-table"><thead><tr><th>Sr</th><th>Description</th><th>Date</th><th>Docs</th></tr></thead><tbody>{body}</tbody></table>{pager}</body></html>"#
    )
}

async fn serve(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .expect(1)
        .mount(server)
        .await;
}

/// An in-memory store pre-loaded with `n` old records in `collection`
fn seeded_store(collection: &str, n: usize) -> SharedStore {
    let mut store = SqliteStore::new_in_memory().unwrap();
    let records: Vec<TenderRecord> = (0..n)
        .map(|i| {
            let mut fields = BTreeMap::new();
            fields.insert("description".to_string(), Some(format!("old tender {}", i)));
            TenderRecord {
                identity_key: format!("old-{}", i),
                scraped_at: Utc::now(),
                fields,
            }
        })
        .collect();
    store.insert_many(collection, &records).unwrap();
    shared(store)
}

fn coordinator(config: Config, store: SharedStore) -> Coordinator {
    Coordinator::with_store(config, store, AdapterRegistry::with_builtin())
}

fn count(store: &SharedStore, collection: &str) -> usize {
    store
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .count(collection)
        .unwrap()
}

/// Delegates to SQLite but panics when asked to clear `poisoned`
struct PanickingStore {
    inner: SqliteStore,
    poisoned: &'static str,
}

impl DocumentStore for PanickingStore {
    fn clear(&mut self, collection: &str) -> StorageResult<usize> {
        if collection == self.poisoned {
            panic!("driver crashed while clearing {}", collection);
        }
        self.inner.clear(collection)
    }

    fn insert_many(
        &mut self,
        collection: &str,
        records: &[TenderRecord],
    ) -> StorageResult<InsertReport> {
        self.inner.insert_many(collection, records)
    }

    fn count(&self, collection: &str) -> StorageResult<usize> {
        self.inner.count(collection)
    }

    fn list(&self, collection: &str) -> StorageResult<Vec<serde_json::Value>> {
        self.inner.list(collection)
    }

    fn collections(&self) -> StorageResult<Vec<(String, usize)>> {
        self.inner.collections()
    }
}

#[tokio::test]
async fn test_two_pages_replace_previous_snapshot() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/bda/list",
        table_page(
            &[
                ("1", "Construction of  park", "12-01-2025", "/sites/t1.pdf"),
                ("2", "Street lights", "15/01/2025", "docs/t2.pdf"),
            ],
            Some("list-2"),
        ),
    )
    .await;
    serve(
        &server,
        "/bda/list-2",
        table_page(&[("3", "Sewerage repair", "2025-02-01", "/sites/t3.pdf")], None),
    )
    .await;

    let store = seeded_store(DESTINATION, 10);
    let summary = coordinator(config(&[bda_source(&server.uri())]), store.clone())
        .run()
        .await;

    let report = summary.source("bda").unwrap();
    assert_eq!(report.outcome_status, OutcomeStatus::Ok);
    assert_eq!(report.records_written, 3);
    assert_eq!(report.pages_fetched, 2);
    assert_eq!(report.traversal, Some(TraversalState::Done));
    assert!(report.destination_replaced);
    assert_eq!(count(&store, DESTINATION), 3);

    let documents = store.lock().unwrap().list(DESTINATION).unwrap();
    assert_eq!(documents[0]["description"], "Construction of park");
    assert_eq!(documents[0]["closing_date"], "2025-01-12");
    assert_eq!(
        documents[1]["document"],
        format!("{}/bda/docs/t2.pdf", server.uri())
    );
    assert_eq!(documents[2]["closing_date"], "2025-02-01");
}

#[tokio::test]
async fn test_pagination_cycle_keeps_all_pages() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/bda/list",
        table_page(&[("1", "Page one", "", "a.pdf")], Some("list-2")),
    )
    .await;
    serve(
        &server,
        "/bda/list-2",
        table_page(&[("2", "Page two", "", "b.pdf")], Some("list-3")),
    )
    .await;
    serve(
        &server,
        "/bda/list-3",
        table_page(&[("3", "Page three", "", "c.pdf")], Some("list")),
    )
    .await;

    let store = seeded_store(DESTINATION, 0);
    let summary = coordinator(config(&[bda_source(&server.uri())]), store.clone())
        .run()
        .await;

    let report = summary.source("bda").unwrap();
    assert_eq!(report.traversal, Some(TraversalState::CycleDetected));
    assert_eq!(report.pages_fetched, 3);
    assert_eq!(report.outcome_status, OutcomeStatus::PartialFailure);
    assert_eq!(report.records_written, 3);
    assert!(report.error_detail.as_deref().unwrap().contains("cycle"));
    assert_eq!(count(&store, DESTINATION), 3);
}

#[tokio::test]
async fn test_first_page_failure_leaves_destination_untouched() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/bda/list"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let store = seeded_store(DESTINATION, 10);
    let summary = coordinator(config(&[bda_source(&server.uri())]), store.clone())
        .run()
        .await;

    let report = summary.source("bda").unwrap();
    assert_eq!(report.outcome_status, OutcomeStatus::Fatal);
    assert!(!report.destination_replaced);
    assert!(report.error_detail.as_deref().unwrap().contains("404"));
    assert_eq!(count(&store, DESTINATION), 10);
}

#[tokio::test]
async fn test_missing_container_skips_sync() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/bda/list",
        "<html><body><p>Site under maintenance</p></body></html>".to_string(),
    )
    .await;

    let store = seeded_store(DESTINATION, 4);
    let summary = coordinator(config(&[bda_source(&server.uri())]), store.clone())
        .run()
        .await;

    let report = summary.source("bda").unwrap();
    assert_eq!(report.outcome_status, OutcomeStatus::NoDataSkipped);
    assert_eq!(
        report.error_detail.as_deref(),
        Some("listing container not found")
    );
    assert_eq!(count(&store, DESTINATION), 4);
}

#[tokio::test]
async fn test_duplicates_and_bad_rows_are_counted() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/bda/list",
        table_page(
            &[
                ("1", "Boundary wall", "12-01-2025", "a.pdf"),
                ("1", "Boundary wall (repeat)", "12-01-2025", "a.pdf"),
                ("2", "Road patching", "next week", "b.pdf"),
                ("3", "Tree plantation", "", "c.pdf"),
            ],
            None,
        ),
    )
    .await;

    let store = seeded_store(DESTINATION, 0);
    let summary = coordinator(config(&[bda_source(&server.uri())]), store.clone())
        .run()
        .await;

    let report = summary.source("bda").unwrap();
    assert_eq!(report.outcome_status, OutcomeStatus::Ok);
    assert_eq!(report.records_written, 2);
    assert_eq!(report.duplicates_dropped, 1);
    assert_eq!(report.skipped_row_count, 1);
    assert!(report.skip_reasons[0].contains("unparseable date 'next week'"));
}

#[tokio::test]
async fn test_failing_source_does_not_affect_others() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/bda/list",
        table_page(&[("1", "Only tender", "", "a.pdf")], None),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/cur/tenders"))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&server)
        .await;

    let store = seeded_store("cur_tenders", 3);
    let summary = coordinator(
        config(&[cur_source(&server.uri()), bda_source(&server.uri())]),
        store.clone(),
    )
    .run()
    .await;

    assert_eq!(summary.sources.len(), 2);
    assert_eq!(summary.sources[0].source, "cur");
    assert_eq!(summary.sources[0].outcome_status, OutcomeStatus::Fatal);
    assert_eq!(summary.sources[1].source, "bda");
    assert_eq!(summary.sources[1].outcome_status, OutcomeStatus::Ok);
    assert_eq!(count(&store, "cur_tenders"), 3);
    assert_eq!(count(&store, DESTINATION), 1);
}

#[tokio::test]
async fn test_only_filter_selects_sources() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cur/tenders"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(
                r#"<div class="innerpage"><div class="views-row"><h2>Lab chemicals</h2><a href="/files/lab.pdf">PDF</a></div></div>"#,
            ),
        )
        .expect(1)
        .mount(&server)
        .await;

    let store = seeded_store(DESTINATION, 0);
    let coordinator = coordinator(
        config(&[bda_source(&server.uri()), cur_source(&server.uri())]),
        store.clone(),
    )
    .with_only(vec!["cur".to_string()])
    .unwrap();

    let summary = coordinator.run().await;

    assert_eq!(summary.sources.len(), 1);
    assert_eq!(summary.sources[0].outcome_status, OutcomeStatus::Ok);
    let documents = store.lock().unwrap().list("cur_tenders").unwrap();
    assert_eq!(documents[0]["title"], "Lab chemicals");
    assert_eq!(
        documents[0]["pdf_url"],
        format!("{}/files/lab.pdf", server.uri())
    );
}

#[tokio::test]
async fn test_unknown_only_key_rejected() {
    let store = seeded_store(DESTINATION, 0);
    let result = coordinator(config(&[bda_source("http://127.0.0.1:9")]), store)
        .with_only(vec!["nope".to_string()]);
    assert!(result.is_err());
}

#[tokio::test]
async fn test_cancelled_run_leaves_destinations_untouched() {
    let server = MockServer::start().await;
    let store = seeded_store(DESTINATION, 5);
    let coordinator = coordinator(config(&[bda_source(&server.uri())]), store.clone());

    coordinator.cancellation_token().cancel();
    let summary = coordinator.run().await;

    let report = summary.source("bda").unwrap();
    assert_eq!(report.outcome_status, OutcomeStatus::Fatal);
    assert!(report.error_detail.as_deref().unwrap().contains("cancelled"));
    assert_eq!(count(&store, DESTINATION), 5);
}

#[tokio::test]
async fn test_file_backed_store_and_json_summary() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/bda/list",
        table_page(&[("9", "Solar pumps", "01.03.2025", "s.pdf")], None),
    )
    .await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("tenders.db");
    let mut config = config(&[bda_source(&server.uri())]);
    config.storage.connection = format!("sqlite://{}", db_path.display());

    let summary = Coordinator::new(config)
        .await
        .unwrap()
        .with_config_hash("abc123")
        .run()
        .await;

    let summary_path = dir.path().join("summary.json");
    summary.write_json(&summary_path).unwrap();

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&summary_path).unwrap()).unwrap();
    assert_eq!(json["config_hash"], "abc123");
    assert_eq!(json["sources"][0]["outcome_status"], "ok");
    assert_eq!(json["sources"][0]["records_written"], 1);

    let reopened = SqliteStore::new(&db_path).unwrap();
    assert_eq!(reopened.count(DESTINATION).unwrap(), 1);
}

#[tokio::test]
async fn test_all_rows_skipped_keeps_previous_snapshot() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/bda/list",
        table_page(
            &[
                ("1", "Parking lot", "Mon, 01/20/2025 - 12:00", "a.pdf"),
                ("2", "Fire safety audit", "Tue, 01/21/2025 - 12:00", "b.pdf"),
            ],
            None,
        ),
    )
    .await;

    let store = seeded_store(DESTINATION, 6);
    let summary = coordinator(config(&[bda_source(&server.uri())]), store.clone())
        .run()
        .await;

    let report = summary.source("bda").unwrap();
    assert_eq!(report.outcome_status, OutcomeStatus::NoDataSkipped);
    assert_eq!(report.skipped_row_count, 2);
    assert_eq!(
        report.error_detail.as_deref(),
        Some("all 2 extracted rows were skipped")
    );
    assert!(report.skip_reasons[0].contains("row 1: field 'closing_date'"));
    assert!(report.skip_reasons[1].contains("row 2: field 'closing_date'"));
    assert!(!report.destination_replaced);
    assert_eq!(count(&store, DESTINATION), 6);
}

#[tokio::test]
async fn test_cancelling_one_source_leaves_others_running() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/bda/list",
        table_page(&[("1", "Drainage works", "12-01-2025", "a.pdf")], None),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/cur/tenders"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<div class='innerpage'></div>")
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let store = seeded_store("cur_tenders", 3);
    let coordinator = coordinator(
        config(&[cur_source(&server.uri()), bda_source(&server.uri())]),
        store.clone(),
    );

    let (summary, cancelled) = tokio::join!(coordinator.run(), async {
        tokio::time::sleep(Duration::from_millis(200)).await;
        coordinator.cancel_source("cur")
    });

    assert!(cancelled);
    assert!(!coordinator.cancel_source("nope"));
    assert!(!coordinator.cancellation_token().is_cancelled());

    let cur = summary.source("cur").unwrap();
    assert_eq!(cur.outcome_status, OutcomeStatus::Fatal);
    assert!(cur.error_detail.as_deref().unwrap().contains("cancelled"));
    assert_eq!(count(&store, "cur_tenders"), 3);

    let bda = summary.source("bda").unwrap();
    assert_eq!(bda.outcome_status, OutcomeStatus::Ok);
    assert_eq!(count(&store, DESTINATION), 1);
}

#[tokio::test]
async fn test_store_panic_is_confined_to_its_source() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/bda/list",
        table_page(&[("1", "Canal desilting", "12-01-2025", "a.pdf")], None),
    )
    .await;
    serve(
        &server,
        "/cur/tenders",
        r#"<div class="innerpage"><div class="views-row"><h2>Hostel beds</h2></div></div>"#
            .to_string(),
    )
    .await;

    let store = shared(PanickingStore {
        inner: SqliteStore::new_in_memory().unwrap(),
        poisoned: "cur_tenders",
    });
    let mut config = config(&[cur_source(&server.uri()), bda_source(&server.uri())]);
    // One source at a time, in configuration order: bda meets the lock cur poisoned
    config.pipeline.max_concurrent_sources = 1;

    let summary = coordinator(config, store.clone()).run().await;

    let cur = summary.source("cur").unwrap();
    assert_eq!(cur.outcome_status, OutcomeStatus::Fatal);
    assert!(cur.error_detail.as_deref().unwrap().contains("sync panicked"));

    let bda = summary.source("bda").unwrap();
    assert_eq!(bda.outcome_status, OutcomeStatus::Ok);
    assert_eq!(bda.records_written, 1);
    assert_eq!(count(&store, DESTINATION), 1);
}
