//! Integration tests for the crawler
//!
//! These tests drive the supervisor and traversal end-to-end against an
//! in-memory listing. Each page is real table HTML, read back through the
//! same row extraction the browser session uses.

use bpom_harvester::api;
use bpom_harvester::config::SelectorConfig;
use bpom_harvester::crawler::{RetryPolicy, RunOutcome, Supervisor, Traversal, TraversalSettings};
use bpom_harvester::record::RawRow;
use bpom_harvester::render::{parse_rows, NextControl, PageCondition, RenderSession, Renderer};
use bpom_harvester::storage::{JsonStore, Storage};
use bpom_harvester::{HarvestError, RenderError, RenderResult};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Notify;

/// A product row as the listing renders it
struct Row {
    kind: &'static str,
    registration: &'static str,
    product: &'static str,
    registrant: &'static str,
}

fn row(registration: &'static str, product: &'static str) -> Row {
    Row {
        kind: "Obat",
        registration,
        product,
        registrant: "PT Kimia Farma<br>Kota Bandung, Jawa Barat",
    }
}

fn page_html(rows: &[Row]) -> String {
    let body: String = rows
        .iter()
        .map(|r| {
            format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                r.kind, r.registration, r.product, r.registrant
            )
        })
        .collect();
    format!(
        "<html><body><div id=\"table_wrapper\"><table><thead><tr><th>Produk</th></tr></thead>\
         <tbody>{}</tbody></table></div></body></html>",
        body
    )
}

/// Listing served by the in-memory site
#[derive(Clone, Default)]
struct Listing {
    pages: Vec<String>,
    /// How the next control looks on the last page
    last_control: Option<NextControl>,
    /// Page (1-based) that fails to render for the first `failures` sessions
    broken_page: Option<usize>,
    failures: u32,
}

impl Listing {
    fn new(pages: Vec<Vec<Row>>) -> Self {
        Self {
            pages: pages.iter().map(|rows| page_html(rows)).collect(),
            ..Self::default()
        }
    }
}

struct SiteRenderer {
    listing: Arc<Mutex<Listing>>,
    launches: Arc<AtomicU32>,
    clicks: Arc<AtomicU32>,
    gate: Mutex<Option<Arc<Notify>>>,
    started: Arc<Notify>,
}

impl SiteRenderer {
    fn new(listing: Listing) -> Self {
        Self {
            listing: Arc::new(Mutex::new(listing)),
            launches: Arc::new(AtomicU32::new(0)),
            clicks: Arc::new(AtomicU32::new(0)),
            gate: Mutex::new(None),
            started: Arc::new(Notify::new()),
        }
    }
}

impl Renderer for SiteRenderer {
    type Session = SiteSession;

    async fn launch(&self) -> RenderResult<SiteSession> {
        let attempt = self.launches.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(SiteSession {
            listing: self.listing.lock().unwrap().clone(),
            attempt,
            page: 0,
            clicks: self.clicks.clone(),
            gate: self.gate.lock().unwrap().take(),
            started: self.started.clone(),
        })
    }
}

struct SiteSession {
    listing: Listing,
    attempt: u32,
    page: usize,
    clicks: Arc<AtomicU32>,
    gate: Option<Arc<Notify>>,
    started: Arc<Notify>,
}

impl RenderSession for SiteSession {
    async fn goto(&mut self, _url: &str) -> RenderResult<()> {
        self.page = 0;
        Ok(())
    }

    async fn wait_for_selector(&mut self, _selector: &str, _timeout: Duration) -> RenderResult<()> {
        if let Some(gate) = self.gate.take() {
            self.started.notify_one();
            gate.notified().await;
        }
        Ok(())
    }

    async fn watch(&mut self, _condition: &PageCondition) -> RenderResult<()> {
        Ok(())
    }

    async fn wait_for_condition(
        &mut self,
        _condition: &PageCondition,
        _timeout: Duration,
    ) -> RenderResult<()> {
        Ok(())
    }

    async fn exists(&mut self, _selector: &str) -> RenderResult<bool> {
        Ok(false)
    }

    async fn read_rows(&mut self, row_selector: &str) -> RenderResult<Vec<RawRow>> {
        let number = self.page + 1;
        if self.listing.broken_page == Some(number) && self.attempt <= self.listing.failures {
            return Err(RenderError::Script(format!("page {} did not render", number)));
        }
        let html = self.listing.pages.get(self.page).cloned().unwrap_or_default();
        parse_rows(&html, row_selector)
    }

    async fn next_control(&mut self, _selector: &str) -> RenderResult<NextControl> {
        if self.page + 1 < self.listing.pages.len() {
            Ok(NextControl::Enabled)
        } else {
            Ok(self.listing.last_control.unwrap_or(NextControl::Disabled))
        }
    }

    async fn set_input_value(&mut self, _selector: &str, _value: &str) -> RenderResult<()> {
        Ok(())
    }

    async fn click(&mut self, _selector: &str) -> RenderResult<()> {
        self.clicks.fetch_add(1, Ordering::SeqCst);
        self.page += 1;
        Ok(())
    }

    async fn close(self) -> RenderResult<()> {
        Ok(())
    }
}

fn settings() -> TraversalSettings {
    TraversalSettings {
        base_url: "https://cekbpom.pom.go.id/all-produk".to_string(),
        page_length: None,
        selectors: SelectorConfig::default(),
        table_timeout: Duration::from_millis(100),
        overlay_timeout: Duration::from_millis(100),
        max_pages: None,
    }
}

fn harvester(
    dir: &TempDir,
    renderer: SiteRenderer,
    policy: RetryPolicy,
) -> Supervisor<SiteRenderer, JsonStore> {
    let store = Arc::new(JsonStore::new(dir.path().join("db").join("bpom_data.json")));
    Supervisor::new(renderer, store, settings(), policy)
}

fn completed(outcome: RunOutcome) -> (bpom_harvester::crawler::CrawlReport, u32) {
    match outcome {
        RunOutcome::Completed { report, attempts } => (report, attempts),
        RunOutcome::Skipped => panic!("crawl was skipped"),
    }
}

fn stored_ids(store: &JsonStore) -> Vec<String> {
    store
        .read()
        .data
        .into_iter()
        .map(|r| r.registration_number)
        .collect()
}

#[tokio::test]
async fn test_full_crawl_stores_every_row_once() {
    let dir = TempDir::new().unwrap();
    // DKL2 is repeated across pages, as happens when the listing shifts.
    let listing = Listing::new(vec![
        vec![row("DKL1<br>Terbit: 2020-01-01", "Paracetamol 500mg"), row("DKL2", "Amoxicillin")],
        vec![row("DKL2", "Amoxicillin"), row("DKL3", "Ibuprofen")],
    ]);
    let harvester = harvester(&dir, SiteRenderer::new(listing), RetryPolicy::bounded(1));

    let (report, attempts) = completed(harvester.run().await.unwrap());

    assert_eq!(attempts, 1);
    assert_eq!(report.pages_visited, 2);
    assert_eq!(report.records_appended, 3);
    assert_eq!(report.duplicates_skipped, 1);
    assert_eq!(stored_ids(harvester.store()), vec!["DKL1", "DKL2", "DKL3"]);
}

#[tokio::test]
async fn test_recrawl_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let listing = Listing::new(vec![vec![row("DKL1", "A")], vec![row("DKL2", "B")]]);
    let harvester = harvester(&dir, SiteRenderer::new(listing), RetryPolicy::bounded(1));

    completed(harvester.run().await.unwrap());
    let before = std::fs::read_to_string(harvester.store().path()).unwrap();
    let first = harvester.store().read().data;

    let (report, _) = completed(harvester.run().await.unwrap());
    assert_eq!(report.records_appended, 0);
    assert_eq!(report.duplicates_skipped, 2);
    assert_eq!(harvester.store().read().data, first);
    assert_eq!(std::fs::read_to_string(harvester.store().path()).unwrap(), before);
}

#[tokio::test]
async fn test_store_grows_monotonically_as_listing_changes() {
    let dir = TempDir::new().unwrap();
    let renderer = SiteRenderer::new(Listing::new(vec![vec![row("DKL1", "A"), row("DKL2", "B")]]));
    let listing = renderer.listing.clone();
    let harvester = harvester(&dir, renderer, RetryPolicy::bounded(1));

    completed(harvester.run().await.unwrap());
    let first = stored_ids(harvester.store());

    // DKL1 disappears from the source; DKL9 appears on top.
    *listing.lock().unwrap() = Listing::new(vec![vec![row("DKL9", "Z"), row("DKL2", "B")]]);
    completed(harvester.run().await.unwrap());
    let second = stored_ids(harvester.store());

    assert_eq!(&second[..first.len()], first.as_slice());
    assert_eq!(second, vec!["DKL1", "DKL2", "DKL9"]);
}

#[tokio::test]
async fn test_missing_store_is_treated_as_empty() {
    let dir = TempDir::new().unwrap();
    let listing = Listing::new(vec![vec![row("DKL1", "A")]]);
    let renderer = SiteRenderer::new(listing);
    let store = Arc::new(JsonStore::new(dir.path().join("fresh.json")));
    let harvester = Supervisor::new(renderer, store.clone(), settings(), RetryPolicy::bounded(1));

    assert!(store.read().data.is_empty());
    assert!(api::list_all(store.as_ref()).is_success());

    let (report, _) = completed(harvester.run().await.unwrap());
    assert_eq!(report.records_appended, 1);
    assert!(store.read().last_updated.is_some());
}

#[tokio::test]
async fn test_corrupt_store_degrades_reads_and_blocks_writes() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bpom_data.json");
    std::fs::write(&path, "{ not json").unwrap();
    let store = Arc::new(JsonStore::new(&path));

    let listing = api::list_all(store.as_ref());
    assert_eq!(listing.status, 200);
    assert_eq!(listing.body["data"], serde_json::json!([]));

    let harvester = Supervisor::new(
        SiteRenderer::new(Listing::new(vec![vec![row("DKL1", "A")]])),
        store,
        settings(),
        RetryPolicy::bounded(1),
    );
    let result = harvester.run().await;
    assert!(matches!(result, Err(HarvestError::Storage(_))));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "{ not json");
}

#[tokio::test]
async fn test_rows_are_normalized() {
    let dir = TempDir::new().unwrap();
    let listing = Listing::new(vec![vec![
        Row {
            kind: "Obat",
            registration: "REG123<br>Terbit: 2020-01-01",
            product: "Paracetamol 500mg<br>Merk: Sanmol<br>Kemasan: Dus, 10 strip",
            registrant: "PT Sanbe Farma<br>Kota Bandung",
        },
        Row {
            kind: "Pangan",
            registration: "REG456",
            product: "Teh Hijau",
            registrant: "PT Teh",
        },
    ]]);
    let harvester = harvester(&dir, SiteRenderer::new(listing), RetryPolicy::bounded(1));
    completed(harvester.run().await.unwrap());

    let document = harvester.store().read();
    let full = document.find("REG123").unwrap();
    assert_eq!(full.kind.as_deref(), Some("Obat"));
    assert_eq!(full.issue_date.as_deref(), Some("2020-01-01"));
    assert_eq!(full.product_name.as_deref(), Some("Paracetamol 500mg"));
    assert_eq!(full.brand.as_deref(), Some("Sanmol"));
    assert_eq!(full.packaging.as_deref(), Some("Dus, 10 strip"));
    assert_eq!(full.registrant_name.as_deref(), Some("PT Sanbe Farma"));
    assert_eq!(full.registrant_location.as_deref(), Some("Kota Bandung"));

    // Only the first product line present: brand and packaging are absent.
    let partial = document.find("REG456").unwrap();
    assert_eq!(partial.issue_date, None);
    assert_eq!(partial.product_name.as_deref(), Some("Teh Hijau"));
    assert_eq!(partial.brand, None);
    assert_eq!(partial.packaging, None);
    assert_eq!(partial.registrant_location, None);

    let raw = std::fs::read_to_string(harvester.store().path()).unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(value["data"][1]["issueDate"], serde_json::Value::Null);
    assert!(value["data"][1].get("brand").is_none());
}

#[tokio::test]
async fn test_rows_without_registration_are_dropped() {
    let dir = TempDir::new().unwrap();
    let mut listing = Listing::new(vec![vec![row("DKL1", "A")]]);
    listing.pages[0] = listing.pages[0].replace(
        "<tbody>",
        "<tbody><tr><td>Obat</td></tr><tr><td>Obat</td><td>   </td><td>X</td><td>Y</td></tr>",
    );
    let harvester = harvester(&dir, SiteRenderer::new(listing), RetryPolicy::bounded(1));

    let (report, _) = completed(harvester.run().await.unwrap());
    assert_eq!(report.rows_seen, 3);
    assert_eq!(report.malformed_dropped, 2);
    assert_eq!(stored_ids(harvester.store()), vec!["DKL1"]);
}

#[tokio::test]
async fn test_search_after_crawl() {
    let dir = TempDir::new().unwrap();
    let listing = Listing::new(vec![vec![
        row("DKL1", "Paracetamol 500mg"),
        row("DKL2", "Amoxicillin"),
    ]]);
    let harvester = harvester(&dir, SiteRenderer::new(listing), RetryPolicy::bounded(1));
    completed(harvester.run().await.unwrap());

    let store = harvester.store().as_ref();
    let found = api::search_by_product(store, Some("paracetamol"));
    assert_eq!(found.status, 200);
    let data = found.body["data"].as_array().unwrap();
    assert_eq!(data.len(), 1);
    assert_eq!(data[0]["productName"], "Paracetamol 500mg");

    let missing = api::search_by_product(store, Some("zzz"));
    assert_eq!(missing.status, 404);

    let lookup = api::get_by_registration(store, "DKL2");
    assert_eq!(lookup.body["data"]["productName"], "Amoxicillin");
}

#[tokio::test]
async fn test_stops_on_disabled_next_control() {
    let dir = TempDir::new().unwrap();
    let mut listing = Listing::new(vec![
        vec![row("P1", "A")],
        vec![row("P2", "B")],
        vec![row("P3", "C")],
    ]);
    listing.last_control = Some(NextControl::Disabled);
    let renderer = SiteRenderer::new(listing);
    let launches = renderer.launches.clone();
    let clicks = renderer.clicks.clone();
    let harvester = harvester(&dir, renderer, RetryPolicy::unbounded());

    let (report, attempts) = completed(harvester.run().await.unwrap());

    assert_eq!(report.pages_visited, 3);
    assert_eq!(attempts, 1);
    assert_eq!(launches.load(Ordering::SeqCst), 1);
    assert_eq!(clicks.load(Ordering::SeqCst), 2);
    assert_eq!(stored_ids(harvester.store()), vec!["P1", "P2", "P3"]);
}

#[tokio::test]
async fn test_stops_when_next_control_is_absent() {
    let dir = TempDir::new().unwrap();
    let mut listing = Listing::new(vec![vec![row("P1", "A")], vec![row("P2", "B")]]);
    listing.last_control = Some(NextControl::Absent);
    let renderer = SiteRenderer::new(listing);
    let mut session = renderer.launch().await.unwrap();
    let store = JsonStore::new(dir.path().join("data.json"));
    let settings = settings();

    let report = Traversal::new(&mut session, &store, &settings)
        .run()
        .await
        .unwrap();
    assert_eq!(report.pages_visited, 2);
    assert!(!report.page_cap_reached);
}

#[tokio::test]
async fn test_retry_resumes_by_skipping_stored_records() {
    let dir = TempDir::new().unwrap();
    let mut listing = Listing::new(vec![
        vec![row("P1", "A"), row("P2", "B")],
        vec![row("P3", "C")],
        vec![row("P4", "D")],
    ]);
    listing.broken_page = Some(3);
    listing.failures = 1;
    let renderer = SiteRenderer::new(listing);
    let launches = renderer.launches.clone();
    let harvester = harvester(&dir, renderer, RetryPolicy::unbounded());

    let (report, attempts) = completed(harvester.run().await.unwrap());

    assert_eq!(attempts, 2);
    assert_eq!(launches.load(Ordering::SeqCst), 2);
    assert_eq!(report.records_appended, 1);
    assert_eq!(report.duplicates_skipped, 3);
    assert_eq!(stored_ids(harvester.store()), vec!["P1", "P2", "P3", "P4"]);
}

#[tokio::test]
async fn test_bounded_retry_gives_up() {
    let dir = TempDir::new().unwrap();
    let mut listing = Listing::new(vec![vec![row("P1", "A")], vec![row("P2", "B")]]);
    listing.broken_page = Some(2);
    listing.failures = u32::MAX;
    let renderer = SiteRenderer::new(listing);
    let launches = renderer.launches.clone();
    let harvester = harvester(&dir, renderer, RetryPolicy::bounded(3));

    let result = harvester.run().await;

    assert!(matches!(result, Err(HarvestError::PageTraversal { page: 2, .. })));
    assert_eq!(launches.load(Ordering::SeqCst), 3);
    // Page 1 survived the failed attempts.
    assert_eq!(stored_ids(harvester.store()), vec!["P1"]);
}

#[tokio::test]
async fn test_page_cap_ends_crawl_early() {
    let dir = TempDir::new().unwrap();
    let listing = Listing::new(vec![
        vec![row("P1", "A")],
        vec![row("P2", "B")],
        vec![row("P3", "C")],
    ]);
    let renderer = SiteRenderer::new(listing);
    let store = Arc::new(JsonStore::new(dir.path().join("data.json")));
    let settings = TraversalSettings {
        max_pages: Some(2),
        ..settings()
    };
    let harvester = Supervisor::new(renderer, store, settings, RetryPolicy::bounded(1));

    let (report, _) = completed(harvester.run().await.unwrap());
    assert_eq!(report.pages_visited, 2);
    assert!(report.page_cap_reached);
    assert_eq!(stored_ids(harvester.store()), vec!["P1", "P2"]);
}

#[tokio::test]
async fn test_overlapping_trigger_is_skipped() {
    let dir = TempDir::new().unwrap();
    let renderer = SiteRenderer::new(Listing::new(vec![vec![row("P1", "A")]]));
    let gate = Arc::new(Notify::new());
    *renderer.gate.lock().unwrap() = Some(gate.clone());
    let started = renderer.started.clone();
    let launches = renderer.launches.clone();
    let harvester = Arc::new(harvester(&dir, renderer, RetryPolicy::unbounded()));

    let running = tokio::spawn({
        let harvester = harvester.clone();
        async move { harvester.run().await }
    });
    started.notified().await;

    assert!(harvester.is_running());
    assert_eq!(harvester.run().await.unwrap(), RunOutcome::Skipped);

    gate.notify_one();
    let (report, _) = completed(running.await.unwrap().unwrap());
    assert_eq!(report.records_appended, 1);
    assert_eq!(launches.load(Ordering::SeqCst), 1);

    // Once the guard is free the next trigger runs normally.
    let (again, _) = completed(harvester.run().await.unwrap());
    assert_eq!(again.records_appended, 0);
}

#[tokio::test]
async fn test_recrawl_without_new_rows_keeps_timestamp() {
    let dir = TempDir::new().unwrap();
    let renderer = SiteRenderer::new(Listing::new(vec![vec![row("P1", "A")]]));
    let harvester = harvester(&dir, renderer, RetryPolicy::bounded(1));
    completed(harvester.run().await.unwrap());
    let stamp = harvester.store().read().last_updated.unwrap();

    // Nothing new: the stamp is left alone.
    completed(harvester.run().await.unwrap());
    assert_eq!(harvester.store().read().last_updated.unwrap(), stamp);

    let metadata = api::metadata(harvester.store().as_ref());
    assert_eq!(metadata.body["metadata"]["lastUpdated"], stamp.as_str());
}
