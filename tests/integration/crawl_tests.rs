//! Integration tests for the crawler
//!
//! These tests use wiremock to stand in for the travel site (typeahead
//! endpoint, listing pages, detail pages) and drive full runs end-to-end.
//! Page 1 is "rendered" by a plain HTTP renderer so no browser is needed.

use async_trait::async_trait;
use dinescout::config::{BrowserConfig, Config, CrawlerConfig, OutputConfig, SiteConfig};
use dinescout::crawler::{Orchestrator, Renderer};
use dinescout::model::{derive_id, ListingDetail, Location};
use dinescout::storage::{
    Mirror, RecordStore, ScopeManifest, SqliteMirror, StorageError, StorageResult,
};
use dinescout::{CrawlState, Result, ScrapeError};
use serde_json::json;
use std::ops::RangeInclusive;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use wiremock::matchers::{body_string_contains, method, path, path_regex};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

const FIRST_PAGE: &str = "/Restaurants-g1-Springfield.html";

/// Creates a test configuration pointed at the mock site
fn create_test_config(base_url: &str, dir: &Path) -> Config {
    Config {
        crawler: CrawlerConfig {
            max_pages: 0,
            max_connections: 8,
            request_timeout_secs: 5,
            retry_attempts: 2,
            retry_delay_secs: 0, // No backoff in tests
            reset_every: 2,
            page_delay_ms: 0,
        },
        site: SiteConfig {
            base_url: base_url.to_string(),
            ..SiteConfig::default()
        },
        browser: BrowserConfig {
            wait_for: Vec::new(),
            ..BrowserConfig::default()
        },
        output: OutputConfig {
            data_dir: dir.join("data").to_string_lossy().to_string(),
            database_path: dir.join("mirror.db").to_string_lossy().to_string(),
        },
    }
}

fn create_store(config: &Config) -> RecordStore<SqliteMirror> {
    let mirror = SqliteMirror::new(Path::new(&config.output.database_path)).unwrap();
    RecordStore::new(&config.output.data_dir, mirror)
}

/// Renderer that fetches pages over plain HTTP and counts what it does
#[derive(Default)]
struct HttpRenderer {
    client: reqwest::Client,
    started: bool,
    fail_launch: bool,
    starts: Arc<AtomicU32>,
    renders: Arc<AtomicU32>,
    closes: Arc<AtomicU32>,
}

#[async_trait]
impl Renderer for HttpRenderer {
    async fn start(&mut self) -> Result<()> {
        if self.fail_launch {
            return Err(ScrapeError::BrowserLaunch("no browser in test".to_string()));
        }
        self.starts.fetch_add(1, Ordering::SeqCst);
        self.started = true;
        Ok(())
    }

    async fn render(&self, url: &str, _wait_for: &[String]) -> Result<String> {
        assert!(self.started, "render called before start");
        self.renders.fetch_add(1, Ordering::SeqCst);

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(ScrapeError::Request {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }
        Ok(response.text().await?)
    }

    async fn close(&mut self) -> Result<()> {
        if self.started {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
        self.started = false;
        Ok(())
    }
}

/// Mirror that refuses one page and delegates everything else
struct FailingMirror {
    inner: SqliteMirror,
    fail_page: u32,
}

impl Mirror for FailingMirror {
    fn upsert_listings(
        &mut self,
        location: &str,
        page: u32,
        listings: &[ListingDetail],
    ) -> StorageResult<usize> {
        if page == self.fail_page {
            return Err(StorageError::Database("disk full".to_string()));
        }
        self.inner.upsert_listings(location, page, listings)
    }

    fn get_listing(&self, id: &str) -> StorageResult<Option<ListingDetail>> {
        self.inner.get_listing(id)
    }

    fn count_listings(&self) -> StorageResult<u64> {
        self.inner.count_listings()
    }

    fn upsert_location(&mut self, location: &Location) -> StorageResult<()> {
        self.inner.upsert_location(location)
    }

    fn load_locations(&self) -> StorageResult<Vec<Location>> {
        self.inner.load_locations()
    }
}

/// Serves a detail page for every `-d<n>-` path
///
/// Listing `n` is "Diner n" at "n Main St". Listings in `broken_reviews`
/// carry a review summary whose rating is not a number.
struct DetailPages {
    broken_reviews: Vec<u32>,
}

impl Respond for DetailPages {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let Some(n) = listing_number(request.url.path()) else {
            return ResponseTemplate::new(404);
        };

        let review = if self.broken_reviews.contains(&n) {
            json!({ "reviewSummary": { "rating": "n/a", "count": 12 } })
        } else {
            json!({ "reviewSummary": { "rating": 4.5, "count": n } })
        };
        let docs = [
            json!({ "businessInfo": {
                "name": format!("Diner {}", n),
                "address": format!("{} Main St", n),
                "phone": "+1 555 0100",
            }}),
            review,
            json!({ "establishmentTags": { "priceTier": "$$", "tags": [{ "name": "Diner" }] } }),
        ];
        let results: serde_json::Map<String, serde_json::Value> = docs
            .iter()
            .enumerate()
            .map(|(i, doc)| (i.to_string(), json!({ "data": doc.to_string() })))
            .collect();

        let body = format!(
            "<html><body><script>window.__WEB_CONTEXT__={{pageManifest:{}}};</script></body></html>",
            json!({ "urqlCache": { "results": results } })
        );
        ResponseTemplate::new(200).set_body_string(body)
    }
}

fn listing_number(path: &str) -> Option<u32> {
    let rest = &path[path.find("-d")? + 2..];
    rest.split('-').next()?.parse().ok()
}

fn listing_page(ids: RangeInclusive<u32>, total: u32, next: Option<&str>) -> String {
    listing_page_with_ads(ids, 1, total, next)
}

/// A listing page with `ads` sponsored rows ahead of the organic ones
fn listing_page_with_ads(
    ids: RangeInclusive<u32>,
    ads: u32,
    total: u32,
    next: Option<&str>,
) -> String {
    let mut html = format!(
        r#"<html><body><span data-test-target="results-count">{} results</span>
<div data-test-target="restaurants-list">"#,
        total
    );
    for ad in 0..ads {
        html.push_str(&format!(
            r#"<div data-sponsored="true"><a href="/Restaurant_Review-g1-d{}-Ad.html">Ad</a></div>"#,
            9000 + ad
        ));
    }
    for n in ids {
        html.push_str(&format!(
            r#"<div><a href="/Restaurant_Review-g1-d{n}-Springfield.html">Diner {n}</a><picture><img src="/photos/{n}.jpg"></picture></div>"#
        ));
    }
    html.push_str("</div>");
    if let Some(href) = next {
        html.push_str(&format!(
            r#"<a data-smoke-attr="pagination-next-arrow" href="{}">Next</a>"#,
            href
        ));
    }
    html.push_str("</body></html>");
    html
}

async fn mount_search(server: &MockServer, query: &str, with_details: bool) {
    let result = if with_details {
        json!({ "details": {
            "localizedName": query,
            "url": format!("/Tourism-g1-{}.html", query),
            "RESTAURANTS_URL": format!("/Restaurants-g1-{}.html", query),
            "ATTRACTIONS_URL": format!("/Attractions-g1-{}.html", query),
            "HOTELS_URL": format!("/Hotels-g1-{}.html", query),
            "placeType": "CITY",
            "latitude": 39.8,
            "longitude": -89.6,
        }})
    } else {
        json!({ "text": query })
    };

    Mock::given(method("POST"))
        .and(path("/data/graphql/ids"))
        .and(body_string_contains(query))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "data": { "Typeahead_autocomplete": { "results": [result] } } }
        ])))
        .mount(server)
        .await;
}

async fn mount_listing(server: &MockServer, page_path: &str, body: String, expected: u64) {
    Mock::given(method("GET"))
        .and(path(page_path))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .expect(expected)
        .mount(server)
        .await;
}

async fn mount_details(server: &MockServer, broken_reviews: Vec<u32>) {
    Mock::given(method("GET"))
        .and(path_regex(r"^/Restaurant_Review-"))
        .respond_with(DetailPages { broken_reviews })
        .mount(server)
        .await;
}

fn offset_path(offset: u32) -> String {
    format!("/Restaurants-g1-oa{}-Springfield.html", offset)
}

#[tokio::test]
async fn test_page_budget_clamped_to_site_total() {
    let server = MockServer::start().await;
    let temp_dir = tempfile::tempdir().unwrap();
    let config = create_test_config(&server.uri(), temp_dir.path());

    // 87 results at 30 per page is 3 pages, even with a budget of 5
    mount_search(&server, "Springfield", true).await;
    mount_listing(
        &server,
        FIRST_PAGE,
        listing_page(1..=30, 87, Some(&offset_path(30))),
        1,
    )
    .await;
    mount_listing(&server, &offset_path(30), listing_page(31..=60, 87, Some(&offset_path(60))), 1).await;
    mount_listing(&server, &offset_path(60), listing_page(61..=87, 87, None), 1).await;
    mount_listing(&server, &offset_path(90), listing_page(88..=90, 87, None), 0).await;
    mount_details(&server, Vec::new()).await;

    let renderer = HttpRenderer::default();
    let renders = renderer.renders.clone();
    let closes = renderer.closes.clone();
    let mut orchestrator = Orchestrator::new(config.clone(), renderer, create_store(&config)).unwrap();

    let summary = orchestrator
        .run(&["Springfield".to_string()], 5)
        .await
        .unwrap();
    assert_eq!(closes.load(Ordering::SeqCst), 1);

    let outcome = summary.outcome("Springfield").unwrap();
    assert!(outcome.is_done(), "unexpected state: {}", outcome.state);
    assert_eq!(outcome.tally.pages_written, 3);
    assert_eq!(outcome.tally.records, 87);
    assert_eq!(renders.load(Ordering::SeqCst), 1);

    let store = orchestrator.store();
    assert!(store.is_complete("springfield", 3));
    assert!(!store.is_complete("springfield", 4));
    assert_eq!(store.mirror().count_listings().unwrap(), 87);

    let scope = store.scope("springfield").unwrap().unwrap();
    assert_eq!(scope.total_results, 87);
    assert_eq!(scope.results_on_first_page, 30);
    assert_eq!(scope.total_pages, 3);
}

#[tokio::test]
async fn test_ids_derive_from_address_and_name() {
    let server = MockServer::start().await;
    let temp_dir = tempfile::tempdir().unwrap();
    let config = create_test_config(&server.uri(), temp_dir.path());

    mount_search(&server, "Springfield", true).await;
    mount_listing(&server, FIRST_PAGE, listing_page(1..=4, 4, None), 1).await;
    mount_details(&server, Vec::new()).await;

    let mut orchestrator =
        Orchestrator::new(config.clone(), HttpRenderer::default(), create_store(&config)).unwrap();
    orchestrator.run(&["Springfield".to_string()], 0).await.unwrap();

    let store = orchestrator.store();
    let snapshot = store.snapshots().read_page("springfield", 1).unwrap();
    assert_eq!(snapshot.len(), 4);

    for listing in &snapshot {
        assert_eq!(listing.id, derive_id(&listing.address, &listing.name));

        let mirrored = store.mirror().get_listing(&listing.id).unwrap().unwrap();
        assert_eq!(&mirrored, listing);
    }

    // Detail-relative links and preview images are stored absolute
    let first = snapshot.iter().find(|l| l.name == "Diner 1").unwrap();
    assert_eq!(
        first.detail_url,
        format!("{}/Restaurant_Review-g1-d1-Springfield.html", server.uri())
    );
    assert_eq!(first.images, vec![format!("{}/photos/1.jpg", server.uri())]);
    assert_eq!(first.tags, vec!["Diner"]);
}

#[tokio::test]
async fn test_resume_skips_committed_pages() {
    let server = MockServer::start().await;
    let temp_dir = tempfile::tempdir().unwrap();
    let config = create_test_config(&server.uri(), temp_dir.path());

    // A previous run committed pages 1-3 and sized the scope at 4 pages
    let seeded = create_store(&config);
    for page in 1..=3 {
        seeded.snapshots().write_page("springfield", page, &[]).unwrap();
    }
    seeded
        .save_scope(
            "springfield",
            &ScopeManifest {
                total_results: 120,
                results_on_first_page: 30,
                total_pages: 4,
                next_page: Some(offset_path(30)),
            },
        )
        .unwrap();
    drop(seeded);

    mount_search(&server, "Springfield", true).await;
    mount_listing(&server, FIRST_PAGE, listing_page(1..=30, 120, None), 0).await;
    mount_listing(&server, &offset_path(30), listing_page(31..=60, 120, None), 0).await;
    mount_listing(&server, &offset_path(60), listing_page(61..=90, 120, None), 0).await;
    mount_listing(&server, &offset_path(90), listing_page(91..=120, 120, None), 1).await;
    mount_details(&server, Vec::new()).await;

    let renderer = HttpRenderer::default();
    let starts = renderer.starts.clone();
    let mut orchestrator = Orchestrator::new(config.clone(), renderer, create_store(&config)).unwrap();

    let summary = orchestrator
        .run(&["Springfield".to_string()], 0)
        .await
        .unwrap();

    let outcome = summary.outcome("Springfield").unwrap();
    assert!(outcome.is_done());
    assert_eq!(outcome.tally.pages_skipped, 3);
    assert_eq!(outcome.tally.pages_written, 1);
    assert_eq!(outcome.tally.records, 30);

    // No browser session is needed when page 1 and the scope are on disk
    assert_eq!(starts.load(Ordering::SeqCst), 0);
    assert!(orchestrator.store().is_complete("springfield", 4));
}

#[tokio::test]
async fn test_broken_review_summary_still_persisted() {
    let server = MockServer::start().await;
    let temp_dir = tempfile::tempdir().unwrap();
    let config = create_test_config(&server.uri(), temp_dir.path());

    mount_search(&server, "Springfield", true).await;
    mount_listing(&server, FIRST_PAGE, listing_page(1..=2, 2, None), 1).await;
    mount_details(&server, vec![2]).await;

    let mut orchestrator =
        Orchestrator::new(config.clone(), HttpRenderer::default(), create_store(&config)).unwrap();
    let summary = orchestrator
        .run(&["Springfield".to_string()], 0)
        .await
        .unwrap();
    assert_eq!(summary.records(), 2);

    let mirror = orchestrator.store().mirror();

    let degraded = mirror
        .get_listing(&derive_id("2 Main St", "Diner 2"))
        .unwrap()
        .expect("degraded listing should be stored");
    assert_eq!(degraded.rating, -1.0);
    assert_eq!(degraded.review_count, -1);
    assert_eq!(degraded.price_tier, "$$");

    let healthy = mirror
        .get_listing(&derive_id("1 Main St", "Diner 1"))
        .unwrap()
        .unwrap();
    assert_eq!(healthy.rating, 4.5);
    assert_eq!(healthy.review_count, 1);
}

#[tokio::test]
async fn test_mirror_failure_leaves_no_snapshot() {
    let server = MockServer::start().await;
    let temp_dir = tempfile::tempdir().unwrap();
    let config = create_test_config(&server.uri(), temp_dir.path());

    mount_search(&server, "Springfield", true).await;
    mount_listing(&server, FIRST_PAGE, listing_page(1..=3, 9, Some(&offset_path(3))), 1).await;
    mount_listing(&server, &offset_path(3), listing_page(4..=6, 9, None), 1).await;
    mount_listing(&server, &offset_path(6), listing_page(7..=9, 9, None), 0).await;
    mount_details(&server, Vec::new()).await;

    let mirror = FailingMirror {
        inner: SqliteMirror::open_in_memory().unwrap(),
        fail_page: 2,
    };
    let store = RecordStore::new(&config.output.data_dir, mirror);
    let mut orchestrator = Orchestrator::new(config, HttpRenderer::default(), store).unwrap();

    let summary = orchestrator
        .run(&["Springfield".to_string()], 0)
        .await
        .unwrap();

    let outcome = summary.outcome("Springfield").unwrap();
    assert!(matches!(outcome.state, CrawlState::Failed { .. }));
    assert_eq!(outcome.tally.pages_written, 1);

    let store = orchestrator.store();
    assert!(store.is_complete("springfield", 1));
    assert!(!store.is_complete("springfield", 2));
    assert!(!store.snapshots().page_path("springfield", 2).exists());
    assert_eq!(store.mirror().count_listings().unwrap(), 3);
}

#[tokio::test]
async fn test_unresolvable_location_does_not_abort_run() {
    let server = MockServer::start().await;
    let temp_dir = tempfile::tempdir().unwrap();
    let config = create_test_config(&server.uri(), temp_dir.path());

    mount_search(&server, "Atlantis", false).await;
    mount_search(&server, "Springfield", true).await;
    mount_listing(&server, FIRST_PAGE, listing_page(1..=2, 2, None), 1).await;
    mount_details(&server, Vec::new()).await;

    let mut orchestrator =
        Orchestrator::new(config.clone(), HttpRenderer::default(), create_store(&config)).unwrap();
    let summary = orchestrator
        .run(&["Atlantis".to_string(), "Springfield".to_string()], 0)
        .await
        .unwrap();

    assert_eq!(summary.failed(), 1);
    assert_eq!(summary.succeeded(), 1);
    assert!(!summary.outcome("Atlantis").unwrap().is_done());
    assert!(summary.outcome("Springfield").unwrap().is_done());

    let locations = orchestrator.store().mirror().load_locations().unwrap();
    assert_eq!(locations.len(), 1);
    assert_eq!(locations[0].listing_url.food, FIRST_PAGE);
}

#[tokio::test]
async fn test_browser_launch_failure_aborts_run() {
    let server = MockServer::start().await;
    let temp_dir = tempfile::tempdir().unwrap();
    let config = create_test_config(&server.uri(), temp_dir.path());

    mount_search(&server, "Springfield", true).await;
    mount_search(&server, "Shelbyville", true).await;
    mount_listing(&server, FIRST_PAGE, listing_page(1..=2, 2, None), 0).await;

    let renderer = HttpRenderer {
        fail_launch: true,
        ..HttpRenderer::default()
    };
    let mut orchestrator = Orchestrator::new(config.clone(), renderer, create_store(&config)).unwrap();

    let result = orchestrator
        .run(&["Springfield".to_string(), "Shelbyville".to_string()], 0)
        .await;

    let err = result.unwrap_err();
    assert!(err.is_fatal(), "expected a fatal error, got {}", err);
    assert!(!orchestrator.store().is_complete("springfield", 1));
}

#[tokio::test]
async fn test_sponsored_rows_do_not_shift_page_offsets() {
    let server = MockServer::start().await;
    let temp_dir = tempfile::tempdir().unwrap();
    let config = create_test_config(&server.uri(), temp_dir.path());

    // Page 1 shows 3 ads and 27 organic rows; the site still pages by 30
    mount_search(&server, "Springfield", true).await;
    mount_listing(
        &server,
        FIRST_PAGE,
        listing_page_with_ads(1..=27, 3, 57, Some(&offset_path(30))),
        1,
    )
    .await;
    mount_listing(&server, &offset_path(30), listing_page_with_ads(28..=57, 0, 57, None), 1).await;
    mount_listing(&server, &offset_path(27), listing_page_with_ads(28..=57, 0, 57, None), 0).await;
    mount_details(&server, Vec::new()).await;

    let mut orchestrator =
        Orchestrator::new(config.clone(), HttpRenderer::default(), create_store(&config)).unwrap();
    let summary = orchestrator
        .run(&["Springfield".to_string()], 0)
        .await
        .unwrap();

    let outcome = summary.outcome("Springfield").unwrap();
    assert!(outcome.is_done(), "unexpected state: {}", outcome.state);
    assert_eq!(outcome.tally.pages_written, 2);
    assert_eq!(outcome.tally.records, 57);

    let scope = orchestrator.store().scope("springfield").unwrap().unwrap();
    assert_eq!(scope.results_on_first_page, 30);
    assert_eq!(scope.total_pages, 2);
}

#[tokio::test]
async fn test_render_failure_still_closes_browser() {
    let server = MockServer::start().await;
    let temp_dir = tempfile::tempdir().unwrap();
    let config = create_test_config(&server.uri(), temp_dir.path());

    mount_search(&server, "Springfield", true).await;
    Mock::given(method("GET"))
        .and(path(FIRST_PAGE))
        .respond_with(ResponseTemplate::new(503))
        .expect(2) // one per attempt
        .mount(&server)
        .await;

    let renderer = HttpRenderer::default();
    let starts = renderer.starts.clone();
    let closes = renderer.closes.clone();
    let mut orchestrator = Orchestrator::new(config.clone(), renderer, create_store(&config)).unwrap();

    let summary = orchestrator
        .run(&["Springfield".to_string()], 0)
        .await
        .unwrap();

    let outcome = summary.outcome("Springfield").unwrap();
    assert!(matches!(outcome.state, CrawlState::Failed { .. }));
    assert_eq!(starts.load(Ordering::SeqCst), 1);
    assert_eq!(closes.load(Ordering::SeqCst), 1);
    assert!(!orchestrator.store().is_complete("springfield", 1));
}

#[tokio::test]
async fn test_lookup_prefers_mirrored_locations() {
    let server = MockServer::start().await;
    let temp_dir = tempfile::tempdir().unwrap();
    let config = create_test_config(&server.uri(), temp_dir.path());

    // Springfield was resolved by an earlier run
    let mut seeded = create_store(&config);
    seeded
        .record_location(&Location {
            name: "Springfield".to_string(),
            url: "/Tourism-g1-Springfield.html".to_string(),
            listing_url: dinescout::model::CategoryUrls {
                food: FIRST_PAGE.to_string(),
                fun: String::new(),
                lodging: String::new(),
            },
            place_type: "CITY".to_string(),
            latitude: 39.8,
            longitude: -89.6,
        })
        .unwrap();
    drop(seeded);

    Mock::given(method("POST"))
        .and(path("/data/graphql/ids"))
        .and(body_string_contains("Springfield"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;
    mount_search(&server, "Shelbyville", true).await;

    let mut orchestrator =
        Orchestrator::new(config.clone(), HttpRenderer::default(), create_store(&config)).unwrap();
    let found = orchestrator
        .lookup_locations(&[
            "springfield".to_string(),
            "Shelbyville".to_string(),
            "Springfield".to_string(),
        ])
        .await
        .unwrap();

    let names: Vec<&str> = found.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(names, vec!["springfield", "Shelbyville"]);
    assert_eq!(found[0].1.as_ref().unwrap().listing_url.food, FIRST_PAGE);
    assert!(found[1].1.is_ok());

    // The fresh resolution is mirrored for the next lookup
    let stored = orchestrator.store().locations().unwrap();
    let stored: Vec<&str> = stored.iter().map(|l| l.name.as_str()).collect();
    assert_eq!(stored, vec!["Shelbyville", "Springfield"]);
}
