//! Integration tests for the crawlers
//!
//! These tests use wiremock to stand in for the store endpoints and run the
//! listing and review crawls end-to-end against a temporary output root.

use std::path::Path;
use std::time::{Duration, Instant};
use steam_harvest::catalog::{write_item_table, CatalogItem, ItemKind};
use steam_harvest::config::Config;
use steam_harvest::crawler::{crawl_listing, crawl_reviews, Fetcher};
use steam_harvest::extract::extract_reviews;
use steam_harvest::storage::{read_archive, Ledger, RunKind, RunStatus, SqliteLedger};
use steam_harvest::{CompletionPolicy, FetchError, HarvestError};
use tempfile::tempdir;
use url::Url;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

/// Creates a test configuration pointing every endpoint at the mock server
fn create_test_config(server: &MockServer, root: &Path) -> Config {
    let mut config = Config::default();
    config.output.root = root.to_path_buf();
    config.http.pause_secs = 0.0;
    config.http.timeout_secs = 5;
    config.listing.url = format!("{}/search/results", server.uri());
    config.listing.empty_page_delay_secs = 0.0;
    config.listing.max_retries = 2;
    config.reviews.url = format!("{}/appreviews", server.uri());
    config.reviews.max_retries = 1;
    config.reviews.max_errors = 2;
    config
}

fn listing_page(ids: &[u32]) -> String {
    ids.iter()
        .map(|id| {
            format!(
                r#"<a href="https://store.steampowered.com/app/{0}/Game_{0}/"><span class="title">Game {0}</span></a>"#,
                id
            )
        })
        .collect()
}

fn review_page(cursor: &str) -> String {
    serde_json::json!({
        "success": 1,
        "html": "<div class=\"review_box\"><div class=\"title ellipsis\">Recommended</div></div>",
        "cursor": cursor,
    })
    .to_string()
}

const TERMINAL_PAGE: &str = r#"{"success":2}"#;

async fn mount_review(server: &MockServer, id: &str, cursor: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(format!("/appreviews/{}", id)))
        .and(query_param("cursor", cursor))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

async fn requests_to(server: &MockServer, request_path: &str) -> Vec<Request> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.url.path() == request_path)
        .collect()
}

fn query_value(request: &Request, key: &str) -> Option<String> {
    request
        .url
        .query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

fn write_items(config: &Config, items: &[CatalogItem]) {
    write_item_table(&config.item_table_path(), items).unwrap();
}

fn item_dir(root: &Path, name: &str) -> std::path::PathBuf {
    root.join("pages").join("reviews").join(name)
}

#[tokio::test]
async fn test_listing_stops_after_repeated_empty_pages() {
    let server = MockServer::start().await;
    let dir = tempdir().unwrap();
    let config = create_test_config(&server, dir.path());

    for (page, body) in [("0", listing_page(&[10, 20])), ("1", listing_page(&[30]))] {
        Mock::given(method("GET"))
            .and(path("/search/results"))
            .and(query_param("page", page))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path("/search/results"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>no results</html>"))
        .mount(&server)
        .await;

    let summary = crawl_listing(&config).await.unwrap();
    assert_eq!(summary.pages_saved, 2);
    assert_eq!(summary.items_seen, 3);
    assert_eq!(summary.last_page, 2);

    let games = dir.path().join("pages").join("games");
    assert!(games.join("games-page-0.html").exists());
    assert!(games.join("games-page-1.html").exists());
    assert!(!games.join("games-page-2.html").exists());

    // One observation plus max_retries re-fetches of the empty page
    let empty_fetches = requests_to(&server, "/search/results")
        .await
        .iter()
        .filter(|r| query_value(r, "page").as_deref() == Some("2"))
        .count();
    assert_eq!(empty_fetches, 3);

    let ledger = SqliteLedger::new(&config.ledger_path()).unwrap();
    let run = ledger.get_latest_run(RunKind::Listing).unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Completed);
}

#[tokio::test]
async fn test_listing_recovers_from_failed_page() {
    let server = MockServer::start().await;
    let dir = tempdir().unwrap();
    let config = create_test_config(&server, dir.path());

    Mock::given(method("GET"))
        .and(path("/search/results"))
        .and(query_param("page", "0"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(3)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/search/results"))
        .and(query_param("page", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_page(&[10])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/search/results"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(""))
        .mount(&server)
        .await;

    let summary = crawl_listing(&config).await.unwrap();
    assert_eq!(summary.pages_saved, 1);
    assert!(dir
        .path()
        .join("pages/games/games-page-0.html")
        .exists());
}

#[tokio::test]
async fn test_listing_stalls_on_persistent_failure() {
    let server = MockServer::start().await;
    let dir = tempdir().unwrap();
    let mut config = create_test_config(&server, dir.path());
    config.listing.max_retries = 1;
    config.listing.max_page_failures = 3;

    Mock::given(method("GET"))
        .and(path("/search/results"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let result = crawl_listing(&config).await;
    assert!(matches!(
        result,
        Err(HarvestError::ListingStalled {
            page: 0,
            failures: 3
        })
    ));
    assert_eq!(requests_to(&server, "/search/results").await.len(), 3);

    let ledger = SqliteLedger::new(&config.ledger_path()).unwrap();
    let run = ledger.get_latest_run(RunKind::Listing).unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Partial);
}

#[tokio::test]
async fn test_fetch_retries_until_success() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&server)
        .await;

    let fetcher = Fetcher::new(reqwest::Client::new(), 3, Duration::ZERO);
    let url = Url::parse(&format!("{}/flaky", server.uri())).unwrap();

    assert_eq!(fetcher.fetch(&url).await.unwrap(), b"ok".to_vec());
    assert_eq!(requests_to(&server, "/flaky").await.len(), 3);
}

#[tokio::test]
async fn test_fetch_exhaustion() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/down"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let fetcher = Fetcher::new(reqwest::Client::new(), 3, Duration::ZERO);
    let url = Url::parse(&format!("{}/down", server.uri())).unwrap();

    match fetcher.fetch(&url).await {
        Err(FetchError::RetriesExhausted { attempts, last, .. }) => {
            assert_eq!(attempts, 3);
            assert!(matches!(*last, FetchError::Http { status: 500, .. }));
        }
        other => panic!("expected exhaustion, got {:?}", other),
    }
    assert_eq!(requests_to(&server, "/down").await.len(), 3);
}

#[tokio::test]
async fn test_review_cursor_chain() {
    let server = MockServer::start().await;
    let dir = tempdir().unwrap();
    let config = create_test_config(&server, dir.path());
    write_items(
        &config,
        &[CatalogItem::new(ItemKind::Primary, "10", "Counter-Strike")],
    );

    mount_review(&server, "10", "*", review_page("A")).await;
    mount_review(&server, "10", "A", review_page("B+/=")).await;
    mount_review(&server, "10", "B+/=", TERMINAL_PAGE.to_string()).await;

    let summary = crawl_reviews(&config).await.unwrap();
    assert_eq!(summary.completed, 1);
    assert_eq!(summary.pages, 2);
    assert!(!summary.is_partial());

    let cursors: Vec<String> = requests_to(&server, "/appreviews/10")
        .await
        .iter()
        .map(|r| query_value(r, "cursor").unwrap())
        .collect();
    assert_eq!(cursors, vec!["*", "A", "B+/="]);

    let item = item_dir(dir.path(), "app-10");
    assert_eq!(
        std::fs::read_to_string(item.join("reviews-1.html")).unwrap(),
        review_page("A")
    );
    assert!(item.join("reviews-2.html").exists());
    assert!(!item.join("reviews-3.html").exists());
    assert!(item.join("reviews-done.txt").exists());
}

#[tokio::test]
async fn test_completed_items_are_not_refetched() {
    let server = MockServer::start().await;
    let dir = tempdir().unwrap();
    let config = create_test_config(&server, dir.path());
    write_items(
        &config,
        &[CatalogItem::new(ItemKind::Primary, "10", "Counter-Strike")],
    );

    mount_review(&server, "10", "*", review_page("A")).await;
    mount_review(&server, "10", "A", TERMINAL_PAGE.to_string()).await;

    crawl_reviews(&config).await.unwrap();
    let before = requests_to(&server, "/appreviews/10").await.len();
    assert_eq!(before, 2);

    let summary = crawl_reviews(&config).await.unwrap();
    assert_eq!(summary.skipped_complete, 1);
    assert_eq!(requests_to(&server, "/appreviews/10").await.len(), before);
}

#[tokio::test]
async fn test_secondary_items_are_skipped() {
    let server = MockServer::start().await;
    let dir = tempdir().unwrap();
    let config = create_test_config(&server, dir.path());
    write_items(
        &config,
        &[
            CatalogItem::new(ItemKind::Secondary, "20", "Bundle"),
            CatalogItem::new(ItemKind::Primary, "10", "Counter-Strike"),
        ],
    );

    mount_review(&server, "10", "*", TERMINAL_PAGE.to_string()).await;

    let summary = crawl_reviews(&config).await.unwrap();
    assert_eq!(summary.skipped_secondary, 1);
    assert_eq!(summary.completed, 1);

    assert!(requests_to(&server, "/appreviews/20").await.is_empty());
    let first = &requests_to(&server, "/appreviews/10").await[0];
    assert_eq!(query_value(first, "cursor").as_deref(), Some("*"));
    assert_eq!(query_value(first, "language").as_deref(), Some("english"));
    assert_eq!(query_value(first, "filter").as_deref(), Some("recent"));
}

#[tokio::test]
async fn test_aborted_item_marked_complete_under_any_exit() {
    let server = MockServer::start().await;
    let dir = tempdir().unwrap();
    let mut config = create_test_config(&server, dir.path());
    config.reviews.completion = CompletionPolicy::AnyExit;
    write_items(
        &config,
        &[CatalogItem::new(ItemKind::Primary, "10", "Counter-Strike")],
    );

    Mock::given(method("GET"))
        .and(path("/appreviews/10"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let summary = crawl_reviews(&config).await.unwrap();
    assert_eq!(summary.aborted, 1);
    assert!(summary.is_partial());
    assert_eq!(requests_to(&server, "/appreviews/10").await.len(), 2);
    assert!(item_dir(dir.path(), "app-10").join("reviews-done.txt").exists());

    // The defect is visible: the item is never retried
    crawl_reviews(&config).await.unwrap();
    assert_eq!(requests_to(&server, "/appreviews/10").await.len(), 2);
}

#[tokio::test]
async fn test_aborted_item_resumes_from_checkpoint() {
    let server = MockServer::start().await;
    let dir = tempdir().unwrap();
    let config = create_test_config(&server, dir.path());
    write_items(
        &config,
        &[CatalogItem::new(ItemKind::Primary, "10", "Counter-Strike")],
    );

    mount_review(&server, "10", "*", review_page("A")).await;
    Mock::given(method("GET"))
        .and(path("/appreviews/10"))
        .and(query_param("cursor", "A"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let summary = crawl_reviews(&config).await.unwrap();
    assert_eq!(summary.aborted, 1);

    let item = item_dir(dir.path(), "app-10");
    assert!(item.join("reviews-1.html").exists());
    assert!(!item.join("reviews-done.txt").exists());

    {
        let ledger = SqliteLedger::new(&config.ledger_path()).unwrap();
        let checkpoint = ledger.load_checkpoint("app-10").unwrap().unwrap();
        assert_eq!(checkpoint.cursor, "A");
        assert_eq!(checkpoint.page_index, 2);
        assert_eq!(checkpoint.error_count, 2);
        assert!(checkpoint.last_error.is_some());

        let run = ledger.get_latest_run(RunKind::Reviews).unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Partial);
    }

    // The remote recovers
    server.reset().await;
    mount_review(&server, "10", "A", review_page("B")).await;
    mount_review(&server, "10", "B", TERMINAL_PAGE.to_string()).await;

    let summary = crawl_reviews(&config).await.unwrap();
    assert_eq!(summary.resumed, 1);
    assert_eq!(summary.completed, 1);

    let cursors: Vec<String> = requests_to(&server, "/appreviews/10")
        .await
        .iter()
        .map(|r| query_value(r, "cursor").unwrap())
        .collect();
    assert_eq!(cursors, vec!["A", "B"]);

    assert_eq!(
        std::fs::read_to_string(item.join("reviews-1.html")).unwrap(),
        review_page("A")
    );
    assert_eq!(
        std::fs::read_to_string(item.join("reviews-2.html")).unwrap(),
        review_page("B")
    );
    assert!(item.join("reviews-done.txt").exists());

    let ledger = SqliteLedger::new(&config.ledger_path()).unwrap();
    assert!(ledger.load_checkpoint("app-10").unwrap().is_none());
}

#[tokio::test]
async fn test_archive_mode_end_to_end() {
    let server = MockServer::start().await;
    let dir = tempdir().unwrap();
    let mut config = create_test_config(&server, dir.path());
    config.reviews.archive = true;
    config.reviews.language = Some("german".to_string());
    write_items(
        &config,
        &[CatalogItem::new(ItemKind::Primary, "10", "Counter-Strike")],
    );

    mount_review(&server, "10", "*", review_page("A")).await;
    mount_review(&server, "10", "A", review_page("B")).await;
    mount_review(&server, "10", "B", TERMINAL_PAGE.to_string()).await;

    crawl_reviews(&config).await.unwrap();

    let item = item_dir(dir.path(), "german/app-10");
    assert!(!item.join("reviews-1.html").exists());
    assert!(!item.join("reviews-done.txt").exists());

    let members = read_archive(&item.join("reviews.zip")).unwrap();
    assert_eq!(
        members,
        vec![
            ("reviews-1.html".to_string(), review_page("A").into_bytes()),
            ("reviews-2.html".to_string(), review_page("B").into_bytes()),
        ]
    );

    let first = &requests_to(&server, "/appreviews/10").await[0];
    assert_eq!(query_value(first, "language").as_deref(), Some("german"));

    // Archived items count as complete
    crawl_reviews(&config).await.unwrap();
    assert_eq!(requests_to(&server, "/appreviews/10").await.len(), 3);

    let table = dir.path().join("reviews.csv");
    let extraction =
        extract_reviews(&dir.path().join("pages").join("reviews"), &table, 2024).unwrap();
    assert_eq!(extraction.items, 1);
    assert_eq!(extraction.reviews, 2);
}

#[tokio::test]
async fn test_fetch_pauses_after_each_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ok"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&server)
        .await;

    let pause = Duration::from_millis(100);
    let fetcher = Fetcher::new(reqwest::Client::new(), 1, pause);
    let url = Url::parse(&format!("{}/ok", server.uri())).unwrap();

    let started = Instant::now();
    for _ in 0..3 {
        fetcher.fetch(&url).await.unwrap();
    }
    assert!(started.elapsed() >= pause * 3);
}

#[tokio::test]
async fn test_review_error_backs_off_before_retrying() {
    let server = MockServer::start().await;
    let dir = tempdir().unwrap();
    let mut config = create_test_config(&server, dir.path());
    config.http.pause_secs = 0.1;
    write_items(
        &config,
        &[CatalogItem::new(ItemKind::Primary, "10", "Counter-Strike")],
    );

    Mock::given(method("GET"))
        .and(path("/appreviews/10"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    // Two errors exhaust the budget; only the first is followed by a backoff
    let started = Instant::now();
    let summary = crawl_reviews(&config).await.unwrap();
    let elapsed = started.elapsed();

    assert_eq!(summary.aborted, 1);
    assert_eq!(requests_to(&server, "/appreviews/10").await.len(), 2);
    assert!(elapsed >= config.http.pause().mul_f64(config.reviews.error_backoff_factor));
}

#[tokio::test]
async fn test_listing_failure_backs_off_before_retrying() {
    let server = MockServer::start().await;
    let dir = tempdir().unwrap();
    let mut config = create_test_config(&server, dir.path());
    config.http.pause_secs = 0.05;
    config.listing.max_retries = 1;
    config.listing.max_page_failures = 2;

    Mock::given(method("GET"))
        .and(path("/search/results"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let started = Instant::now();
    let result = crawl_listing(&config).await;
    let elapsed = started.elapsed();

    assert!(matches!(result, Err(HarvestError::ListingStalled { .. })));
    assert_eq!(requests_to(&server, "/search/results").await.len(), 2);
    assert!(elapsed >= config.http.pause().mul_f64(config.listing.failure_backoff_factor));
}

#[tokio::test]
async fn test_malformed_review_payload_is_retried_not_saved() {
    let server = MockServer::start().await;
    let dir = tempdir().unwrap();
    let config = create_test_config(&server, dir.path());
    write_items(
        &config,
        &[CatalogItem::new(ItemKind::Primary, "10", "Counter-Strike")],
    );

    Mock::given(method("GET"))
        .and(path("/appreviews/10"))
        .and(query_param("cursor", "*"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    mount_review(&server, "10", "*", review_page("A")).await;
    mount_review(&server, "10", "A", TERMINAL_PAGE.to_string()).await;

    let summary = crawl_reviews(&config).await.unwrap();
    assert_eq!(summary.completed, 1);
    assert_eq!(summary.pages, 1);

    let cursors: Vec<String> = requests_to(&server, "/appreviews/10")
        .await
        .iter()
        .map(|r| query_value(r, "cursor").unwrap())
        .collect();
    assert_eq!(cursors, vec!["*", "*", "A"]);

    let item = item_dir(dir.path(), "app-10");
    assert_eq!(
        std::fs::read_to_string(item.join("reviews-1.html")).unwrap(),
        review_page("A")
    );
    assert!(!item.join("reviews-2.html").exists());
    assert!(item.join("reviews-done.txt").exists());
}

#[tokio::test]
async fn test_repeated_review_cursor_ends_stream() {
    let server = MockServer::start().await;
    let dir = tempdir().unwrap();
    let config = create_test_config(&server, dir.path());
    write_items(
        &config,
        &[CatalogItem::new(ItemKind::Primary, "10", "Counter-Strike")],
    );

    mount_review(&server, "10", "*", review_page("A")).await;
    mount_review(&server, "10", "A", review_page("A")).await;

    let summary = crawl_reviews(&config).await.unwrap();
    assert_eq!(summary.completed, 1);
    assert_eq!(summary.pages, 2);

    let cursors: Vec<String> = requests_to(&server, "/appreviews/10")
        .await
        .iter()
        .map(|r| query_value(r, "cursor").unwrap())
        .collect();
    assert_eq!(cursors, vec!["*", "A"]);

    let item = item_dir(dir.path(), "app-10");
    assert!(item.join("reviews-2.html").exists());
    assert!(item.join("reviews-done.txt").exists());
}
