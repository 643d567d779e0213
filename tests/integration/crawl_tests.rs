//! Integration tests for the crawler
//!
//! These tests use wiremock to serve a small site and run full scans against
//! it with the static HTML driver.

use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;
use tapmap::config::{Config, CustomTagConfig, ScanRequest};
use tapmap::crawler::{
    create_scan, run_scan, CancelHandle, CrawlEnvironment, ScanOutcome, CANCELLED_NOTE,
};
use tapmap::governor::StaticResolver;
use tapmap::state::{ConsentAction, ElementType, PageOutcome, ScanStatus};
use tapmap::storage::{lock, open_storage, shared, PageVisit, Storage};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a crawl environment over a temporary database
///
/// Mock servers listen on loopback, so the resolver reports 127.0.0.1 as a
/// public address to get past the safety check.
fn create_test_env(dir: &TempDir) -> (Config, CrawlEnvironment) {
    let mut config = Config::default();
    config.browser.static_html = true;
    config.browser.navigation_timeout_ms = 5_000;
    config.output.database_path = dir.path().join("tapmap.db").to_string_lossy().to_string();

    let storage = shared(open_storage(Path::new(&config.output.database_path)).unwrap());
    let public: IpAddr = "93.184.216.34".parse().unwrap();
    let env = CrawlEnvironment::new(config.clone(), storage)
        .unwrap()
        .with_resolver(Arc::new(StaticResolver::new().with_host("127.0.0.1", public)));

    (config, env)
}

fn request(seed: &str, max_pages: u32, max_depth: u32) -> ScanRequest {
    ScanRequest {
        seed_url: seed.to_string(),
        max_pages: Some(max_pages),
        max_depth: Some(max_depth),
        rate_limit: Some(5.0),
        timeout_seconds: Some(60),
        custom_tag: None,
    }
}

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(
        format!("<html><head><title>Test</title></head><body>{}</body></html>", body),
        "text/html; charset=utf-8",
    )
}

async fn mount_page(server: &MockServer, page: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(page))
        .respond_with(html(body))
        .mount(server)
        .await;
}

async fn mount_robots(server: &MockServer, status: u16, body: &str) {
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .mount(server)
        .await;
}

async fn run(
    config: &Config,
    env: &CrawlEnvironment,
    request: &ScanRequest,
    cancel: CancelHandle,
) -> (ScanOutcome, Vec<PageVisit>) {
    let scan = create_scan(&env.storage, config, request).unwrap();
    let outcome = run_scan(env.clone(), scan, cancel).await.unwrap();
    let visits = lock(&env.storage)
        .unwrap()
        .get_page_visits(&outcome.scan_id)
        .unwrap();
    (outcome, visits)
}

fn paths(visits: &[PageVisit]) -> Vec<String> {
    visits
        .iter()
        .map(|v| url::Url::parse(&v.url).unwrap().path().to_string())
        .collect()
}

#[tokio::test]
async fn test_depth_bound_over_link_chain() {
    let server = MockServer::start().await;
    mount_robots(&server, 404, "").await;
    mount_page(&server, "/", r#"<a href="/one">One</a>"#).await;
    mount_page(&server, "/one", r#"<a href="/two">Two</a>"#).await;
    mount_page(&server, "/two", r#"<a href="/three">Three</a>"#).await;
    mount_page(&server, "/three", r#"<a href="/four">Four</a>"#).await;

    let dir = TempDir::new().unwrap();
    let (config, env) = create_test_env(&dir);
    let seed = format!("{}/", server.uri());
    let (outcome, visits) = run(&config, &env, &request(&seed, 50, 2), CancelHandle::new()).await;

    assert_eq!(outcome.status, ScanStatus::Completed);
    assert_eq!(paths(&visits), vec!["/", "/one", "/two"]);
    assert_eq!(visits.iter().map(|v| v.depth).collect::<Vec<_>>(), vec![0, 1, 2]);
    assert!(visits.iter().all(|v| v.outcome == PageOutcome::Fetched));
}

#[tokio::test]
async fn test_off_domain_links_not_followed() {
    let server = MockServer::start().await;
    mount_robots(&server, 404, "").await;
    mount_page(
        &server,
        "/",
        r#"<a href="/about">About</a>
           <a href="https://partner.example/offer">Partner offer</a>
           <a href="mailto:info@brand.example">Email us</a>"#,
    )
    .await;
    mount_page(&server, "/about", "<p>About us</p>").await;

    let dir = TempDir::new().unwrap();
    let (config, env) = create_test_env(&dir);
    let seed = format!("{}/", server.uri());
    let (outcome, visits) = run(&config, &env, &request(&seed, 50, 3), CancelHandle::new()).await;

    assert_eq!(outcome.status, ScanStatus::Completed);
    assert_eq!(paths(&visits), vec!["/", "/about"]);
    assert!(visits.iter().all(|v| v.url.starts_with(&server.uri())));

    let elements = lock(&env.storage).unwrap().get_elements(&outcome.scan_id).unwrap();
    let partner = elements
        .iter()
        .find(|e| e.element_text == "Partner offer")
        .expect("partner link recorded");
    assert!(partner.is_external);
    assert_eq!(partner.element_type, ElementType::Link);

    let about = elements.iter().find(|e| e.element_text == "About").unwrap();
    assert!(!about.is_external);
}

#[tokio::test]
async fn test_seed_server_error_fails_scan() {
    let server = MockServer::start().await;
    mount_robots(&server, 404, "").await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let (config, env) = create_test_env(&dir);
    let seed = format!("{}/", server.uri());
    let (outcome, visits) = run(&config, &env, &request(&seed, 50, 3), CancelHandle::new()).await;

    assert_eq!(outcome.status, ScanStatus::Failed);
    assert_eq!(visits.len(), 1);
    assert_eq!(visits[0].outcome, PageOutcome::HttpError);
    assert_eq!(visits[0].http_status, Some(500));

    let scan = lock(&env.storage).unwrap().get_scan(&outcome.scan_id).unwrap();
    assert_eq!(scan.status, ScanStatus::Failed);
    assert_eq!(scan.pages_scanned, 1);
    assert!(scan.completed_at.is_some());
}

#[tokio::test]
async fn test_non_seed_not_found_continues() {
    let server = MockServer::start().await;
    mount_robots(&server, 404, "").await;
    mount_page(&server, "/", r#"<a href="/gone">Gone</a><a href="/here">Here</a>"#).await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    mount_page(&server, "/here", "<button>Go</button>").await;

    let dir = TempDir::new().unwrap();
    let (config, env) = create_test_env(&dir);
    let seed = format!("{}/", server.uri());
    let (outcome, visits) = run(&config, &env, &request(&seed, 50, 3), CancelHandle::new()).await;

    assert_eq!(outcome.status, ScanStatus::Completed);
    assert_eq!(paths(&visits), vec!["/", "/gone", "/here"]);
    assert_eq!(visits[1].outcome, PageOutcome::HttpError);
    assert_eq!(visits[1].http_status, Some(404));
    assert_eq!(visits[2].outcome, PageOutcome::Fetched);
    assert_eq!(outcome.pages_scanned, 3);
}

#[tokio::test]
async fn test_robots_denied_seed_has_no_visits() {
    let server = MockServer::start().await;
    mount_robots(&server, 200, "User-agent: *\nDisallow: /\n").await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(r#"<a href="/x">X</a>"#))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let (config, env) = create_test_env(&dir);
    let seed = format!("{}/", server.uri());
    let (outcome, visits) = run(&config, &env, &request(&seed, 50, 3), CancelHandle::new()).await;

    assert_eq!(outcome.status, ScanStatus::Failed);
    assert!(visits.is_empty());
    assert!(outcome.notes.unwrap().contains("robots.txt"));

    let scan = lock(&env.storage).unwrap().get_scan(&outcome.scan_id).unwrap();
    assert_eq!(scan.findings.robots_txt_found, Some(true));
}

#[tokio::test]
async fn test_robots_denied_link_is_recorded_not_fetched() {
    let server = MockServer::start().await;
    mount_robots(&server, 200, "User-agent: TapMap\nDisallow: /private\n").await;
    mount_page(
        &server,
        "/",
        r#"<a href="/private/area">Private</a><a href="/public">Public</a>"#,
    )
    .await;
    mount_page(&server, "/public", "<p>Open</p>").await;
    Mock::given(method("GET"))
        .and(path("/private/area"))
        .respond_with(html("secret"))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let (config, env) = create_test_env(&dir);
    let seed = format!("{}/", server.uri());
    let (outcome, visits) = run(&config, &env, &request(&seed, 50, 3), CancelHandle::new()).await;

    assert_eq!(outcome.status, ScanStatus::Completed);
    assert_eq!(paths(&visits), vec!["/", "/private/area", "/public"]);

    let denied = &visits[1];
    assert_eq!(denied.outcome, PageOutcome::RobotsDenied);
    assert!(!denied.robots_allowed);
    assert_eq!(outcome.pages_scanned, 2);
}

#[tokio::test]
async fn test_page_budget_limits_fetches() {
    let server = MockServer::start().await;
    mount_robots(&server, 404, "").await;
    let links: String = (1..=6)
        .map(|n| format!(r#"<a href="/p{}">P{}</a>"#, n, n))
        .collect();
    mount_page(&server, "/", &links).await;
    for n in 1..=6 {
        mount_page(&server, &format!("/p{}", n), "<p>leaf</p>").await;
    }

    let dir = TempDir::new().unwrap();
    let (config, env) = create_test_env(&dir);
    let seed = format!("{}/", server.uri());
    let (outcome, visits) = run(&config, &env, &request(&seed, 3, 3), CancelHandle::new()).await;

    assert_eq!(outcome.status, ScanStatus::Completed);
    assert_eq!(outcome.pages_scanned, 3);
    assert_eq!(paths(&visits), vec!["/", "/p1", "/p2"]);

    let scan = lock(&env.storage).unwrap().get_scan(&outcome.scan_id).unwrap();
    assert_eq!(scan.pages_scanned, 3);
    assert_eq!(scan.total_pages, 7);
}

#[tokio::test]
async fn test_single_page_budget_visits_only_seed() {
    let server = MockServer::start().await;
    mount_robots(&server, 404, "").await;
    mount_page(&server, "/", r#"<a href="/a">A</a><a href="/b">B</a>"#).await;
    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(html("<p>A</p>"))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let (config, env) = create_test_env(&dir);
    let seed = format!("{}/", server.uri());
    let (outcome, visits) = run(&config, &env, &request(&seed, 1, 3), CancelHandle::new()).await;

    assert_eq!(outcome.status, ScanStatus::Completed);
    assert_eq!(outcome.pages_scanned, 1);
    assert_eq!(visits.len(), 1);
    assert_eq!(visits[0].outcome, PageOutcome::Fetched);
}

#[tokio::test]
async fn test_denied_links_do_not_consume_budget() {
    let server = MockServer::start().await;
    mount_robots(&server, 200, "User-agent: *\nDisallow: /private\n").await;
    mount_page(
        &server,
        "/",
        r#"<a href="/private/a">A</a><a href="/private/b">B</a><a href="/open">Open</a>"#,
    )
    .await;
    mount_page(&server, "/open", "<p>Open</p>").await;

    let dir = TempDir::new().unwrap();
    let (config, env) = create_test_env(&dir);
    let seed = format!("{}/", server.uri());
    let (outcome, visits) = run(&config, &env, &request(&seed, 3, 3), CancelHandle::new()).await;

    assert_eq!(outcome.status, ScanStatus::Completed);
    assert_eq!(paths(&visits), vec!["/", "/private/a", "/private/b", "/open"]);
    assert_eq!(visits[1].outcome, PageOutcome::RobotsDenied);
    assert_eq!(visits[2].outcome, PageOutcome::RobotsDenied);
    assert_eq!(visits[3].outcome, PageOutcome::Fetched);
    assert_eq!(outcome.pages_scanned, 2);
}

#[tokio::test]
async fn test_redirect_to_internal_host_is_not_followed() {
    let server = MockServer::start().await;
    let internal = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(html("metadata"))
        .expect(0)
        .mount(&internal)
        .await;

    let internal_url = format!("http://localhost:{}/secret", internal.address().port());
    mount_robots(&server, 404, "").await;
    mount_page(&server, "/", r#"<a href="/go">Go</a>"#).await;
    Mock::given(method("GET"))
        .and(path("/go"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", internal_url.as_str()))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let (config, env) = create_test_env(&dir);
    let seed = format!("{}/", server.uri());
    let (outcome, visits) = run(&config, &env, &request(&seed, 10, 3), CancelHandle::new()).await;

    assert_eq!(outcome.status, ScanStatus::Completed);
    assert_eq!(paths(&visits), vec!["/", "/go"]);
    assert_eq!(visits[1].outcome, PageOutcome::UnsafeRedirect);
    assert_eq!(visits[1].element_count, 0);
    assert_eq!(outcome.pages_scanned, 2);
}

#[tokio::test]
async fn test_undismissable_consent_banner_is_recorded() {
    let server = MockServer::start().await;
    mount_robots(&server, 404, "").await;
    mount_page(
        &server,
        "/",
        r#"<div id="onetrust-banner-sdk"><p>We use cookies</p></div>
           <a href="/next">Next</a>"#,
    )
    .await;
    mount_page(&server, "/next", "<p>Second page</p>").await;

    let dir = TempDir::new().unwrap();
    let (config, env) = create_test_env(&dir);
    let seed = format!("{}/", server.uri());
    let (outcome, visits) = run(&config, &env, &request(&seed, 10, 3), CancelHandle::new()).await;

    assert_eq!(outcome.status, ScanStatus::Completed);
    assert_eq!(paths(&visits), vec!["/", "/next"]);

    let consent = &visits[0].consent;
    assert!(consent.detected);
    assert_eq!(consent.framework.as_deref(), Some("OneTrust"));
    assert_eq!(consent.action, ConsentAction::Failed);
    assert_eq!(visits[1].outcome, PageOutcome::Fetched);

    let scan = lock(&env.storage).unwrap().get_scan(&outcome.scan_id).unwrap();
    assert_eq!(scan.findings.consent_framework.as_deref(), Some("OneTrust"));
}

#[tokio::test]
async fn test_cancel_before_start_records_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(html(""))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let (config, env) = create_test_env(&dir);
    let cancel = CancelHandle::new();
    cancel.cancel();
    let seed = format!("{}/", server.uri());
    let (outcome, visits) = run(&config, &env, &request(&seed, 50, 3), cancel).await;

    assert_eq!(outcome.status, ScanStatus::Completed);
    assert_eq!(outcome.notes.as_deref(), Some(CANCELLED_NOTE));
    assert!(visits.is_empty());
}

#[tokio::test]
async fn test_elements_are_classified_and_tagged() {
    let server = MockServer::start().await;
    mount_robots(&server, 404, "").await;
    mount_page(
        &server,
        "/",
        r#"<nav><a href="/pi.pdf">Prescribing Information</a></nav>
           <main><h2>Safety</h2><a href="/isi">Important Safety Information</a>
           <form action="/enroll"><input type="email" placeholder="Email"><button>Enroll</button></form></main>"#,
    )
    .await;

    let dir = TempDir::new().unwrap();
    let (config, env) = create_test_env(&dir);
    let seed = format!("{}/", server.uri());
    let (outcome, _) = run(&config, &env, &request(&seed, 1, 1), CancelHandle::new()).await;
    assert_eq!(outcome.pages_scanned, 1);

    let elements = lock(&env.storage).unwrap().get_elements(&outcome.scan_id).unwrap();
    let isi = elements
        .iter()
        .find(|e| e.element_text == "Important Safety Information")
        .unwrap();
    assert_eq!(isi.pharma_context.as_deref(), Some("isi"));
    assert_eq!(isi.container_context, "main");
    assert_eq!(isi.fingerprint.len(), 32);

    let pi = elements
        .iter()
        .find(|e| e.element_text == "Prescribing Information")
        .unwrap();
    assert_eq!(pi.element_type, ElementType::Download);
    assert_eq!(pi.container_context, "nav");

    assert!(elements.iter().any(|e| e.element_type == ElementType::Form));
    assert!(elements.iter().all(|e| e.page_url == seed));
}

#[tokio::test]
async fn test_custom_tag_replaces_default_taxonomy() {
    let server = MockServer::start().await;
    mount_robots(&server, 404, "").await;
    mount_page(
        &server,
        "/",
        r#"<a href="/trial">Join the Oncology trial</a><a href="/isi">Important Safety Information</a>"#,
    )
    .await;

    let dir = TempDir::new().unwrap();
    let (config, env) = create_test_env(&dir);
    let mut req = request(&format!("{}/", server.uri()), 1, 1);
    req.custom_tag = Some(CustomTagConfig {
        name: "Oncology".to_string(),
        keywords: vec!["trial".to_string()],
    });
    let (outcome, _) = run(&config, &env, &req, CancelHandle::new()).await;

    let elements = lock(&env.storage).unwrap().get_elements(&outcome.scan_id).unwrap();
    let trial = elements
        .iter()
        .find(|e| e.element_text == "Join the Oncology trial")
        .unwrap();
    assert_eq!(trial.pharma_context.as_deref(), Some("Oncology:trial"));

    let isi = elements
        .iter()
        .find(|e| e.element_text == "Important Safety Information")
        .unwrap();
    assert_eq!(isi.pharma_context, None);
}
