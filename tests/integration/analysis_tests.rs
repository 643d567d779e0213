//! Integration tests for the analysis views and tier enrichment
//!
//! Scans run against wiremock sites with the static HTML driver; dedup,
//! diff, summary and classification then read the stored results.

use async_trait::async_trait;
use std::collections::HashSet;
use std::net::IpAddr;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tapmap::analysis::{dedup_scan, diff_scans, regroup, summarize_scan};
use tapmap::classify::{ClassificationError, Enricher, TierAssignment, TierClassifier};
use tapmap::config::{Config, ScanRequest};
use tapmap::crawler::{create_scan, run_scan, CancelHandle, CrawlEnvironment};
use tapmap::governor::StaticResolver;
use tapmap::state::{ElementType, ScanStatus, TierSource, ValueTier};
use tapmap::storage::{lock, open_storage, shared, ElementRecord, Storage};
use tapmap::TapmapError;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const NAV: &str = r#"<nav><a href="/">Home</a><a href="/about">About</a></nav>"#;

fn create_test_env(dir: &TempDir) -> (Config, CrawlEnvironment) {
    let mut config = Config::default();
    config.browser.static_html = true;
    config.output.database_path = dir.path().join("tapmap.db").to_string_lossy().to_string();

    let storage = shared(open_storage(Path::new(&config.output.database_path)).unwrap());
    let public: IpAddr = "93.184.216.34".parse().unwrap();
    let env = CrawlEnvironment::new(config.clone(), storage)
        .unwrap()
        .with_resolver(Arc::new(StaticResolver::new().with_host("127.0.0.1", public)));

    (config, env)
}

/// Serves a two-page site whose pages share a navigation bar
async fn site(home_main: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    for (page, main) in [("/", home_main), ("/about", "<main><p>About the brand</p></main>")] {
        let body = format!("<html><body>{}{}</body></html>", NAV, main);
        Mock::given(method("GET"))
            .and(path(page))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/html"))
            .mount(&server)
            .await;
    }

    server
}

async fn scan_site(config: &Config, env: &CrawlEnvironment, server: &MockServer) -> String {
    let request = ScanRequest {
        seed_url: format!("{}/", server.uri()),
        max_pages: Some(10),
        max_depth: Some(2),
        rate_limit: Some(5.0),
        timeout_seconds: Some(60),
        custom_tag: None,
    };
    let scan = create_scan(&env.storage, config, &request).unwrap();
    let outcome = run_scan(env.clone(), scan, CancelHandle::new()).await.unwrap();
    assert_eq!(outcome.status, ScanStatus::Completed);
    outcome.scan_id
}

fn texts(records: &[ElementRecord]) -> HashSet<String> {
    records.iter().map(|r| r.element_text.clone()).collect()
}

fn fingerprints(records: &[ElementRecord]) -> HashSet<String> {
    records.iter().map(|r| r.fingerprint.clone()).collect()
}

#[tokio::test]
async fn test_dedup_collapses_shared_navigation() {
    let server = site(r#"<main><a href="/isi">Important Safety Information</a></main>"#).await;
    let dir = TempDir::new().unwrap();
    let (config, env) = create_test_env(&dir);
    let scan_id = scan_site(&config, &env, &server).await;

    let storage = lock(&env.storage).unwrap();
    let groups = dedup_scan(&*storage, &scan_id).unwrap();

    let home = groups
        .iter()
        .find(|g| g.representative.element_text == "Home")
        .unwrap();
    assert_eq!(home.page_count, 2);
    assert_eq!(home.page_urls[0], format!("{}/", server.uri()));

    let isi = groups
        .iter()
        .find(|g| g.representative.element_text == "Important Safety Information")
        .unwrap();
    assert_eq!(isi.page_count, 1);

    assert_eq!(regroup(&groups), groups);
    assert!(groups.len() < storage.get_elements(&scan_id).unwrap().len());
}

#[tokio::test]
async fn test_diff_between_scans_is_symmetric() {
    let before = site(r#"<main><a href="/old">Old offer</a><button>Sign up</button></main>"#).await;
    let after = site(r#"<main><a href="/new">New offer</a><button>Sign up</button></main>"#).await;

    let dir = TempDir::new().unwrap();
    let (config, env) = create_test_env(&dir);
    let scan_a = scan_site(&config, &env, &before).await;
    let scan_b = scan_site(&config, &env, &after).await;

    let storage = lock(&env.storage).unwrap();
    let forward = diff_scans(&*storage, &scan_a, &scan_b).unwrap();
    let backward = diff_scans(&*storage, &scan_b, &scan_a).unwrap();

    assert_eq!(texts(&forward.added), HashSet::from(["New offer".to_string()]));
    assert_eq!(texts(&forward.removed), HashSet::from(["Old offer".to_string()]));
    assert!(texts(&forward.unchanged).contains("Sign up"));
    assert!(texts(&forward.unchanged).contains("Home"));

    assert_eq!(fingerprints(&forward.added), fingerprints(&backward.removed));
    assert_eq!(fingerprints(&forward.removed), fingerprints(&backward.added));
    assert_eq!(fingerprints(&forward.unchanged), fingerprints(&backward.unchanged));
    assert_eq!(forward.summary.unchanged, backward.summary.unchanged);
}

#[tokio::test]
async fn test_rescan_of_unchanged_site_has_empty_diff() {
    let server = site(r#"<main><a href="/isi">Important Safety Information</a><button>Sign up</button></main>"#).await;
    let dir = TempDir::new().unwrap();
    let (config, env) = create_test_env(&dir);
    let scan_a = scan_site(&config, &env, &server).await;
    let scan_b = scan_site(&config, &env, &server).await;
    assert_ne!(scan_a, scan_b);

    let storage = lock(&env.storage).unwrap();
    let groups = dedup_scan(&*storage, &scan_a).unwrap();
    let diff = diff_scans(&*storage, &scan_a, &scan_b).unwrap();

    assert!(diff.added.is_empty());
    assert!(diff.removed.is_empty());
    assert_eq!(diff.summary.added, 0);
    assert_eq!(diff.summary.removed, 0);
    assert_eq!(diff.summary.unchanged, groups.len());
    assert_eq!(diff.unchanged.len(), groups.len());
}

#[tokio::test]
async fn test_diff_rejects_unknown_scan() {
    let server = site("<main></main>").await;
    let dir = TempDir::new().unwrap();
    let (config, env) = create_test_env(&dir);
    let scan_id = scan_site(&config, &env, &server).await;

    let storage = lock(&env.storage).unwrap();
    let result = diff_scans(&*storage, &scan_id, "19700101_000000_nowhere");
    assert!(matches!(result, Err(TapmapError::ScanNotFound(_))));
}

#[tokio::test]
async fn test_summary_counts_types_and_tags() {
    let server = site(
        r#"<main><a href="/isi">Important Safety Information</a>
           <a href="/report">Report a side effect</a><button>Sign up</button></main>"#,
    )
    .await;
    let dir = TempDir::new().unwrap();
    let (config, env) = create_test_env(&dir);
    let scan_id = scan_site(&config, &env, &server).await;

    let summary = summarize_scan(&*lock(&env.storage).unwrap(), &scan_id).unwrap();

    assert_eq!(summary.tag_name, "Pharma");
    assert_eq!(summary.by_tag_category.get("isi"), Some(&1));
    assert_eq!(summary.by_tag_category.get("adverse_event"), Some(&1));
    assert_eq!(summary.tagged, 2);
    assert!(summary.by_type[&ElementType::Link] >= 4);
    assert_eq!(summary.tiers.untiered as usize, summary.total_elements);
    assert!(summary.unique_interactions < summary.total_elements);
}

/// Tiers every element by its type: buttons HVA, everything else LVA
struct TypeClassifier;

#[async_trait]
impl TierClassifier for TypeClassifier {
    async fn classify(&self, batch: &[ElementRecord]) -> Result<Vec<TierAssignment>, ClassificationError> {
        Ok(batch
            .iter()
            .filter_map(|record| {
                let tier = if record.element_type == ElementType::Button {
                    ValueTier::Hva
                } else {
                    ValueTier::Lva
                };
                record.id.map(|element_id| TierAssignment {
                    element_id,
                    tier,
                    reason: format!("{} element", record.element_type),
                })
            })
            .collect())
    }
}

#[tokio::test]
async fn test_enrichment_respects_manual_override() {
    let server = site(r#"<main><a href="/isi">Important Safety Information</a><button>Sign up</button></main>"#).await;
    let dir = TempDir::new().unwrap();
    let (config, env) = create_test_env(&dir);
    let scan_id = scan_site(&config, &env, &server).await;

    let isi_id = {
        let storage = lock(&env.storage).unwrap();
        storage
            .get_elements(&scan_id)
            .unwrap()
            .into_iter()
            .find(|e| e.element_text == "Important Safety Information")
            .and_then(|e| e.id)
            .unwrap()
    };

    let enricher = Enricher::new(env.storage.clone(), Arc::new(TypeClassifier), 2);
    enricher
        .override_tier(&scan_id, isi_id, ValueTier::Hva, "Core safety content")
        .unwrap();

    let started = enricher.start(&scan_id).unwrap();
    assert!(started.is_running);
    let again = enricher.start(&scan_id).unwrap();
    assert!(again.total >= started.total);

    let status = enricher.wait(&scan_id).await.unwrap();
    assert!(!status.is_running);
    assert_eq!(status.classified, status.total);
    assert_eq!(status.progress, 100.0);

    let storage = lock(&env.storage).unwrap();
    let isi = storage.get_element(&scan_id, isi_id).unwrap();
    assert_eq!(isi.value_tier, Some(ValueTier::Hva));
    assert_eq!(isi.tier_source, Some(TierSource::Manual));
    assert_eq!(isi.value_reason.as_deref(), Some("Core safety content"));

    let elements = storage.get_elements(&scan_id).unwrap();
    let button = elements.iter().find(|e| e.element_type == ElementType::Button).unwrap();
    assert_eq!(button.value_tier, Some(ValueTier::Hva));
    assert_eq!(button.tier_source, Some(TierSource::Model));
    assert!(elements
        .iter()
        .filter(|e| e.id != Some(isi_id) && e.element_type == ElementType::Link)
        .all(|e| e.value_tier == Some(ValueTier::Lva)));
}

/// Tiers everything LVA and records which elements each call was offered
#[derive(Default)]
struct CountingClassifier {
    calls: AtomicUsize,
    offered: Mutex<Vec<i64>>,
}

#[async_trait]
impl TierClassifier for CountingClassifier {
    async fn classify(&self, batch: &[ElementRecord]) -> Result<Vec<TierAssignment>, ClassificationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let ids: Vec<i64> = batch.iter().filter_map(|record| record.id).collect();
        self.offered.lock().unwrap().extend(ids.iter().copied());
        Ok(ids
            .into_iter()
            .map(|element_id| TierAssignment {
                element_id,
                tier: ValueTier::Lva,
                reason: "counted".to_string(),
            })
            .collect())
    }
}

#[tokio::test]
async fn test_second_start_joins_running_job() {
    let server = site(
        r#"<main><a href="/isi">Important Safety Information</a>
           <a href="/report">Report a side effect</a><button>Sign up</button></main>"#,
    )
    .await;
    let dir = TempDir::new().unwrap();
    let (config, env) = create_test_env(&dir);
    let scan_id = scan_site(&config, &env, &server).await;
    let untiered = lock(&env.storage).unwrap().get_elements(&scan_id).unwrap().len();
    assert!(untiered > 2);

    let classifier = Arc::new(CountingClassifier::default());
    let enricher = Enricher::new(env.storage.clone(), classifier.clone(), 2);

    let first = enricher.start(&scan_id).unwrap();
    let second = enricher.start(&scan_id).unwrap();
    assert!(first.is_running);
    assert!(second.is_running);

    let status = enricher.wait(&scan_id).await.unwrap();
    assert!(!status.is_running);
    assert_eq!(status.classified, status.total);

    // One pass over the scan: each element offered once, in batches of two
    let mut offered = classifier.offered.lock().unwrap().clone();
    assert_eq!(offered.len(), untiered);
    offered.sort_unstable();
    offered.dedup();
    assert_eq!(offered.len(), untiered);
    assert_eq!(classifier.calls.load(Ordering::SeqCst), (untiered + 1) / 2);
}
