//! Crawler module for scan scheduling and execution
//!
//! This module contains the core crawling logic, including:
//! - Scan creation with unique, time-based IDs
//! - The breadth-first frontier
//! - Link discovery on captured pages
//! - The per-scan coordinator loop and its cancellation handle

mod coordinator;
mod frontier;
mod links;

pub use coordinator::{CancelHandle, Coordinator, CrawlEnvironment, ScanOutcome, CANCELLED_NOTE};
pub use frontier::{Frontier, PushRejection, QueuedUrl};
pub use links::{crawlable_links, extract_links, resolve_link};

use crate::browser::{launch_driver, BrowserDriver, SessionRunner, SessionSettings};
use crate::config::{resolve_scan_request, Config, ScanRequest};
use crate::state::ScanStatus;
use crate::storage::{lock, ScanFindings, ScanJob, SharedStorage, Storage};
use crate::url::extract_domain;
use crate::{TapmapError, UrlError};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Builds a scan ID from the seed domain and creation time
///
/// The format is `YYYYmmdd_HHMMSS_domain` with dots and colons in the
/// domain replaced by underscores.
pub fn generate_scan_id(domain: &str, at: DateTime<Utc>) -> String {
    format!(
        "{}_{}",
        at.format("%Y%m%d_%H%M%S"),
        domain.replace(['.', ':'], "_")
    )
}

/// Validates a scan request and persists it as a pending scan
///
/// When the generated ID is taken (two scans of one domain within the same
/// second) a numeric suffix is appended.
///
/// # Arguments
///
/// * `storage` - Where the scan is recorded
/// * `config` - Provides bounds and defaults for the request
/// * `request` - The scan as requested
///
/// # Returns
///
/// * `Ok(ScanJob)` - The stored pending scan
/// * `Err(TapmapError)` - The request was invalid or storage failed
pub fn create_scan(
    storage: &SharedStorage,
    config: &Config,
    request: &ScanRequest,
) -> Result<ScanJob, TapmapError> {
    let (seed, scan_config) = resolve_scan_request(request, config)?;
    let domain = extract_domain(&seed).ok_or(UrlError::MissingDomain)?;

    let now = Utc::now();
    let base_id = generate_scan_id(&domain, now);

    let mut storage = lock(storage)?;
    let mut scan_id = base_id.clone();
    let mut suffix = 1;
    while storage.scan_exists(&scan_id)? {
        suffix += 1;
        scan_id = format!("{}_{}", base_id, suffix);
    }

    let scan = ScanJob {
        id: scan_id,
        seed_url: seed.to_string(),
        domain,
        config: scan_config,
        status: ScanStatus::Pending,
        pages_scanned: 0,
        total_pages: 0,
        created_at: now.to_rfc3339(),
        started_at: None,
        completed_at: None,
        notes: None,
        findings: ScanFindings::default(),
    };

    storage.create_scan(&scan)?;
    tracing::info!("Created scan {} for {}", scan.id, scan.seed_url);

    Ok(scan)
}

/// Runs a pending scan with the configured browser
///
/// A browser that cannot be launched fails the scan before it starts.
///
/// # Arguments
///
/// * `env` - Shared services for the scan
/// * `scan` - A pending scan created by [`create_scan`]
/// * `cancel` - Cancellation flag for this scan
///
/// # Returns
///
/// * `Ok(ScanOutcome)` - The scan reached a terminal status
/// * `Err(TapmapError)` - Storage failed
pub async fn run_scan(
    env: CrawlEnvironment,
    scan: ScanJob,
    cancel: CancelHandle,
) -> Result<ScanOutcome, TapmapError> {
    let driver = match launch_driver(&env.config.browser, Arc::clone(&env.resolver)).await {
        Ok(driver) => driver,
        Err(e) => {
            tracing::error!("Could not start a browser for scan {}: {}", scan.id, e);
            let note = format!("Browser launch failed: {}", e);
            lock(&env.storage)?.transition_scan(&scan.id, ScanStatus::Failed, Some(&note))?;
            return Ok(ScanOutcome {
                scan_id: scan.id,
                status: ScanStatus::Failed,
                pages_scanned: 0,
                elements_found: 0,
                notes: Some(note),
            });
        }
    };

    run_scan_with_driver(env, scan, driver, cancel).await
}

/// Runs a pending scan with a caller-supplied driver
pub async fn run_scan_with_driver(
    env: CrawlEnvironment,
    scan: ScanJob,
    driver: Box<dyn BrowserDriver>,
    cancel: CancelHandle,
) -> Result<ScanOutcome, TapmapError> {
    let runner = SessionRunner::new(driver, SessionSettings::from(&env.config.browser));
    let coordinator = Coordinator::new(&scan, &env, runner, cancel)?;
    coordinator.run().await
}

/// Starts a scan on its own task
///
/// # Returns
///
/// The cancel handle for the scan and the task running it
pub fn spawn_scan(
    env: CrawlEnvironment,
    scan: ScanJob,
) -> (CancelHandle, JoinHandle<Result<ScanOutcome, TapmapError>>) {
    let cancel = CancelHandle::new();
    let handle = tokio::spawn(run_scan(env, scan, cancel.clone()));
    (cancel, handle)
}
