//! Scan coordinator - the per-scan crawl loop
//!
//! One coordinator owns everything a running scan needs:
//! - The frontier of URLs still to visit
//! - The governor (robots.txt, rate, safety, deadline)
//! - The session runner wrapping the browser driver
//! - The extractor and the scan's taxonomy
//!
//! Each iteration checks cancellation and the page budget, dequeues one URL,
//! asks the governor, fetches, extracts, tags, persists, and feeds new links
//! back into the frontier.

use crate::browser::{build_http_client, PageFetch, SessionRunner};
use crate::config::{Config, ScanConfig};
use crate::crawler::frontier::{Frontier, PushRejection, QueuedUrl};
use crate::crawler::links::crawlable_links;
use crate::extract::Extractor;
use crate::governor::{
    Admission, DenyReason, Governor, GovernorSettings, HostResolver, SystemResolver,
};
use crate::state::{ConsentInfo, PageOutcome, ScanQuality, ScanStatus};
use crate::storage::{lock, ElementRecord, PageVisit, ScanFindings, ScanJob, SharedStorage, Storage};
use crate::tagger::{tag_all, Taxonomy};
use crate::url::{extract_domain, is_same_site, normalize_parsed, site_key};
use crate::TapmapError;
use chrono::Utc;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

/// Note recorded on a scan stopped by its cancel handle
pub const CANCELLED_NOTE: &str = "Cancelled by user";

/// Shared services a scan runs against
#[derive(Clone)]
pub struct CrawlEnvironment {
    pub config: Arc<Config>,
    pub storage: SharedStorage,
    /// Client for robots.txt requests
    pub client: reqwest::Client,
    pub resolver: Arc<dyn HostResolver>,
}

impl CrawlEnvironment {
    /// Builds an environment with the system resolver
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlEnvironment)` - Ready to run scans
    /// * `Err(TapmapError)` - The HTTP client could not be built
    pub fn new(config: Config, storage: SharedStorage) -> Result<Self, TapmapError> {
        let client = build_http_client(&config.browser)?;
        Ok(Self {
            config: Arc::new(config),
            storage,
            client,
            resolver: Arc::new(SystemResolver),
        })
    }

    /// Replaces the host resolver used by the safety check
    pub fn with_resolver(mut self, resolver: Arc<dyn HostResolver>) -> Self {
        self.resolver = resolver;
        self
    }
}

/// Cooperative cancellation flag for one scan
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests that the scan stop before its next admission
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Final state of a scan run
#[derive(Debug, Clone, PartialEq)]
pub struct ScanOutcome {
    pub scan_id: String,
    pub status: ScanStatus,
    pub pages_scanned: u32,
    pub elements_found: usize,
    pub notes: Option<String>,
}

/// What the loop does after one iteration
enum Step {
    Continue,
    Finish(ScanStatus, Option<String>),
}

/// Crawl loop of one scan
pub struct Coordinator {
    scan_id: String,
    seed: Url,
    config: ScanConfig,
    storage: SharedStorage,
    governor: Governor,
    runner: SessionRunner,
    extractor: Extractor,
    taxonomy: Taxonomy,
    frontier: Frontier,
    cancel: CancelHandle,
    pages_scanned: u32,
    elements_found: usize,
    consents: Vec<ConsentInfo>,
    consent_framework: Option<String>,
    analytics: BTreeSet<String>,
    started: Instant,
}

impl Coordinator {
    /// Creates a coordinator for a pending scan
    ///
    /// # Arguments
    ///
    /// * `scan` - The persisted scan; its config is already bounded
    /// * `env` - Storage, HTTP client, resolver and global config
    /// * `runner` - Session runner owning this scan's browser driver
    /// * `cancel` - Cancellation flag checked before every admission
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Ready to run
    /// * `Err(TapmapError)` - The seed URL is unusable
    pub fn new(
        scan: &ScanJob,
        env: &CrawlEnvironment,
        runner: SessionRunner,
        cancel: CancelHandle,
    ) -> Result<Self, TapmapError> {
        let seed = normalize_parsed(Url::parse(&scan.seed_url)?)?;
        let domain = extract_domain(&seed).ok_or(crate::UrlError::MissingDomain)?;

        let governor = Governor::new(
            GovernorSettings {
                rate_limit: scan.config.rate_limit,
                rate_floor: env.config.limits.rate_limit_floor,
                rate_ceiling: env.config.limits.rate_limit_ceiling,
                timeout: Duration::from_secs(scan.config.timeout_seconds),
                user_agent: env.config.browser.user_agent.clone(),
            },
            env.client.clone(),
            Arc::clone(&env.resolver),
        );

        Ok(Self {
            scan_id: scan.id.clone(),
            seed,
            config: scan.config.clone(),
            storage: Arc::clone(&env.storage),
            governor,
            runner,
            extractor: Extractor::new(domain),
            taxonomy: Taxonomy::from_config(scan.config.custom_tag.as_ref()),
            frontier: Frontier::new(env.config.limits.max_frontier_size.max(1)),
            cancel,
            pages_scanned: 0,
            elements_found: 0,
            consents: Vec::new(),
            consent_framework: None,
            analytics: BTreeSet::new(),
            started: Instant::now(),
        })
    }

    /// Runs the scan to a terminal status
    ///
    /// The scan moves to `running`, the loop runs until it finishes, and the
    /// scan is finalized with its counters and findings. A storage failure
    /// inside the loop fails the scan and is returned.
    ///
    /// # Returns
    ///
    /// * `Ok(ScanOutcome)` - The scan reached a terminal status
    /// * `Err(TapmapError)` - Storage failed
    pub async fn run(mut self) -> Result<ScanOutcome, TapmapError> {
        lock(&self.storage)?.transition_scan(&self.scan_id, ScanStatus::Running, None)?;

        tracing::info!(
            "Starting scan {} of {} (max {} pages, depth {}, {:.2} req/s)",
            self.scan_id,
            self.seed,
            self.config.max_pages,
            self.config.max_depth,
            self.governor.rate()
        );

        if let Err(rejection) = self.frontier.push(self.seed.clone(), 0) {
            tracing::error!("Could not queue seed {}: {:?}", self.seed, rejection);
            let note = format!("Seed could not be queued: {:?}", rejection);
            self.runner.close().await;
            return self.finalize(ScanStatus::Failed, Some(note));
        }

        let result = self.crawl_loop().await;
        self.runner.close().await;

        match result {
            Ok((status, notes)) => self.finalize(status, notes),
            Err(e) => {
                tracing::error!("Scan {} failed: {}", self.scan_id, e);
                let note = e.to_string();
                if let Err(finalize_err) = self.finalize(ScanStatus::Failed, Some(note)) {
                    tracing::error!("Could not finalize scan {}: {}", self.scan_id, finalize_err);
                }
                Err(e)
            }
        }
    }

    async fn crawl_loop(&mut self) -> Result<(ScanStatus, Option<String>), TapmapError> {
        loop {
            match self.step().await? {
                Step::Continue => {}
                Step::Finish(status, notes) => return Ok((status, notes)),
            }
        }
    }

    async fn step(&mut self) -> Result<Step, TapmapError> {
        if self.cancel.is_cancelled() {
            tracing::info!("Scan {} cancelled", self.scan_id);
            return Ok(Step::Finish(ScanStatus::Completed, Some(CANCELLED_NOTE.to_string())));
        }

        if self.pages_scanned >= self.config.max_pages {
            tracing::info!("Scan {} reached its page budget ({})", self.scan_id, self.config.max_pages);
            return Ok(Step::Finish(ScanStatus::Completed, None));
        }

        let Some(queued) = self.frontier.pop() else {
            tracing::info!("Frontier is empty, scan {} complete", self.scan_id);
            return Ok(Step::Finish(ScanStatus::Completed, None));
        };

        let is_seed = queued.depth == 0;

        match self.governor.admit(&queued.url).await {
            Admission::Allow => self.visit(queued).await,
            Admission::Deny(DenyReason::DeadlineExceeded) => {
                tracing::warn!(
                    "Scan {} hit its {}s deadline",
                    self.scan_id,
                    self.config.timeout_seconds
                );
                Ok(Step::Finish(
                    ScanStatus::Timeout,
                    Some(format!("Timed out after {}s", self.config.timeout_seconds)),
                ))
            }
            Admission::Deny(reason) if is_seed => {
                let violation = TapmapError::PolicyViolation {
                    url: queued.url.to_string(),
                    reason: reason.to_string(),
                };
                tracing::error!("Scan {} cannot start: {}", self.scan_id, violation);
                Ok(Step::Finish(ScanStatus::Failed, Some(violation.to_string())))
            }
            Admission::Deny(reason) => {
                let outcome = match reason {
                    DenyReason::RobotsDisallowed => PageOutcome::RobotsDenied,
                    _ => PageOutcome::UnsafeTarget,
                };
                tracing::debug!("Skipping {}: {}", queued.url, reason);
                let mut visit = self.page_visit(&queued, queued.url.as_str(), outcome);
                visit.robots_allowed = outcome != PageOutcome::RobotsDenied;
                visit.error_message = Some(reason.to_string());
                lock(&self.storage)?.record_page_visit(&visit)?;
                Ok(Step::Continue)
            }
        }
    }

    async fn visit(&mut self, queued: QueuedUrl) -> Result<Step, TapmapError> {
        let is_seed = queued.depth == 0;
        let site = site_key(&queued.url).unwrap_or_default();
        self.governor.throttle(&site).await;

        tracing::debug!("Fetching {} (depth {})", queued.url, queued.depth);

        let fetch = match self.runner.fetch(&queued.url).await {
            Ok(fetch) => fetch,
            Err(e) => {
                tracing::warn!("Failed to load {}: {}", queued.url, e);
                let mut visit = self.page_visit(&queued, queued.url.as_str(), e.outcome());
                visit.http_status = e.http_status();
                visit.error_message = Some(e.to_string());
                self.record_attempt(&visit, &[])?;

                if is_seed {
                    return Ok(Step::Finish(ScanStatus::Failed, Some(format!("Seed page failed: {}", e))));
                }
                return Ok(Step::Continue);
            }
        };

        let final_url = normalize_parsed(fetch.final_url.clone()).unwrap_or_else(|_| fetch.final_url.clone());

        if final_url != queued.url {
            if let Some(step) = self.check_redirect(&queued, &final_url, &fetch).await? {
                return Ok(step);
            }
        }

        self.consents.push(fetch.consent.clone());
        if self.consent_framework.is_none() {
            self.consent_framework = fetch.consent.framework.clone();
        }
        self.analytics.extend(fetch.analytics.iter().cloned());

        let mut elements = self
            .extractor
            .extract(&self.scan_id, final_url.as_str(), &fetch.snapshot);
        let tagged = tag_all(&mut elements, &self.taxonomy);

        let mut visit = self.page_visit(&queued, final_url.as_str(), PageOutcome::Fetched);
        visit.http_status = fetch.status;
        visit.title = fetch.title.clone();
        visit.consent = fetch.consent.clone();
        visit.analytics = fetch.analytics.clone();
        visit.element_count = elements.len() as u32;
        self.record_attempt(&visit, &elements)?;

        tracing::info!(
            "[{}/{}] {} (depth {}) -> {} ({} elements, {} tagged)",
            self.pages_scanned,
            self.config.max_pages,
            final_url,
            queued.depth,
            fetch.title.as_deref().unwrap_or("(no title)"),
            elements.len(),
            tagged
        );

        if queued.depth < self.config.max_depth {
            self.enqueue_links(&fetch, queued.depth + 1);
        }

        Ok(Step::Continue)
    }

    /// Handles a navigation that ended on a different URL
    ///
    /// # Returns
    ///
    /// `Some(Step)` when the page must not be processed
    async fn check_redirect(
        &mut self,
        queued: &QueuedUrl,
        final_url: &Url,
        fetch: &PageFetch,
    ) -> Result<Option<Step>, TapmapError> {
        let is_seed = queued.depth == 0;

        let rejection = if let Err(unsafe_target) = self.governor.check_safety(final_url).await {
            Some((PageOutcome::UnsafeRedirect, unsafe_target.to_string()))
        } else if !is_same_site(final_url, &self.seed) {
            Some((
                PageOutcome::OffDomainRedirect,
                format!("redirected off site to {}", final_url),
            ))
        } else {
            None
        };

        if let Some((outcome, reason)) = rejection {
            tracing::warn!("Discarding {}: {}", queued.url, reason);
            let mut visit = self.page_visit(queued, queued.url.as_str(), outcome);
            visit.http_status = fetch.status;
            visit.error_message = Some(reason.clone());
            self.record_attempt(&visit, &[])?;

            let step = if is_seed {
                Step::Finish(ScanStatus::Failed, Some(format!("Seed page {}", reason)))
            } else {
                Step::Continue
            };
            return Ok(Some(step));
        }

        if self.frontier.has_seen(final_url) {
            tracing::debug!("{} redirected to already visited {}", queued.url, final_url);
            let mut visit = self.page_visit(queued, final_url.as_str(), PageOutcome::Fetched);
            visit.http_status = fetch.status;
            visit.title = fetch.title.clone();
            visit.error_message = Some(format!("redirected to already visited {}", final_url));
            self.record_attempt(&visit, &[])?;
            return Ok(Some(Step::Continue));
        }

        self.frontier.mark_seen(final_url);
        Ok(None)
    }

    /// Queues the page's crawlable links
    ///
    /// The page budget is not applied here: queued URLs may still be denied
    /// by the governor, and only fetch attempts count against the budget.
    fn enqueue_links(&mut self, fetch: &PageFetch, depth: u32) {
        let mut added = 0;
        for link in crawlable_links(&fetch.snapshot, &self.seed) {
            match self.frontier.push(link, depth) {
                Ok(()) => added += 1,
                Err(PushRejection::AlreadySeen) => {}
                Err(PushRejection::Full) => {
                    tracing::warn!("Frontier is full; dropping further links");
                    break;
                }
            }
        }
        tracing::debug!("Queued {} new links at depth {}", added, depth);
    }

    fn page_visit(&self, queued: &QueuedUrl, normalized_url: &str, outcome: PageOutcome) -> PageVisit {
        PageVisit {
            id: None,
            scan_id: self.scan_id.clone(),
            url: queued.url.to_string(),
            normalized_url: normalized_url.to_string(),
            depth: queued.depth,
            outcome,
            http_status: None,
            title: None,
            robots_allowed: true,
            consent: ConsentInfo::none(),
            analytics: Vec::new(),
            element_count: 0,
            error_message: None,
            visited_at: Utc::now().to_rfc3339(),
        }
    }

    /// Persists a fetch attempt with its elements and bumps the counters
    fn record_attempt(&mut self, visit: &PageVisit, elements: &[ElementRecord]) -> Result<(), TapmapError> {
        self.pages_scanned += 1;
        self.elements_found += elements.len();

        let mut storage = lock(&self.storage)?;
        storage.record_page_visit(visit)?;
        if !elements.is_empty() {
            storage.insert_elements(elements)?;
        }
        storage.update_scan_progress(
            &self.scan_id,
            self.pages_scanned,
            self.frontier.seen_count() as u32,
        )?;
        Ok(())
    }

    fn finalize(&mut self, status: ScanStatus, notes: Option<String>) -> Result<ScanOutcome, TapmapError> {
        let findings = ScanFindings {
            robots_txt_found: self.governor.robots_found(&self.seed),
            consent_framework: self.consent_framework.clone(),
            scan_quality: Some(ScanQuality::grade(&self.consents)),
            analytics_detected: self.analytics.iter().cloned().collect(),
            duration_seconds: Some(self.started.elapsed().as_secs_f64()),
        };

        {
            let mut storage = lock(&self.storage)?;
            storage.update_scan_progress(
                &self.scan_id,
                self.pages_scanned,
                self.frontier.seen_count() as u32,
            )?;
            storage.update_scan_findings(&self.scan_id, &findings)?;
            storage.transition_scan(&self.scan_id, status, notes.as_deref())?;
        }

        tracing::info!(
            "Scan {} {}: {} pages, {} elements in {:.1}s",
            self.scan_id,
            status,
            self.pages_scanned,
            self.elements_found,
            self.started.elapsed().as_secs_f64()
        );

        Ok(ScanOutcome {
            scan_id: self.scan_id.clone(),
            status,
            pages_scanned: self.pages_scanned,
            elements_found: self.elements_found,
            notes,
        })
    }
}
