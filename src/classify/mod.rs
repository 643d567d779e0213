//! Value-tier classification of stored elements
//!
//! This module contains:
//! - The `TierClassifier` seam and its hosted-model implementation
//! - Prompt construction and reply parsing
//! - The `Enricher`, which runs one resumable background job per scan
//!
//! Manual overrides always win: model results are only written to elements
//! that still have no tier.

mod client;
mod prompt;

pub use client::{AnthropicClassifier, DEFAULT_MODEL};
pub use prompt::{build_prompt, parse_assignments, CLASSIFICATION_PROMPT};

use crate::analysis::{finished_scan, load_scan};
use crate::state::ValueTier;
use crate::storage::{lock, ElementRecord, SharedStorage, Storage};
use crate::TapmapError;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tokio::task::JoinHandle;

/// Errors from a classifier backend
#[derive(Debug, Error)]
pub enum ClassificationError {
    #[error("API key environment variable {0} is not set")]
    MissingApiKey(String),

    #[error("Classifier request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Classifier returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Malformed classifier reply: {0}")]
    MalformedResponse(String),
}

/// One tier decision for one element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierAssignment {
    pub element_id: i64,
    pub tier: ValueTier,
    pub reason: String,
}

/// Assigns value tiers to a batch of elements
///
/// Implementations may skip elements; anything left unassigned stays
/// un-tiered and is offered again on the next job.
#[async_trait]
pub trait TierClassifier: Send + Sync {
    async fn classify(&self, batch: &[ElementRecord]) -> Result<Vec<TierAssignment>, ClassificationError>;
}

/// Progress of a scan's classification
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichmentStatus {
    pub scan_id: String,
    pub total: u64,
    pub classified: u64,
    pub is_running: bool,
    /// Percentage classified, one decimal place
    pub progress: f64,
    /// Error that stopped the last job, if it failed
    pub last_error: Option<String>,
}

#[derive(Default)]
struct JobState {
    running: bool,
    last_error: Option<String>,
    handle: Option<JoinHandle<()>>,
}

type JobTable = Arc<Mutex<HashMap<String, JobState>>>;

fn jobs_guard(jobs: &JobTable) -> MutexGuard<'_, HashMap<String, JobState>> {
    jobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Runs classification jobs and manual overrides
#[derive(Clone)]
pub struct Enricher {
    storage: SharedStorage,
    classifier: Arc<dyn TierClassifier>,
    batch_size: usize,
    jobs: JobTable,
}

impl Enricher {
    pub fn new(storage: SharedStorage, classifier: Arc<dyn TierClassifier>, batch_size: usize) -> Self {
        Self {
            storage,
            classifier,
            batch_size: batch_size.max(1),
            jobs: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Starts classifying a scan's un-tiered elements in the background
    ///
    /// Starting a scan whose job is still running changes nothing and
    /// returns the current status. A previously failed job is resumed from
    /// the elements that are still un-tiered.
    ///
    /// # Arguments
    ///
    /// * `scan_id` - A completed or timed-out scan
    ///
    /// # Returns
    ///
    /// * `Ok(EnrichmentStatus)` - Status right after the start request
    /// * `Err(TapmapError)` - The scan is missing or not finished
    pub fn start(&self, scan_id: &str) -> Result<EnrichmentStatus, TapmapError> {
        finished_scan(&*lock(&self.storage)?, scan_id)?;

        {
            let mut jobs = jobs_guard(&self.jobs);
            let job = jobs.entry(scan_id.to_string()).or_default();
            if job.running {
                tracing::debug!("Classification of {} already running", scan_id);
            } else {
                job.running = true;
                job.last_error = None;
                job.handle = Some(tokio::spawn(run_job(
                    Arc::clone(&self.storage),
                    Arc::clone(&self.classifier),
                    Arc::clone(&self.jobs),
                    scan_id.to_string(),
                    self.batch_size,
                )));
                tracing::info!("Started classification of {}", scan_id);
            }
        }

        self.status(scan_id)
    }

    /// Reports classification progress of a scan, including its job state
    pub fn status(&self, scan_id: &str) -> Result<EnrichmentStatus, TapmapError> {
        let mut status = tier_progress(&self.storage, scan_id)?;
        if let Some(job) = jobs_guard(&self.jobs).get(scan_id) {
            status.is_running = job.running;
            status.last_error = job.last_error.clone();
        }
        Ok(status)
    }

    /// Waits for the scan's current job, if any, to finish
    pub async fn wait(&self, scan_id: &str) -> Result<EnrichmentStatus, TapmapError> {
        let handle = jobs_guard(&self.jobs)
            .get_mut(scan_id)
            .and_then(|job| job.handle.take());

        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::error!("Classification task for {} ended abnormally: {}", scan_id, e);
                let mut jobs = jobs_guard(&self.jobs);
                if let Some(job) = jobs.get_mut(scan_id) {
                    job.running = false;
                    job.last_error = Some(e.to_string());
                }
            }
        }

        self.status(scan_id)
    }

    /// Sets an element's tier by hand; see [`override_tier`]
    pub fn override_tier(
        &self,
        scan_id: &str,
        element_id: i64,
        tier: ValueTier,
        reason: &str,
    ) -> Result<ElementRecord, TapmapError> {
        override_tier(&self.storage, scan_id, element_id, tier, reason)
    }
}

/// Stored tier counts of a scan, with no job attached
pub fn tier_progress(storage: &SharedStorage, scan_id: &str) -> Result<EnrichmentStatus, TapmapError> {
    let counts = {
        let storage = lock(storage)?;
        load_scan(&*storage, scan_id)?;
        storage.count_tiers(scan_id)?
    };

    let classified = counts.classified();
    let progress = if counts.total > 0 {
        (classified as f64 / counts.total as f64 * 1000.0).round() / 10.0
    } else {
        0.0
    };

    Ok(EnrichmentStatus {
        scan_id: scan_id.to_string(),
        total: counts.total,
        classified,
        is_running: false,
        progress,
        last_error: None,
    })
}

/// Sets an element's tier by hand
///
/// Applies whether or not a job is running; later model results never
/// replace it.
///
/// # Returns
///
/// * `Ok(ElementRecord)` - The updated element
/// * `Err(TapmapError)` - The scan or element does not exist
pub fn override_tier(
    storage: &SharedStorage,
    scan_id: &str,
    element_id: i64,
    tier: ValueTier,
    reason: &str,
) -> Result<ElementRecord, TapmapError> {
    let mut storage = lock(storage)?;
    load_scan(&*storage, scan_id)?;
    storage.override_tier(scan_id, element_id, tier, reason)?;
    tracing::info!("Element {} of {} manually set to {}", element_id, scan_id, tier);
    Ok(storage.get_element(scan_id, element_id)?)
}

async fn run_job(
    storage: SharedStorage,
    classifier: Arc<dyn TierClassifier>,
    jobs: JobTable,
    scan_id: String,
    batch_size: usize,
) {
    let result = classify_remaining(&storage, classifier.as_ref(), &scan_id, batch_size).await;

    let last_error = match result {
        Ok(written) => {
            tracing::info!("Classification of {} complete ({} tiers written)", scan_id, written);
            None
        }
        Err(e) => {
            tracing::error!("Classification of {} failed: {}", scan_id, e);
            Some(e.to_string())
        }
    };

    let mut jobs = jobs_guard(&jobs);
    let job = jobs.entry(scan_id).or_default();
    job.running = false;
    job.last_error = last_error;
}

/// Classifies every un-tiered element of a scan, batch by batch
///
/// Elements are walked in ID order with a cursor, so elements the
/// classifier skips are not offered again within the same job.
async fn classify_remaining(
    storage: &SharedStorage,
    classifier: &dyn TierClassifier,
    scan_id: &str,
    batch_size: usize,
) -> Result<usize, TapmapError> {
    let mut after_id = 0;
    let mut written = 0;

    loop {
        let batch = lock(storage)?.get_untiered_elements(scan_id, after_id, batch_size)?;
        let Some(last_id) = batch.last().and_then(|record| record.id) else {
            break;
        };
        after_id = last_id;

        let assignments = classifier.classify(&batch).await?;

        let mut applied = 0;
        {
            let mut storage = lock(storage)?;
            for assignment in &assignments {
                if storage.apply_model_tier(
                    scan_id,
                    assignment.element_id,
                    assignment.tier,
                    &assignment.reason,
                )? {
                    applied += 1;
                }
            }
        }

        tracing::debug!(
            "Batch of {} for {}: {} results, {} written",
            batch.len(),
            scan_id,
            assignments.len(),
            applied
        );
        written += applied;
    }

    Ok(written)
}
