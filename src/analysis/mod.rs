//! Analysis views over stored scans
//!
//! This module derives reporting views from persisted element records:
//! - Cross-page deduplication by fingerprint
//! - Scan-to-scan diffs
//! - Per-scan summaries
//!
//! None of these views are persisted.

mod dedup;
mod diff;
mod summary;

pub use dedup::{dedup, regroup, DedupGroup};
pub use diff::{diff, DiffResult, DiffSummary};
pub use summary::{summarize, tag_category, ScanSummary, DEFAULT_TAG_NAME};

use crate::state::ElementType;
use crate::storage::{ElementRecord, ScanJob, Storage, StorageError};
use crate::TapmapError;

/// Loads a scan that has finished with analyzable data
///
/// # Returns
///
/// * `Ok(ScanJob)` - The scan is completed or timed out
/// * `Err(TapmapError::ScanNotFound)` - No such scan
/// * `Err(TapmapError::ScanNotFinished)` - The scan is still pending, running, or failed
pub fn finished_scan(storage: &dyn Storage, scan_id: &str) -> Result<ScanJob, TapmapError> {
    let scan = load_scan(storage, scan_id)?;
    if !scan.status.is_finished_with_data() {
        return Err(TapmapError::ScanNotFinished {
            scan_id: scan.id,
            status: scan.status,
        });
    }
    Ok(scan)
}

/// Loads a scan, mapping a missing row to [`TapmapError::ScanNotFound`]
pub fn load_scan(storage: &dyn Storage, scan_id: &str) -> Result<ScanJob, TapmapError> {
    storage.get_scan(scan_id).map_err(|e| match e {
        StorageError::ScanNotFound(id) => TapmapError::ScanNotFound(id),
        other => TapmapError::Storage(other),
    })
}

/// Deduplicated elements of one scan
pub fn dedup_scan(storage: &dyn Storage, scan_id: &str) -> Result<Vec<DedupGroup>, TapmapError> {
    load_scan(storage, scan_id)?;
    Ok(dedup(&storage.get_elements(scan_id)?))
}

/// Diffs two finished scans
///
/// # Arguments
///
/// * `storage` - Where both scans live
/// * `scan_a` - The baseline scan
/// * `scan_b` - The scan compared against the baseline
///
/// # Returns
///
/// * `Ok(DiffResult)` - The diff
/// * `Err(TapmapError)` - Either scan is missing or has not finished
pub fn diff_scans(storage: &dyn Storage, scan_a: &str, scan_b: &str) -> Result<DiffResult, TapmapError> {
    finished_scan(storage, scan_a)?;
    finished_scan(storage, scan_b)?;

    let groups_a = dedup(&storage.get_elements(scan_a)?);
    let groups_b = dedup(&storage.get_elements(scan_b)?);

    tracing::debug!(
        "Diffing {} ({} unique) against {} ({} unique)",
        scan_a,
        groups_a.len(),
        scan_b,
        groups_b.len()
    );

    Ok(diff(scan_a, &groups_a, scan_b, &groups_b))
}

/// Summary of one scan
pub fn summarize_scan(storage: &dyn Storage, scan_id: &str) -> Result<ScanSummary, TapmapError> {
    let scan = load_scan(storage, scan_id)?;
    let elements = storage.get_elements(scan_id)?;
    Ok(summarize(&scan, &elements))
}

/// Drops elements of the given types
///
/// Used by element listings that hide noisy types such as plain links.
pub fn without_types(elements: Vec<ElementRecord>, hidden: &[ElementType]) -> Vec<ElementRecord> {
    if hidden.is_empty() {
        return elements;
    }
    elements
        .into_iter()
        .filter(|e| !hidden.contains(&e.element_type))
        .collect()
}
