//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::state::{ScanStatus, ValueTier};
use crate::storage::{ElementRecord, PageVisit, ScanFindings, ScanJob, TierCounts};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Scan not found: {0}")]
    ScanNotFound(String),

    #[error("Element {element_id} not found in scan {scan_id}")]
    ElementNotFound { scan_id: String, element_id: i64 },

    #[error("Invalid scan transition: {from} -> {to}")]
    InvalidTransition { from: ScanStatus, to: ScanStatus },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// This trait defines all database operations needed by the scheduler, the
/// analysis views and the enricher.
pub trait Storage {
    // ===== Scan Management =====

    /// Inserts a new scan
    ///
    /// # Arguments
    ///
    /// * `scan` - The scan to persist; its id must be unused
    fn create_scan(&mut self, scan: &ScanJob) -> StorageResult<()>;

    /// Gets a scan by ID
    fn get_scan(&self, scan_id: &str) -> StorageResult<ScanJob>;

    /// Lists scans, newest first
    fn list_scans(&self) -> StorageResult<Vec<ScanJob>>;

    /// Checks whether a scan ID is taken
    fn scan_exists(&self, scan_id: &str) -> StorageResult<bool>;

    /// Moves a scan to a new status
    ///
    /// Entering `running` stamps `started_at`; entering a terminal status
    /// stamps `completed_at`. Backward transitions are rejected.
    ///
    /// # Arguments
    ///
    /// * `scan_id` - The scan to update
    /// * `status` - The requested status
    /// * `notes` - Replaces the scan notes when given
    fn transition_scan(
        &mut self,
        scan_id: &str,
        status: ScanStatus,
        notes: Option<&str>,
    ) -> StorageResult<()>;

    /// Updates the page counters of a scan
    fn update_scan_progress(
        &mut self,
        scan_id: &str,
        pages_scanned: u32,
        total_pages: u32,
    ) -> StorageResult<()>;

    /// Records end-of-scan findings
    fn update_scan_findings(&mut self, scan_id: &str, findings: &ScanFindings)
        -> StorageResult<()>;

    // ===== Page Visits =====

    /// Appends a page visit and returns its ID
    fn record_page_visit(&mut self, visit: &PageVisit) -> StorageResult<i64>;

    /// Gets all page visits of a scan in crawl order
    fn get_page_visits(&self, scan_id: &str) -> StorageResult<Vec<PageVisit>>;

    // ===== Elements =====

    /// Inserts a page's elements in one transaction
    ///
    /// # Returns
    ///
    /// The number of rows inserted
    fn insert_elements(&mut self, elements: &[ElementRecord]) -> StorageResult<usize>;

    /// Gets all elements of a scan in extraction order
    fn get_elements(&self, scan_id: &str) -> StorageResult<Vec<ElementRecord>>;

    /// Gets one element of a scan
    fn get_element(&self, scan_id: &str, element_id: i64) -> StorageResult<ElementRecord>;

    /// Gets up to `limit` elements without a tier whose ID is above `after_id`
    fn get_untiered_elements(
        &self,
        scan_id: &str,
        after_id: i64,
        limit: usize,
    ) -> StorageResult<Vec<ElementRecord>>;

    /// Writes a model-assigned tier
    ///
    /// The write only happens while the element has no tier, so a manual
    /// override is never replaced.
    ///
    /// # Returns
    ///
    /// Whether the element was updated
    fn apply_model_tier(
        &mut self,
        scan_id: &str,
        element_id: i64,
        tier: ValueTier,
        reason: &str,
    ) -> StorageResult<bool>;

    /// Writes a manual tier unconditionally
    fn override_tier(
        &mut self,
        scan_id: &str,
        element_id: i64,
        tier: ValueTier,
        reason: &str,
    ) -> StorageResult<()>;

    /// Counts a scan's elements per tier
    fn count_tiers(&self, scan_id: &str) -> StorageResult<TierCounts>;
}
