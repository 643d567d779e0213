//! Storage module for persisting scan data
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema management
//! - Scan lifecycle and findings
//! - Page visits in crawl order
//! - Element records and their value tiers

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::config::ScanConfig;
use crate::state::{
    ActionType, ConsentInfo, ElementType, PageOutcome, ScanQuality, ScanStatus, TierSource,
    ValueTier,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// Storage handle shared by a scan loop, enrichment jobs and readers
pub type SharedStorage = Arc<Mutex<SqliteStorage>>;

/// Wraps a storage for sharing across tasks
pub fn shared(storage: SqliteStorage) -> SharedStorage {
    Arc::new(Mutex::new(storage))
}

/// Locks shared storage
///
/// A poisoned lock is reported as a database error rather than a panic.
pub fn lock(storage: &SharedStorage) -> StorageResult<MutexGuard<'_, SqliteStorage>> {
    storage
        .lock()
        .map_err(|_| StorageError::Database("storage lock poisoned".to_string()))
}

/// Initializes or opens a storage database
///
/// Parent directories of `path` are created when missing.
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(StorageError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> StorageResult<SqliteStorage> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    SqliteStorage::new(path)
}

/// Results recorded on a scan when it finishes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanFindings {
    pub robots_txt_found: Option<bool>,
    /// First consent framework detected on any page
    pub consent_framework: Option<String>,
    pub scan_quality: Option<ScanQuality>,
    /// Sorted, distinct analytics tags seen across the scan
    pub analytics_detected: Vec<String>,
    pub duration_seconds: Option<f64>,
}

/// Represents a scan in the database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanJob {
    pub id: String,
    pub seed_url: String,
    pub domain: String,
    pub config: ScanConfig,
    pub status: ScanStatus,
    pub pages_scanned: u32,
    pub total_pages: u32,
    pub created_at: String,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub notes: Option<String>,
    #[serde(flatten)]
    pub findings: ScanFindings,
}

/// Represents one processed frontier entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageVisit {
    pub id: Option<i64>,
    pub scan_id: String,
    /// URL as it was requested
    pub url: String,
    pub normalized_url: String,
    pub depth: u32,
    pub outcome: PageOutcome,
    pub http_status: Option<u16>,
    pub title: Option<String>,
    pub robots_allowed: bool,
    pub consent: ConsentInfo,
    pub analytics: Vec<String>,
    pub element_count: u32,
    pub error_message: Option<String>,
    pub visited_at: String,
}

/// Represents one interactive element found on a page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementRecord {
    pub id: Option<i64>,
    pub scan_id: String,
    pub page_url: String,
    pub element_type: ElementType,
    pub action_type: ActionType,
    pub element_text: String,
    pub css_selector: String,
    pub container_context: String,
    pub section_context: Option<String>,
    pub is_above_fold: bool,
    pub target_url: Option<String>,
    pub is_external: bool,
    pub pharma_context: Option<String>,
    pub fingerprint: String,
    pub value_tier: Option<ValueTier>,
    pub value_reason: Option<String>,
    pub tier_source: Option<TierSource>,
}

/// Element counts per value tier for one scan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierCounts {
    pub total: u64,
    pub hva: u64,
    pub mva: u64,
    pub lva: u64,
    pub untiered: u64,
}

impl TierCounts {
    /// Elements that carry any tier
    pub fn classified(&self) -> u64 {
        self.hva + self.mva + self.lva
    }
}
