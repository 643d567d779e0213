//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the TapMap database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One row per scan request
CREATE TABLE IF NOT EXISTS scans (
    id TEXT PRIMARY KEY,
    seed_url TEXT NOT NULL,
    domain TEXT NOT NULL,
    config TEXT NOT NULL,
    status TEXT NOT NULL,
    pages_scanned INTEGER NOT NULL DEFAULT 0,
    total_pages INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    started_at TEXT,
    completed_at TEXT,
    notes TEXT,
    robots_txt_found INTEGER,
    consent_framework TEXT,
    scan_quality TEXT,
    analytics_detected TEXT,
    duration_seconds REAL
);

CREATE INDEX IF NOT EXISTS idx_scans_domain ON scans(domain);
CREATE INDEX IF NOT EXISTS idx_scans_created ON scans(created_at);

-- One row per dequeued URL, in crawl order
CREATE TABLE IF NOT EXISTS page_visits (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    scan_id TEXT NOT NULL REFERENCES scans(id),
    url TEXT NOT NULL,
    normalized_url TEXT NOT NULL,
    depth INTEGER NOT NULL,
    outcome TEXT NOT NULL,
    http_status INTEGER,
    title TEXT,
    robots_allowed INTEGER NOT NULL,
    consent_detected INTEGER NOT NULL DEFAULT 0,
    consent_framework TEXT,
    consent_action TEXT NOT NULL DEFAULT 'none',
    analytics TEXT,
    element_count INTEGER NOT NULL DEFAULT 0,
    error_message TEXT,
    visited_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_page_visits_scan ON page_visits(scan_id);

-- One row per interactive element per page, in DOM order
CREATE TABLE IF NOT EXISTS elements (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    scan_id TEXT NOT NULL REFERENCES scans(id),
    page_url TEXT NOT NULL,
    element_type TEXT NOT NULL,
    action_type TEXT NOT NULL,
    element_text TEXT NOT NULL,
    css_selector TEXT NOT NULL,
    container_context TEXT NOT NULL,
    section_context TEXT,
    is_above_fold INTEGER NOT NULL,
    target_url TEXT,
    is_external INTEGER NOT NULL,
    pharma_context TEXT,
    fingerprint TEXT NOT NULL,
    value_tier TEXT,
    value_reason TEXT,
    tier_source TEXT
);

CREATE INDEX IF NOT EXISTS idx_elements_scan ON elements(scan_id);
CREATE INDEX IF NOT EXISTS idx_elements_fingerprint ON elements(scan_id, fingerprint);
CREATE INDEX IF NOT EXISTS idx_elements_untiered ON elements(scan_id, value_tier);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
