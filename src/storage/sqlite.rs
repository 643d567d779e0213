//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::config::ScanConfig;
use crate::state::{
    ActionType, ConsentAction, ConsentInfo, ElementType, PageOutcome, ScanQuality, ScanStatus,
    TierSource, ValueTier,
};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{ElementRecord, PageVisit, ScanFindings, ScanJob, TierCounts};
use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

const SCAN_COLUMNS: &str = "id, seed_url, domain, config, status, pages_scanned, total_pages,
    created_at, started_at, completed_at, notes, robots_txt_found, consent_framework,
    scan_quality, analytics_detected, duration_seconds";

const VISIT_COLUMNS: &str = "id, scan_id, url, normalized_url, depth, outcome, http_status,
    title, robots_allowed, consent_detected, consent_framework, consent_action, analytics,
    element_count, error_message, visited_at";

const ELEMENT_COLUMNS: &str = "id, scan_id, page_url, element_type, action_type, element_text,
    css_selector, container_context, section_context, is_above_fold, target_url, is_external,
    pharma_context, fingerprint, value_tier, value_reason, tier_source";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
            PRAGMA mmap_size = 268435456;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn current_status(&self, scan_id: &str) -> StorageResult<ScanStatus> {
        let status: Option<String> = self
            .conn
            .query_row(
                "SELECT status FROM scans WHERE id = ?1",
                params![scan_id],
                |row| row.get(0),
            )
            .optional()?;

        let status = status.ok_or_else(|| StorageError::ScanNotFound(scan_id.to_string()))?;
        ScanStatus::from_db_string(&status)
            .ok_or_else(|| StorageError::Database(format!("unknown scan status '{}'", status)))
    }
}

/// Converts a stored text value through `parse`, failing the row on unknown values
fn parse_text<T>(idx: usize, value: String, parse: impl Fn(&str) -> Option<T>) -> rusqlite::Result<T> {
    parse(&value).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("unexpected value '{}'", value).into(),
        )
    })
}

fn parse_json<T: serde::de::DeserializeOwned>(idx: usize, value: &str) -> rusqlite::Result<T> {
    serde_json::from_str(value)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_string_list(idx: usize, value: Option<String>) -> rusqlite::Result<Vec<String>> {
    match value {
        Some(json) => parse_json(idx, &json),
        None => Ok(Vec::new()),
    }
}

fn scan_from_row(row: &Row<'_>) -> rusqlite::Result<ScanJob> {
    let config: String = row.get(3)?;
    let config: ScanConfig = parse_json(3, &config)?;
    let scan_quality: Option<String> = row.get(13)?;

    Ok(ScanJob {
        id: row.get(0)?,
        seed_url: row.get(1)?,
        domain: row.get(2)?,
        config,
        status: parse_text(4, row.get(4)?, ScanStatus::from_db_string)?,
        pages_scanned: row.get(5)?,
        total_pages: row.get(6)?,
        created_at: row.get(7)?,
        started_at: row.get(8)?,
        completed_at: row.get(9)?,
        notes: row.get(10)?,
        findings: ScanFindings {
            robots_txt_found: row.get(11)?,
            consent_framework: row.get(12)?,
            scan_quality: scan_quality
                .map(|q| parse_text(13, q, ScanQuality::from_db_string))
                .transpose()?,
            analytics_detected: parse_string_list(14, row.get(14)?)?,
            duration_seconds: row.get(15)?,
        },
    })
}

fn visit_from_row(row: &Row<'_>) -> rusqlite::Result<PageVisit> {
    Ok(PageVisit {
        id: row.get(0)?,
        scan_id: row.get(1)?,
        url: row.get(2)?,
        normalized_url: row.get(3)?,
        depth: row.get(4)?,
        outcome: parse_text(5, row.get(5)?, PageOutcome::from_db_string)?,
        http_status: row.get(6)?,
        title: row.get(7)?,
        robots_allowed: row.get(8)?,
        consent: ConsentInfo {
            detected: row.get(9)?,
            framework: row.get(10)?,
            action: parse_text(11, row.get(11)?, ConsentAction::from_db_string)?,
        },
        analytics: parse_string_list(12, row.get(12)?)?,
        element_count: row.get(13)?,
        error_message: row.get(14)?,
        visited_at: row.get(15)?,
    })
}

fn element_from_row(row: &Row<'_>) -> rusqlite::Result<ElementRecord> {
    let value_tier: Option<String> = row.get(14)?;
    let tier_source: Option<String> = row.get(16)?;

    Ok(ElementRecord {
        id: row.get(0)?,
        scan_id: row.get(1)?,
        page_url: row.get(2)?,
        element_type: parse_text(3, row.get(3)?, ElementType::parse)?,
        action_type: parse_text(4, row.get(4)?, ActionType::parse)?,
        element_text: row.get(5)?,
        css_selector: row.get(6)?,
        container_context: row.get(7)?,
        section_context: row.get(8)?,
        is_above_fold: row.get(9)?,
        target_url: row.get(10)?,
        is_external: row.get(11)?,
        pharma_context: row.get(12)?,
        fingerprint: row.get(13)?,
        value_tier: value_tier
            .map(|t| parse_text(14, t, ValueTier::parse))
            .transpose()?,
        value_reason: row.get(15)?,
        tier_source: tier_source
            .map(|s| parse_text(16, s, TierSource::from_db_string))
            .transpose()?,
    })
}

impl Storage for SqliteStorage {
    // ===== Scan Management =====

    fn create_scan(&mut self, scan: &ScanJob) -> StorageResult<()> {
        if self.scan_exists(&scan.id)? {
            return Err(StorageError::ConstraintViolation(format!(
                "scan {} already exists",
                scan.id
            )));
        }

        let config = serde_json::to_string(&scan.config)?;
        let analytics = serde_json::to_string(&scan.findings.analytics_detected)?;

        self.conn.execute(
            "INSERT INTO scans (id, seed_url, domain, config, status, pages_scanned, total_pages,
             created_at, started_at, completed_at, notes, robots_txt_found, consent_framework,
             scan_quality, analytics_detected, duration_seconds)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
            params![
                scan.id,
                scan.seed_url,
                scan.domain,
                config,
                scan.status.to_db_string(),
                scan.pages_scanned,
                scan.total_pages,
                scan.created_at,
                scan.started_at,
                scan.completed_at,
                scan.notes,
                scan.findings.robots_txt_found,
                scan.findings.consent_framework,
                scan.findings.scan_quality.map(|q| q.to_db_string()),
                analytics,
                scan.findings.duration_seconds,
            ],
        )?;
        Ok(())
    }

    fn get_scan(&self, scan_id: &str) -> StorageResult<ScanJob> {
        let sql = format!("SELECT {} FROM scans WHERE id = ?1", SCAN_COLUMNS);
        self.conn
            .query_row(&sql, params![scan_id], scan_from_row)
            .optional()?
            .ok_or_else(|| StorageError::ScanNotFound(scan_id.to_string()))
    }

    fn list_scans(&self) -> StorageResult<Vec<ScanJob>> {
        let sql = format!(
            "SELECT {} FROM scans ORDER BY created_at DESC, id DESC",
            SCAN_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let scans = stmt
            .query_map([], scan_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(scans)
    }

    fn scan_exists(&self, scan_id: &str) -> StorageResult<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM scans WHERE id = ?1",
                params![scan_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn transition_scan(
        &mut self,
        scan_id: &str,
        status: ScanStatus,
        notes: Option<&str>,
    ) -> StorageResult<()> {
        let current = self.current_status(scan_id)?;
        if !current.can_transition_to(status) {
            return Err(StorageError::InvalidTransition {
                from: current,
                to: status,
            });
        }

        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;

        tx.execute(
            "UPDATE scans SET status = ?1, notes = COALESCE(?2, notes) WHERE id = ?3",
            params![status.to_db_string(), notes, scan_id],
        )?;

        if status == ScanStatus::Running {
            tx.execute(
                "UPDATE scans SET started_at = ?1 WHERE id = ?2",
                params![now, scan_id],
            )?;
        }

        if status.is_terminal() {
            tx.execute(
                "UPDATE scans SET completed_at = ?1 WHERE id = ?2",
                params![now, scan_id],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    fn update_scan_progress(
        &mut self,
        scan_id: &str,
        pages_scanned: u32,
        total_pages: u32,
    ) -> StorageResult<()> {
        let updated = self.conn.execute(
            "UPDATE scans SET pages_scanned = ?1, total_pages = ?2 WHERE id = ?3",
            params![pages_scanned, total_pages, scan_id],
        )?;
        if updated == 0 {
            return Err(StorageError::ScanNotFound(scan_id.to_string()));
        }
        Ok(())
    }

    fn update_scan_findings(
        &mut self,
        scan_id: &str,
        findings: &ScanFindings,
    ) -> StorageResult<()> {
        let analytics = serde_json::to_string(&findings.analytics_detected)?;
        let updated = self.conn.execute(
            "UPDATE scans SET robots_txt_found = ?1, consent_framework = ?2, scan_quality = ?3,
             analytics_detected = ?4, duration_seconds = ?5 WHERE id = ?6",
            params![
                findings.robots_txt_found,
                findings.consent_framework,
                findings.scan_quality.map(|q| q.to_db_string()),
                analytics,
                findings.duration_seconds,
                scan_id,
            ],
        )?;
        if updated == 0 {
            return Err(StorageError::ScanNotFound(scan_id.to_string()));
        }
        Ok(())
    }

    // ===== Page Visits =====

    fn record_page_visit(&mut self, visit: &PageVisit) -> StorageResult<i64> {
        let analytics = serde_json::to_string(&visit.analytics)?;
        self.conn.execute(
            "INSERT INTO page_visits (scan_id, url, normalized_url, depth, outcome, http_status,
             title, robots_allowed, consent_detected, consent_framework, consent_action,
             analytics, element_count, error_message, visited_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                visit.scan_id,
                visit.url,
                visit.normalized_url,
                visit.depth,
                visit.outcome.to_db_string(),
                visit.http_status,
                visit.title,
                visit.robots_allowed,
                visit.consent.detected,
                visit.consent.framework,
                visit.consent.action.to_db_string(),
                analytics,
                visit.element_count,
                visit.error_message,
                visit.visited_at,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_page_visits(&self, scan_id: &str) -> StorageResult<Vec<PageVisit>> {
        let sql = format!(
            "SELECT {} FROM page_visits WHERE scan_id = ?1 ORDER BY id",
            VISIT_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let visits = stmt
            .query_map(params![scan_id], visit_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(visits)
    }

    // ===== Elements =====

    fn insert_elements(&mut self, elements: &[ElementRecord]) -> StorageResult<usize> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO elements (scan_id, page_url, element_type, action_type, element_text,
                 css_selector, container_context, section_context, is_above_fold, target_url,
                 is_external, pharma_context, fingerprint, value_tier, value_reason, tier_source)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
            )?;

            for element in elements {
                stmt.execute(params![
                    element.scan_id,
                    element.page_url,
                    element.element_type.as_str(),
                    element.action_type.as_str(),
                    element.element_text,
                    element.css_selector,
                    element.container_context,
                    element.section_context,
                    element.is_above_fold,
                    element.target_url,
                    element.is_external,
                    element.pharma_context,
                    element.fingerprint,
                    element.value_tier.map(|t| t.as_str()),
                    element.value_reason,
                    element.tier_source.map(|s| s.to_db_string()),
                ])?;
            }
        }
        tx.commit()?;
        Ok(elements.len())
    }

    fn get_elements(&self, scan_id: &str) -> StorageResult<Vec<ElementRecord>> {
        let sql = format!(
            "SELECT {} FROM elements WHERE scan_id = ?1 ORDER BY id",
            ELEMENT_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let elements = stmt
            .query_map(params![scan_id], element_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(elements)
    }

    fn get_element(&self, scan_id: &str, element_id: i64) -> StorageResult<ElementRecord> {
        let sql = format!(
            "SELECT {} FROM elements WHERE scan_id = ?1 AND id = ?2",
            ELEMENT_COLUMNS
        );
        self.conn
            .query_row(&sql, params![scan_id, element_id], element_from_row)
            .optional()?
            .ok_or_else(|| StorageError::ElementNotFound {
                scan_id: scan_id.to_string(),
                element_id,
            })
    }

    fn get_untiered_elements(
        &self,
        scan_id: &str,
        after_id: i64,
        limit: usize,
    ) -> StorageResult<Vec<ElementRecord>> {
        let sql = format!(
            "SELECT {} FROM elements
             WHERE scan_id = ?1 AND id > ?2 AND value_tier IS NULL
             ORDER BY id LIMIT ?3",
            ELEMENT_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let elements = stmt
            .query_map(params![scan_id, after_id, limit as i64], element_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(elements)
    }

    fn apply_model_tier(
        &mut self,
        scan_id: &str,
        element_id: i64,
        tier: ValueTier,
        reason: &str,
    ) -> StorageResult<bool> {
        let updated = self.conn.execute(
            "UPDATE elements SET value_tier = ?1, value_reason = ?2, tier_source = ?3
             WHERE scan_id = ?4 AND id = ?5 AND value_tier IS NULL",
            params![
                tier.as_str(),
                reason,
                TierSource::Model.to_db_string(),
                scan_id,
                element_id
            ],
        )?;
        Ok(updated > 0)
    }

    fn override_tier(
        &mut self,
        scan_id: &str,
        element_id: i64,
        tier: ValueTier,
        reason: &str,
    ) -> StorageResult<()> {
        let updated = self.conn.execute(
            "UPDATE elements SET value_tier = ?1, value_reason = ?2, tier_source = ?3
             WHERE scan_id = ?4 AND id = ?5",
            params![
                tier.as_str(),
                reason,
                TierSource::Manual.to_db_string(),
                scan_id,
                element_id
            ],
        )?;
        if updated == 0 {
            return Err(StorageError::ElementNotFound {
                scan_id: scan_id.to_string(),
                element_id,
            });
        }
        Ok(())
    }

    fn count_tiers(&self, scan_id: &str) -> StorageResult<TierCounts> {
        let mut stmt = self.conn.prepare(
            "SELECT value_tier, COUNT(*) FROM elements WHERE scan_id = ?1 GROUP BY value_tier",
        )?;

        let rows = stmt.query_map(params![scan_id], |row| {
            Ok((row.get::<_, Option<String>>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut counts = TierCounts::default();
        for row in rows {
            let (tier, count) = row?;
            let count = count as u64;
            counts.total += count;
            match tier.as_deref().and_then(ValueTier::parse) {
                Some(ValueTier::Hva) => counts.hva += count,
                Some(ValueTier::Mva) => counts.mva += count,
                Some(ValueTier::Lva) => counts.lva += count,
                None => counts.untiered += count,
            }
        }

        Ok(counts)
    }
}
