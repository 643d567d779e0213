//! Scan-to-scan comparison
//!
//! Two scans are compared on their deduplicated elements, matched by
//! fingerprint alone. Text, selector and container changes produce a new
//! fingerprint, so an edited element shows up as one removal plus one
//! addition.

use crate::analysis::DedupGroup;
use crate::storage::ElementRecord;
use serde::Serialize;
use std::collections::HashSet;

/// Counts of a diff's three buckets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiffSummary {
    pub added: usize,
    pub removed: usize,
    pub unchanged: usize,
}

/// Difference between a baseline scan and a later scan
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiffResult {
    /// Baseline scan
    pub scan_a: String,
    /// Compared scan
    pub scan_b: String,
    /// In B but not in A
    pub added: Vec<ElementRecord>,
    /// In A but not in B
    pub removed: Vec<ElementRecord>,
    /// In both; records come from B
    pub unchanged: Vec<ElementRecord>,
    pub summary: DiffSummary,
}

/// Compares two deduplicated scans by fingerprint
///
/// # Arguments
///
/// * `scan_a` - ID of the baseline scan
/// * `groups_a` - Deduplicated elements of the baseline
/// * `scan_b` - ID of the compared scan
/// * `groups_b` - Deduplicated elements of the compared scan
///
/// # Returns
///
/// The diff, each bucket in the order of the scan it is drawn from
pub fn diff(
    scan_a: &str,
    groups_a: &[DedupGroup],
    scan_b: &str,
    groups_b: &[DedupGroup],
) -> DiffResult {
    let in_a: HashSet<&str> = groups_a.iter().map(|g| g.fingerprint.as_str()).collect();
    let in_b: HashSet<&str> = groups_b.iter().map(|g| g.fingerprint.as_str()).collect();

    let mut added = Vec::new();
    let mut unchanged = Vec::new();
    for group in groups_b {
        if in_a.contains(group.fingerprint.as_str()) {
            unchanged.push(group.representative.clone());
        } else {
            added.push(group.representative.clone());
        }
    }

    let removed: Vec<ElementRecord> = groups_a
        .iter()
        .filter(|g| !in_b.contains(g.fingerprint.as_str()))
        .map(|g| g.representative.clone())
        .collect();

    let summary = DiffSummary {
        added: added.len(),
        removed: removed.len(),
        unchanged: unchanged.len(),
    };

    DiffResult {
        scan_a: scan_a.to_string(),
        scan_b: scan_b.to_string(),
        added,
        removed,
        unchanged,
        summary,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::dedup;
    use crate::state::{ActionType, ElementType};

    fn element(fingerprint: &str, scan: &str) -> ElementRecord {
        ElementRecord {
            id: None,
            scan_id: scan.to_string(),
            page_url: "https://brand.com/".to_string(),
            element_type: ElementType::Button,
            action_type: ActionType::Submit,
            element_text: fingerprint.to_string(),
            css_selector: "button".to_string(),
            container_context: "main".to_string(),
            section_context: None,
            is_above_fold: true,
            target_url: None,
            is_external: false,
            pharma_context: None,
            fingerprint: fingerprint.to_string(),
            value_tier: None,
            value_reason: None,
            tier_source: None,
        }
    }

    fn fingerprints(records: &[ElementRecord]) -> HashSet<String> {
        records.iter().map(|r| r.fingerprint.clone()).collect()
    }

    #[test]
    fn test_diff_buckets() {
        let a = dedup(&[element("x", "a"), element("y", "a")]);
        let b = dedup(&[element("y", "b"), element("z", "b")]);

        let result = diff("a", &a, "b", &b);

        assert_eq!(fingerprints(&result.added), HashSet::from(["z".to_string()]));
        assert_eq!(fingerprints(&result.removed), HashSet::from(["x".to_string()]));
        assert_eq!(fingerprints(&result.unchanged), HashSet::from(["y".to_string()]));
        assert_eq!(result.unchanged[0].scan_id, "b");
        assert_eq!(
            result.summary,
            DiffSummary {
                added: 1,
                removed: 1,
                unchanged: 1
            }
        );
    }

    #[test]
    fn test_diff_symmetry() {
        let a = dedup(&[element("1", "a"), element("2", "a"), element("3", "a")]);
        let b = dedup(&[element("3", "b"), element("4", "b")]);

        let forward = diff("a", &a, "b", &b);
        let backward = diff("b", &b, "a", &a);

        assert_eq!(fingerprints(&forward.added), fingerprints(&backward.removed));
        assert_eq!(fingerprints(&forward.removed), fingerprints(&backward.added));
        assert_eq!(fingerprints(&forward.unchanged), fingerprints(&backward.unchanged));
    }

    #[test]
    fn test_diff_with_itself_is_unchanged() {
        let a = dedup(&[element("1", "a"), element("2", "a")]);
        let result = diff("a", &a, "a", &a);

        assert!(result.added.is_empty());
        assert!(result.removed.is_empty());
        assert_eq!(result.summary.unchanged, 2);
    }
}
