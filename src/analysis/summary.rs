//! Scan summaries
//!
//! Aggregate counts over one scan's elements, for reporting.

use crate::analysis::dedup;
use crate::state::{ElementType, TierSource, ValueTier};
use crate::storage::{ElementRecord, ScanJob, TierCounts};
use serde::Serialize;
use std::collections::BTreeMap;

/// Label used for the default taxonomy
pub const DEFAULT_TAG_NAME: &str = "Pharma";

/// Aggregate view of one scan
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanSummary {
    pub scan_id: String,
    pub total_elements: usize,
    /// Distinct fingerprints across the scan
    pub unique_interactions: usize,
    pub by_type: BTreeMap<ElementType, usize>,
    /// Tagged elements per category; custom tags count under their name
    pub by_tag_category: BTreeMap<String, usize>,
    pub tagged: usize,
    pub tag_name: String,
    pub tiers: TierCounts,
    pub manual_overrides: usize,
    pub analytics_detected: Vec<String>,
}

/// Category part of a tag (`"isi"` or the name in `"name:keyword"`)
pub fn tag_category(tag: &str) -> &str {
    tag.split_once(':').map_or(tag, |(category, _)| category)
}

/// Builds the summary of a scan from its elements
///
/// # Arguments
///
/// * `scan` - The scan the elements belong to
/// * `elements` - All element records of the scan
pub fn summarize(scan: &ScanJob, elements: &[ElementRecord]) -> ScanSummary {
    let mut by_type = BTreeMap::new();
    let mut by_tag_category = BTreeMap::new();
    let mut tiers = TierCounts::default();
    let mut tagged = 0;
    let mut manual_overrides = 0;

    for element in elements {
        *by_type.entry(element.element_type).or_insert(0) += 1;

        if let Some(tag) = &element.pharma_context {
            tagged += 1;
            *by_tag_category
                .entry(tag_category(tag).to_string())
                .or_insert(0) += 1;
        }

        tiers.total += 1;
        match element.value_tier {
            Some(ValueTier::Hva) => tiers.hva += 1,
            Some(ValueTier::Mva) => tiers.mva += 1,
            Some(ValueTier::Lva) => tiers.lva += 1,
            None => tiers.untiered += 1,
        }

        if element.tier_source == Some(TierSource::Manual) {
            manual_overrides += 1;
        }
    }

    let tag_name = scan
        .config
        .custom_tag
        .as_ref()
        .map(|tag| tag.name.clone())
        .unwrap_or_else(|| DEFAULT_TAG_NAME.to_string());

    ScanSummary {
        scan_id: scan.id.clone(),
        total_elements: elements.len(),
        unique_interactions: dedup(elements).len(),
        by_type,
        by_tag_category,
        tagged,
        tag_name,
        tiers,
        manual_overrides,
        analytics_detected: scan.findings.analytics_detected.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CustomTagConfig, ScanConfig};
    use crate::state::{ActionType, ScanStatus};
    use crate::storage::ScanFindings;

    fn scan(custom_tag: Option<CustomTagConfig>) -> ScanJob {
        ScanJob {
            id: "scan".to_string(),
            seed_url: "https://brand.com/".to_string(),
            domain: "brand.com".to_string(),
            config: ScanConfig {
                max_pages: 10,
                max_depth: 2,
                rate_limit: 1.0,
                timeout_seconds: 60,
                custom_tag,
            },
            status: ScanStatus::Completed,
            pages_scanned: 2,
            total_pages: 2,
            created_at: "2024-01-01T00:00:00+00:00".to_string(),
            started_at: None,
            completed_at: None,
            notes: None,
            findings: ScanFindings {
                analytics_detected: vec!["GA4".to_string()],
                ..ScanFindings::default()
            },
        }
    }

    fn element(
        fingerprint: &str,
        element_type: ElementType,
        tag: Option<&str>,
        tier: Option<ValueTier>,
    ) -> ElementRecord {
        ElementRecord {
            id: None,
            scan_id: "scan".to_string(),
            page_url: "https://brand.com/".to_string(),
            element_type,
            action_type: ActionType::Other,
            element_text: String::new(),
            css_selector: "div".to_string(),
            container_context: "main".to_string(),
            section_context: None,
            is_above_fold: false,
            target_url: None,
            is_external: false,
            pharma_context: tag.map(str::to_string),
            fingerprint: fingerprint.to_string(),
            value_tier: tier,
            value_reason: None,
            tier_source: tier.map(|_| TierSource::Model),
        }
    }

    #[test]
    fn test_tag_category() {
        assert_eq!(tag_category("isi"), "isi");
        assert_eq!(tag_category("Oncology:tumor"), "Oncology");
    }

    #[test]
    fn test_summarize_counts() {
        let elements = vec![
            element("a", ElementType::Link, Some("isi"), Some(ValueTier::Hva)),
            element("a", ElementType::Link, Some("isi"), None),
            element("b", ElementType::Button, Some("hcp_gate"), Some(ValueTier::Lva)),
            element("c", ElementType::Form, None, None),
        ];

        let summary = summarize(&scan(None), &elements);

        assert_eq!(summary.total_elements, 4);
        assert_eq!(summary.unique_interactions, 3);
        assert_eq!(summary.by_type[&ElementType::Link], 2);
        assert_eq!(summary.by_type[&ElementType::Form], 1);
        assert_eq!(summary.by_tag_category["isi"], 2);
        assert_eq!(summary.tagged, 3);
        assert_eq!(summary.tag_name, DEFAULT_TAG_NAME);
        assert_eq!(summary.tiers.hva, 1);
        assert_eq!(summary.tiers.lva, 1);
        assert_eq!(summary.tiers.untiered, 2);
        assert_eq!(summary.analytics_detected, vec!["GA4"]);
    }

    #[test]
    fn test_summarize_custom_tag() {
        let tag = CustomTagConfig {
            name: "Oncology".to_string(),
            keywords: vec!["tumor".to_string()],
        };
        let elements = vec![
            element("a", ElementType::Link, Some("Oncology:tumor"), None),
            element("b", ElementType::Link, Some("Oncology:tumor"), None),
        ];

        let summary = summarize(&scan(Some(tag)), &elements);
        assert_eq!(summary.tag_name, "Oncology");
        assert_eq!(summary.by_tag_category["Oncology"], 2);
    }
}
