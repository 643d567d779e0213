//! Element extraction
//!
//! Turns a [`DomSnapshot`] into ordered [`ElementRecord`]s. Each interactive
//! node is classified, labelled, placed in its landmark and section context,
//! and fingerprinted. Context tagging happens later in the pipeline, so
//! records leave here with no `pharma_context`.

mod context;
mod fingerprint;
mod label;
mod rules;
mod selector;
pub mod snapshot;

pub use context::{container_context, is_above_fold, section_context, UNKNOWN_CONTAINER};
pub use fingerprint::fingerprint;
pub use label::element_label;
pub use rules::classify;
pub use selector::{css_escape, css_selector, normalize_selector};
pub use snapshot::{DomNode, DomSnapshot, Rect, Viewport};

use crate::storage::ElementRecord;
use crate::url::is_external;
use std::collections::HashSet;
use thiserror::Error;
use url::Url;

/// Problems with a captured page or one of its nodes
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("Invalid DOM capture: {0}")]
    Capture(String),

    #[error("Node {index} does not exist")]
    MissingNode { index: usize },

    #[error("Node {index} has an empty tag")]
    EmptyTag { index: usize },

    #[error("Node {index} references parent {parent}, which does not precede it")]
    MalformedParent { index: usize, parent: usize },
}

/// Extracts element records from page snapshots of one scan
#[derive(Debug, Clone)]
pub struct Extractor {
    root_domain: String,
}

impl Extractor {
    /// Creates an extractor for a scan rooted at `root_domain`
    ///
    /// `root_domain` is compared exactly against target hosts to decide
    /// `is_external`.
    pub fn new(root_domain: impl Into<String>) -> Self {
        Self {
            root_domain: root_domain.into().to_ascii_lowercase(),
        }
    }

    pub fn root_domain(&self) -> &str {
        &self.root_domain
    }

    /// Extracts the interactive elements of a page in document order
    ///
    /// Malformed nodes are logged and skipped. Invisible nodes and nodes with
    /// an empty box are skipped. A node is emitted once per
    /// `(element_type, selector)` pair.
    ///
    /// # Arguments
    ///
    /// * `scan_id` - Owning scan
    /// * `page_url` - Normalized URL of the page, stored on each record
    /// * `snapshot` - The captured page
    ///
    /// # Returns
    ///
    /// The element records, without ids, tiers or tags
    pub fn extract(&self, scan_id: &str, page_url: &str, snapshot: &DomSnapshot) -> Vec<ElementRecord> {
        let mut records = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        for (index, node) in snapshot.nodes().iter().enumerate() {
            if node.is_text() {
                continue;
            }

            if let Err(e) = snapshot.validate(index) {
                tracing::warn!("Skipping node on {}: {}", page_url, e);
                continue;
            }

            if !node.visible {
                continue;
            }
            if let Some(rect) = node.rect {
                if rect.width <= 0.0 && rect.height <= 0.0 {
                    continue;
                }
            }

            let Some((element_type, action_type)) = classify(snapshot, index) else {
                continue;
            };

            let css = css_selector(snapshot, index);
            if !seen.insert(format!("{}:{}", element_type.as_str(), css)) {
                continue;
            }

            let text = element_label(snapshot, index);
            let container = container_context(snapshot, index);
            let target = self.target_url(snapshot, node);
            let is_external = target
                .as_ref()
                .map_or(false, |t| is_external(t, &self.root_domain));

            records.push(ElementRecord {
                id: None,
                scan_id: scan_id.to_string(),
                page_url: page_url.to_string(),
                element_type,
                action_type,
                fingerprint: fingerprint(element_type, &text, container, &css),
                element_text: text,
                css_selector: css,
                container_context: container.to_string(),
                section_context: section_context(snapshot, index),
                is_above_fold: is_above_fold(node, &snapshot.viewport),
                target_url: target.map(String::from),
                is_external,
                pharma_context: None,
                value_tier: None,
                value_reason: None,
                tier_source: None,
            });
        }

        tracing::debug!("Extracted {} elements from {}", records.len(), page_url);
        records
    }

    /// Absolute target of a link (`href`) or form (`action`)
    fn target_url(&self, snapshot: &DomSnapshot, node: &DomNode) -> Option<Url> {
        let raw = match node.tag.as_str() {
            "form" => node.attr("action"),
            _ => node.attr("href"),
        }?
        .trim();

        if raw.is_empty() || raw.to_ascii_lowercase().starts_with("javascript:") {
            return None;
        }

        snapshot.url.join(raw).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{ActionType, ElementType};
    use std::collections::BTreeMap;

    fn viewport() -> Viewport {
        Viewport {
            width: 1280,
            height: 800,
        }
    }

    fn extract(html: &str) -> Vec<ElementRecord> {
        let snapshot = DomSnapshot::from_html(
            Url::parse("https://brand.com/page").unwrap(),
            html,
            viewport(),
        );
        Extractor::new("brand.com").extract("scan-1", "https://brand.com/page", &snapshot)
    }

    #[test]
    fn test_extract_basic_page() {
        let records = extract(
            r#"<html><body>
                <header><nav><a href="/about">About</a></nav></header>
                <main>
                    <h2>Safety information</h2>
                    <a href="https://other.com/x">Partner</a>
                    <button type="button">Show more</button>
                    <a href="/pi.pdf">Prescribing Information</a>
                </main>
            </body></html>"#,
        );

        assert_eq!(records.len(), 4);

        assert_eq!(records[0].element_type, ElementType::Link);
        assert_eq!(records[0].element_text, "About");
        assert_eq!(records[0].container_context, "nav");
        assert_eq!(records[0].target_url.as_deref(), Some("https://brand.com/about"));
        assert!(!records[0].is_external);
        assert_eq!(records[0].section_context, None);

        assert_eq!(records[1].element_text, "Partner");
        assert!(records[1].is_external);
        assert_eq!(records[1].container_context, "main");
        assert_eq!(records[1].section_context.as_deref(), Some("Safety information"));

        assert_eq!(records[2].element_type, ElementType::Button);
        assert_eq!(records[2].action_type, ActionType::Other);
        assert_eq!(records[2].target_url, None);
        assert!(!records[2].is_external);

        assert_eq!(records[3].element_type, ElementType::Download);
        assert_eq!(records[3].action_type, ActionType::Download);

        for record in &records {
            assert_eq!(record.scan_id, "scan-1");
            assert_eq!(record.page_url, "https://brand.com/page");
            assert_eq!(record.fingerprint.len(), 32);
            assert!(record.pharma_context.is_none());
            assert!(!record.is_above_fold);
        }
    }

    #[test]
    fn test_extract_skips_hidden() {
        let records = extract(
            r#"<body>
                <a href="/a" hidden>Hidden</a>
                <div style="display: none"><a href="/b">Inside hidden</a></div>
                <a href="/c" aria-hidden="true">Aria hidden</a>
                <a href="/d">Shown</a>
            </body>"#,
        );
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].element_text, "Shown");
    }

    #[test]
    fn test_extract_is_deterministic() {
        let html = r#"<body><nav><ul><li><a href="/a">A</a></li><li><a href="/b">B</a></li></ul></nav>
            <form action="/search"><input name="q"><button>Go</button></form></body>"#;
        let first = extract(html);
        let second = extract(html);
        assert_eq!(first, second);
        assert_eq!(first.len(), 4);
        assert_eq!(first[2].element_type, ElementType::Form);
        assert_eq!(first[2].target_url.as_deref(), Some("https://brand.com/search"));
    }

    #[test]
    fn test_javascript_href_has_no_target() {
        let records = extract(r#"<body><a href="javascript:void(0)">Open</a></body>"#);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].target_url, None);
        assert!(!records[0].is_external);
    }

    fn element(tag: &str, parent: Option<usize>, attrs: &[(&str, &str)]) -> DomNode {
        DomNode {
            tag: tag.to_string(),
            attrs: attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<_, _>>(),
            text: String::new(),
            parent,
            rect: None,
            visible: true,
            pointer: false,
        }
    }

    fn text(parent: usize, value: &str) -> DomNode {
        DomNode {
            tag: snapshot::TEXT_TAG.to_string(),
            attrs: BTreeMap::new(),
            text: value.to_string(),
            parent: Some(parent),
            rect: None,
            visible: true,
            pointer: false,
        }
    }

    #[test]
    fn test_malformed_nodes_are_skipped() {
        let nodes = vec![
            element("body", None, &[]),
            element("a", Some(5), &[("href", "/bad")]),
            element("", Some(0), &[("onclick", "x()")]),
            element("a", Some(0), &[("href", "/good")]),
            text(3, "Good"),
        ];
        let snapshot = DomSnapshot::new(Url::parse("https://brand.com/").unwrap(), viewport(), nodes);
        let records = Extractor::new("brand.com").extract("s", "https://brand.com/", &snapshot);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].element_text, "Good");
    }

    #[test]
    fn test_above_fold_and_zero_box() {
        let mut nodes = vec![
            element("body", None, &[]),
            element("a", Some(0), &[("href", "/top")]),
            text(1, "Top"),
            element("a", Some(0), &[("href", "/below")]),
            text(3, "Below"),
            element("a", Some(0), &[("href", "/collapsed")]),
            text(5, "Collapsed"),
        ];
        nodes[1].rect = Some(Rect {
            top: 10.0,
            left: 0.0,
            width: 100.0,
            height: 20.0,
        });
        nodes[3].rect = Some(Rect {
            top: 1500.0,
            left: 0.0,
            width: 100.0,
            height: 20.0,
        });
        nodes[5].rect = Some(Rect {
            top: 0.0,
            left: 0.0,
            width: 0.0,
            height: 0.0,
        });

        let snapshot = DomSnapshot::new(Url::parse("https://brand.com/").unwrap(), viewport(), nodes);
        let records = Extractor::new("brand.com").extract("s", "https://brand.com/", &snapshot);

        assert_eq!(records.len(), 2);
        assert!(records[0].is_above_fold);
        assert!(!records[1].is_above_fold);
    }

    #[test]
    fn test_same_type_and_selector_emitted_once() {
        let nodes = vec![
            element("body", None, &[]),
            element("a", Some(0), &[("href", "/x"), ("id", "dup")]),
            text(1, "One"),
            element("a", Some(0), &[("href", "/y"), ("id", "dup")]),
            text(3, "Two"),
        ];
        let snapshot = DomSnapshot::new(Url::parse("https://brand.com/").unwrap(), viewport(), nodes);
        let records = Extractor::new("brand.com").extract("s", "https://brand.com/", &snapshot);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].css_selector, "#dup");
    }
}
