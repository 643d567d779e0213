//! Structural context of an element: landmark container, nearest heading,
//! and whether it renders above the fold

use crate::extract::snapshot::{DomNode, DomSnapshot, Viewport};

/// Container reported when no landmark encloses an element
pub const UNKNOWN_CONTAINER: &str = "unknown";

/// Maximum length of a section heading
pub const MAX_SECTION_CHARS: usize = 200;

const MAX_HEADING_ANCESTORS: usize = 10;
const MAX_HEADING_SIBLINGS: usize = 5;
const SECTION_CONTAINERS: &[&str] = &["section", "article", "main", "aside"];

fn is_body(node: &DomNode) -> bool {
    node.tag == "body"
}

fn is_heading(node: &DomNode) -> bool {
    matches!(node.tag.as_str(), "h1" | "h2" | "h3")
}

fn landmark(node: &DomNode) -> Option<&'static str> {
    let role = node.role();
    match (node.tag.as_str(), role.as_deref()) {
        ("header", _) | (_, Some("banner")) => Some("header"),
        ("nav", _) | (_, Some("navigation")) => Some("nav"),
        ("main", _) | (_, Some("main")) => Some("main"),
        ("footer", _) | (_, Some("contentinfo")) => Some("footer"),
        ("aside", _) | (_, Some("complementary")) => Some("aside"),
        ("dialog", _) | (_, Some("dialog")) => Some("dialog"),
        _ => None,
    }
}

/// Nearest enclosing landmark of `index`
///
/// # Returns
///
/// One of `header`, `nav`, `main`, `footer`, `aside`, `dialog`, or `unknown`
pub fn container_context(snapshot: &DomSnapshot, index: usize) -> &'static str {
    for ancestor in snapshot.ancestors(index) {
        let Some(node) = snapshot.node(ancestor) else {
            break;
        };
        if is_body(node) {
            break;
        }
        if let Some(name) = landmark(node) {
            return name;
        }
    }
    UNKNOWN_CONTAINER
}

fn heading_text(snapshot: &DomSnapshot, index: usize) -> Option<String> {
    let text: String = snapshot
        .text_content(index)
        .chars()
        .take(MAX_SECTION_CHARS)
        .collect();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Text of the heading closest above `index` in document order
///
/// Walks up to ten ancestors. At each level up to five preceding siblings
/// are checked, nearest first: a heading sibling wins, otherwise the last
/// heading nested inside the sibling. When nothing is found, the first
/// heading of the enclosing section, article, main or aside is used.
pub fn section_context(snapshot: &DomSnapshot, index: usize) -> Option<String> {
    let mut current = index;

    for _ in 0..MAX_HEADING_ANCESTORS {
        match snapshot.node(current) {
            Some(node) if !is_body(node) => {}
            _ => break,
        }

        for sibling in snapshot
            .preceding_siblings(current)
            .into_iter()
            .take(MAX_HEADING_SIBLINGS)
        {
            let Some(node) = snapshot.node(sibling) else {
                continue;
            };

            if is_heading(node) {
                if let Some(text) = heading_text(snapshot, sibling) {
                    return Some(text);
                }
                continue;
            }

            let nested = snapshot
                .descendants(sibling)
                .into_iter()
                .filter(|&d| snapshot.node(d).map_or(false, is_heading))
                .filter_map(|d| heading_text(snapshot, d))
                .last();
            if nested.is_some() {
                return nested;
            }
        }

        match snapshot.parent(current) {
            Some(parent) => current = parent,
            None => break,
        }
    }

    let container = snapshot.ancestors(index).find(|&a| {
        snapshot
            .node(a)
            .map_or(false, |n| SECTION_CONTAINERS.contains(&n.tag.as_str()))
    })?;

    snapshot
        .descendants(container)
        .into_iter()
        .filter(|&d| snapshot.node(d).map_or(false, is_heading))
        .find_map(|d| heading_text(snapshot, d))
}

/// Whether the node's box intersects the first viewport
///
/// Nodes without a box (static HTML) are never above the fold.
pub fn is_above_fold(node: &DomNode, viewport: &Viewport) -> bool {
    match node.rect {
        Some(rect) => node.visible && rect.top < f64::from(viewport.height) && rect.bottom() > 0.0,
        None => false,
    }
}
