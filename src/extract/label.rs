//! Accessible label resolution

use crate::extract::snapshot::{collapse_whitespace, DomSnapshot};

/// Maximum label length
pub const MAX_LABEL_CHARS: usize = 500;

/// Visible text at or above this length is only used as a last resort
const SHORT_TEXT_CHARS: usize = 200;

const TRUNCATED_TEXT_CHARS: usize = 197;

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(collapse_whitespace)
        .filter(|v| !v.is_empty())
}

fn clip(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Resolves the human-readable label of the element at `index`
///
/// Sources are tried in order: short visible text, `aria-label`, the text of
/// the `aria-labelledby` targets, `title`, a descendant image's `alt`, `value`,
/// `placeholder`, and finally long visible text truncated with `...`.
///
/// # Returns
///
/// The label, at most 500 characters; empty when no source yields text
pub fn element_label(snapshot: &DomSnapshot, index: usize) -> String {
    let Some(node) = snapshot.node(index) else {
        return String::new();
    };

    let text = snapshot.text_content(index);
    let text_len = text.chars().count();
    if text_len > 0 && text_len < SHORT_TEXT_CHARS {
        return clip(&text, MAX_LABEL_CHARS);
    }

    if let Some(label) = non_empty(node.attr("aria-label")) {
        return clip(&label, MAX_LABEL_CHARS);
    }

    if let Some(ids) = node.attr("aria-labelledby") {
        let joined = ids
            .split_whitespace()
            .filter_map(|id| snapshot.find_by_id(id))
            .map(|target| snapshot.text_content(target))
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if !joined.is_empty() {
            return clip(&joined, MAX_LABEL_CHARS);
        }
    }

    if let Some(title) = non_empty(node.attr("title")) {
        return clip(&title, MAX_LABEL_CHARS);
    }

    let alt = snapshot
        .descendants(index)
        .into_iter()
        .filter_map(|d| snapshot.node(d))
        .filter(|d| d.tag == "img")
        .find_map(|img| non_empty(img.attr("alt")));
    if let Some(alt) = alt {
        return clip(&alt, MAX_LABEL_CHARS);
    }

    for attr in ["value", "placeholder"] {
        if let Some(v) = non_empty(node.attr(attr)) {
            return clip(&v, MAX_LABEL_CHARS);
        }
    }

    if text_len > 0 {
        return format!("{}...", clip(&text, TRUNCATED_TEXT_CHARS));
    }

    String::new()
}
