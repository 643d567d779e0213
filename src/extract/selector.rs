//! CSS selector generation and normalization

use crate::extract::snapshot::DomSnapshot;

/// Maximum selector length
pub const MAX_SELECTOR_CHARS: usize = 500;

const MAX_SELECTOR_DEPTH: usize = 5;
const MAX_CLASSES: usize = 2;
const MAX_CLASS_CHARS: usize = 40;

/// Escapes an identifier the way `CSS.escape` does
pub fn css_escape(ident: &str) -> String {
    let chars: Vec<char> = ident.chars().collect();
    let mut out = String::with_capacity(ident.len());

    for (i, &c) in chars.iter().enumerate() {
        let code = c as u32;
        if c == '\0' {
            out.push('\u{FFFD}');
        } else if (1..=0x1f).contains(&code)
            || code == 0x7f
            || (i == 0 && c.is_ascii_digit())
            || (i == 1 && c.is_ascii_digit() && chars[0] == '-')
        {
            out.push_str(&format!("\\{:x} ", code));
        } else if i == 0 && c == '-' && chars.len() == 1 {
            out.push_str("\\-");
        } else if code >= 0x80 || c == '-' || c == '_' || c.is_ascii_alphanumeric() {
            out.push(c);
        } else {
            out.push('\\');
            out.push(c);
        }
    }

    out
}

/// 1-based position among same-tag element siblings, when there is more than one
fn nth_of_type(snapshot: &DomSnapshot, index: usize) -> Option<usize> {
    let parent = snapshot.parent(index)?;
    let tag = &snapshot.node(index)?.tag;
    let same: Vec<usize> = snapshot
        .element_children(parent)
        .filter(|&c| snapshot.node(c).map_or(false, |n| &n.tag == tag))
        .collect();

    if same.len() > 1 {
        same.iter().position(|&c| c == index).map(|p| p + 1)
    } else {
        None
    }
}

/// Builds a CSS selector for the node at `index`
///
/// `#id` when the node has an id. Otherwise up to five levels of
/// `tag.class1.class2:nth-of-type(n)` joined with ` > `, stopping at the
/// first ancestor with an id (emitted as `#id`) or at `<body>`.
pub fn css_selector(snapshot: &DomSnapshot, index: usize) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut current = Some(index);
    let mut depth = 0;

    while let Some(i) = current {
        if depth >= MAX_SELECTOR_DEPTH {
            break;
        }
        let Some(node) = snapshot.node(i) else {
            break;
        };
        if node.tag == "body" {
            break;
        }

        if let Some(id) = node.attr("id").filter(|id| !id.is_empty()) {
            parts.push(format!("#{}", css_escape(id)));
            break;
        }

        let mut part = node.tag.clone();
        let classes: Vec<String> = node
            .classes()
            .filter(|c| c.chars().count() < MAX_CLASS_CHARS && !c.contains(':'))
            .take(MAX_CLASSES)
            .map(css_escape)
            .collect();
        if !classes.is_empty() {
            part.push('.');
            part.push_str(&classes.join("."));
        }
        if let Some(n) = nth_of_type(snapshot, i) {
            part.push_str(&format!(":nth-of-type({})", n));
        }

        parts.push(part);
        current = snapshot.parent(i);
        depth += 1;
    }

    if parts.is_empty() {
        return snapshot
            .node(index)
            .map(|n| n.tag.clone())
            .unwrap_or_default();
    }

    parts.reverse();
    parts
        .join(" > ")
        .chars()
        .take(MAX_SELECTOR_CHARS)
        .collect()
}

/// Removes every `:{pseudo}(...)` occurrence from a selector
fn strip_pseudo(selector: &str, pseudo: &str) -> String {
    let mut out = String::with_capacity(selector.len());
    let mut rest = selector;

    while let Some(start) = rest.find(pseudo) {
        out.push_str(&rest[..start]);
        let after = &rest[start + pseudo.len()..];
        match after.find(')') {
            Some(end) => rest = &after[end + 1..],
            None => {
                rest = "";
            }
        }
    }

    out.push_str(rest);
    out
}

/// Selector form used for fingerprinting: lowercase, positional indices removed
pub fn normalize_selector(selector: &str) -> String {
    let lower = selector.to_lowercase();
    let without_type = strip_pseudo(&lower, ":nth-of-type(");
    strip_pseudo(&without_type, ":nth-child(")
}
