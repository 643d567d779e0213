//! Priority-ordered element classification
//!
//! The first matching rule decides a node's type, so explicit structural
//! markers (forms, tabs, menus, disclosure widgets) outrank the generic link
//! and button rules they are often built from.

use crate::extract::snapshot::{DomNode, DomSnapshot};
use crate::state::{ActionType, ElementType};
use crate::url::is_document_url;

/// ARIA roles for interactive widgets that have no dedicated element type
const WIDGET_ROLES: &[&str] = &[
    "checkbox",
    "combobox",
    "gridcell",
    "listbox",
    "option",
    "radio",
    "scrollbar",
    "searchbox",
    "slider",
    "spinbutton",
    "switch",
    "textbox",
    "treeitem",
];

const BUTTON_INPUT_TYPES: &[&str] = &["button", "submit", "reset", "image"];

fn has_class(node: &DomNode, predicate: impl Fn(&str) -> bool) -> bool {
    node.classes().any(|c| predicate(&c.to_ascii_lowercase()))
}

fn is_tab_class(class: &str) -> bool {
    class == "tab"
        || class == "tablinks"
        || class.starts_with("tab-")
        || class.ends_with("-tab")
        || class.ends_with("__tab")
}

fn is_menu_item_class(class: &str) -> bool {
    class == "menuitem"
        || class.contains("menu-item")
        || class.contains("menu__item")
        || class.contains("dropdown-item")
}

fn is_accordion_class(class: &str) -> bool {
    (class.contains("accordion") || class.contains("collaps"))
        && ["button", "toggle", "trigger", "header", "heading", "title"]
            .iter()
            .any(|part| class.contains(part))
}

fn input_type(node: &DomNode) -> Option<String> {
    node.attr("type").map(|t| t.trim().to_ascii_lowercase())
}

/// Type of a `<button>`; the HTML default is `submit`
fn button_type(node: &DomNode) -> String {
    input_type(node)
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "submit".to_string())
}

fn classify_anchor(snapshot: &DomSnapshot, node: &DomNode, href: &str) -> (ElementType, ActionType) {
    let lower = href.trim().to_ascii_lowercase();

    if lower.starts_with("mailto:") || lower.starts_with("tel:") {
        return (ElementType::Link, ActionType::Other);
    }

    let is_document = snapshot
        .url
        .join(href.trim())
        .map(|target| is_document_url(&target))
        .unwrap_or(false);

    if is_document || node.has_attr("download") {
        (ElementType::Download, ActionType::Download)
    } else {
        (ElementType::Link, ActionType::Navigate)
    }
}

/// Decides whether a node is interactive and, if so, what kind
///
/// # Arguments
///
/// * `snapshot` - The page snapshot (used to resolve link targets)
/// * `index` - Index of the node to classify
///
/// # Returns
///
/// * `Some((ElementType, ActionType))` - The first rule that matched
/// * `None` - The node is not interactive
pub fn classify(snapshot: &DomSnapshot, index: usize) -> Option<(ElementType, ActionType)> {
    let node = snapshot.node(index)?;
    if node.is_text() {
        return None;
    }

    let tag = node.tag.as_str();
    let role = node.role();
    let role = role.as_deref();

    // 1. Forms
    match tag {
        "form" => return Some((ElementType::Form, ActionType::Submit)),
        "select" => return Some((ElementType::Form, ActionType::Toggle)),
        _ => {}
    }

    // 2. Tabs
    if role == Some("tab") || has_class(node, is_tab_class) {
        return Some((ElementType::Tab, ActionType::Toggle));
    }

    // 3. Menu items
    if role.map_or(false, |r| r.starts_with("menuitem")) || has_class(node, is_menu_item_class) {
        return Some((ElementType::Menu, ActionType::Navigate));
    }

    // 4. Disclosure widgets
    if tag == "summary" {
        return Some((ElementType::Accordion, ActionType::Toggle));
    }
    if node.has_attr("aria-expanded") || has_class(node, is_accordion_class) {
        return Some((ElementType::Accordion, ActionType::Expand));
    }

    // 5. Links
    if tag == "a" {
        if let Some(href) = node.attr("href") {
            return Some(classify_anchor(snapshot, node, href));
        }
    }
    if role == Some("link") {
        return Some((ElementType::Link, ActionType::Navigate));
    }

    // 6. Buttons
    if tag == "button" {
        let action = if button_type(node) == "submit" {
            ActionType::Submit
        } else {
            ActionType::Other
        };
        return Some((ElementType::Button, action));
    }
    if tag == "input" {
        if let Some(kind) = input_type(node) {
            if BUTTON_INPUT_TYPES.contains(&kind.as_str()) {
                let action = if kind == "submit" || kind == "image" {
                    ActionType::Submit
                } else {
                    ActionType::Other
                };
                return Some((ElementType::Button, action));
            }
        }
    }
    if role == Some("button") || node.has_attr("onclick") || node.pointer {
        return Some((ElementType::Button, ActionType::Other));
    }

    // 7. Anything else that takes focus or declares a widget role
    let focusable = node
        .attr("tabindex")
        .and_then(|t| t.trim().parse::<i32>().ok())
        .map_or(false, |t| t >= 0);
    if focusable || role.map_or(false, |r| WIDGET_ROLES.contains(&r)) {
        return Some((ElementType::Unknown, ActionType::Other));
    }

    None
}
