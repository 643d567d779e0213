//! Index-addressed DOM snapshot
//!
//! A page is captured once into a flat node array in document order. Each
//! node points at its parent by index, and a valid parent always precedes
//! its child. Text runs are kept as `#text` nodes so text order survives.
//! Every context function in the extractor works on indices into this
//! array, so no live browser handle is needed after capture.

use crate::extract::ExtractionError;
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use std::collections::BTreeMap;
use url::Url;

/// Upper bound on captured nodes per page
pub const MAX_NODES: usize = 20_000;

/// Tags whose subtrees never contain interactive content
const SKIPPED_TAGS: &[&str] = &["script", "style", "noscript", "template"];

/// Browser viewport dimensions in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// Element bounding box relative to the top of the document at capture time
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Rect {
    pub top: f64,
    pub left: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }
}

/// Tag used for text runs
pub const TEXT_TAG: &str = "#text";

/// One node of the captured document
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DomNode {
    /// Lowercase tag name, or `#text`
    pub tag: String,
    #[serde(default)]
    pub attrs: BTreeMap<String, String>,
    /// Whitespace-collapsed text of a `#text` node; empty on elements
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub parent: Option<usize>,
    #[serde(default)]
    pub rect: Option<Rect>,
    #[serde(default = "default_visible")]
    pub visible: bool,
    /// Cursor turns into a pointer on this node but not on its parent
    #[serde(default)]
    pub pointer: bool,
}

fn default_visible() -> bool {
    true
}

impl DomNode {
    pub fn is_text(&self) -> bool {
        self.tag == TEXT_TAG
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attrs.contains_key(name)
    }

    /// Whitespace-separated tokens of the class attribute
    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attr("class").unwrap_or("").split_whitespace()
    }

    /// The role attribute, lowercased
    pub fn role(&self) -> Option<String> {
        self.attr("role")
            .map(|r| r.trim().to_ascii_lowercase())
            .filter(|r| !r.is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct CapturedViewport {
    #[serde(alias = "innerWidth")]
    width: u32,
    #[serde(alias = "innerHeight")]
    height: u32,
}

#[derive(Debug, Deserialize)]
struct CapturedPage {
    viewport: CapturedViewport,
    nodes: Vec<DomNode>,
}

/// A captured page
#[derive(Debug, Clone)]
pub struct DomSnapshot {
    /// Final URL of the page; relative links resolve against it
    pub url: Url,
    pub viewport: Viewport,
    nodes: Vec<DomNode>,
    children: Vec<Vec<usize>>,
}

impl DomSnapshot {
    /// Builds a snapshot from a node array, indexing children of valid nodes
    pub fn new(url: Url, viewport: Viewport, mut nodes: Vec<DomNode>) -> Self {
        nodes.truncate(MAX_NODES);
        let mut children = vec![Vec::new(); nodes.len()];
        for (index, node) in nodes.iter().enumerate() {
            if let Some(parent) = node.parent {
                if parent < index {
                    children[parent].push(index);
                }
            }
        }

        Self {
            url,
            viewport,
            nodes,
            children,
        }
    }

    /// Parses the JSON produced by the in-page capture script
    ///
    /// # Arguments
    ///
    /// * `url` - Final URL of the captured page
    /// * `json` - `{"viewport": {...}, "nodes": [...]}`
    ///
    /// # Returns
    ///
    /// * `Ok(DomSnapshot)` - The parsed snapshot
    /// * `Err(ExtractionError)` - The payload is not a valid capture
    pub fn from_capture_json(url: Url, json: &str) -> Result<Self, ExtractionError> {
        let page: CapturedPage =
            serde_json::from_str(json).map_err(|e| ExtractionError::Capture(e.to_string()))?;

        let viewport = Viewport {
            width: page.viewport.width,
            height: page.viewport.height,
        };

        Ok(Self::new(url, viewport, page.nodes))
    }

    /// Builds a snapshot from static HTML
    ///
    /// There is no layout, so nodes carry no boxes. Visibility comes from the
    /// `hidden` attribute, inline `display:none`/`visibility:hidden`, and
    /// hidden inputs, and is inherited by descendants. Inline
    /// `cursor:pointer` marks pointer nodes.
    ///
    /// # Arguments
    ///
    /// * `url` - URL the HTML was served from
    /// * `html` - The document source
    /// * `viewport` - Viewport recorded on the snapshot
    pub fn from_html(url: Url, html: &str, viewport: Viewport) -> Self {
        let document = Html::parse_document(html);
        let mut nodes = Vec::new();

        let body = Selector::parse("body")
            .ok()
            .and_then(|selector| document.select(&selector).next());
        let root = body.unwrap_or_else(|| document.root_element());

        walk_element(root, None, true, &mut nodes);

        Self::new(url, viewport, nodes)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[DomNode] {
        &self.nodes
    }

    pub fn node(&self, index: usize) -> Option<&DomNode> {
        self.nodes.get(index)
    }

    /// Children of `index` in document order
    pub fn children(&self, index: usize) -> &[usize] {
        self.children.get(index).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Parent of `index`, if it has a valid one
    pub fn parent(&self, index: usize) -> Option<usize> {
        self.nodes
            .get(index)
            .and_then(|node| node.parent)
            .filter(|&parent| parent < index)
    }

    /// Ancestors of `index`, nearest first
    pub fn ancestors(&self, index: usize) -> Ancestors<'_> {
        Ancestors {
            snapshot: self,
            current: index,
        }
    }

    /// Element siblings that come before `index`, nearest first
    pub fn preceding_siblings(&self, index: usize) -> Vec<usize> {
        let Some(parent) = self.parent(index) else {
            return Vec::new();
        };
        let siblings: Vec<usize> = self.element_children(parent).collect();
        match siblings.iter().position(|&s| s == index) {
            Some(pos) => siblings[..pos].iter().rev().copied().collect(),
            None => Vec::new(),
        }
    }

    /// All descendants of `index` in document order
    pub fn descendants(&self, index: usize) -> Vec<usize> {
        let mut out = Vec::new();
        let mut stack: Vec<usize> = self.children(index).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev());
        }
        out
    }

    /// Visible text under `index` in document order, whitespace-collapsed
    pub fn text_content(&self, index: usize) -> String {
        let mut parts = Vec::new();
        if let Some(node) = self.node(index) {
            if node.is_text() {
                return node.text.clone();
            }
        }
        for descendant in self.descendants(index) {
            if let Some(node) = self.node(descendant) {
                if node.is_text() && node.visible && !node.text.is_empty() {
                    parts.push(node.text.as_str());
                }
            }
        }
        collapse_whitespace(&parts.join(" "))
    }

    /// Element children of `index`, skipping text runs
    pub fn element_children(&self, index: usize) -> impl Iterator<Item = usize> + '_ {
        self.children(index)
            .iter()
            .copied()
            .filter(move |&child| self.node(child).map_or(false, |n| !n.is_text()))
    }

    /// Checks that a node can be processed
    pub fn validate(&self, index: usize) -> Result<(), ExtractionError> {
        let node = self
            .nodes
            .get(index)
            .ok_or(ExtractionError::MissingNode { index })?;

        if node.tag.trim().is_empty() {
            return Err(ExtractionError::EmptyTag { index });
        }

        if let Some(parent) = node.parent {
            if parent >= index {
                return Err(ExtractionError::MalformedParent { index, parent });
            }
        }

        Ok(())
    }

    /// Finds the first node whose id attribute equals `id`
    pub fn find_by_id(&self, id: &str) -> Option<usize> {
        self.nodes.iter().position(|node| node.attr("id") == Some(id))
    }
}

/// Iterator over a node's ancestors, nearest first
pub struct Ancestors<'a> {
    snapshot: &'a DomSnapshot,
    current: usize,
}

impl Iterator for Ancestors<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let parent = self.snapshot.parent(self.current)?;
        self.current = parent;
        Some(parent)
    }
}

/// Collapses runs of whitespace to single spaces and trims the ends
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_hidden_by_markup(el: &ElementRef<'_>) -> bool {
    let element = el.value();
    if element.attr("hidden").is_some() {
        return true;
    }
    if element.name() == "input"
        && element
            .attr("type")
            .map_or(false, |t| t.eq_ignore_ascii_case("hidden"))
    {
        return true;
    }
    if element.attr("aria-hidden") == Some("true") {
        return true;
    }
    let style = inline_style(el);
    style.contains("display:none") || style.contains("visibility:hidden")
}

fn inline_style(el: &ElementRef<'_>) -> String {
    el.value()
        .attr("style")
        .unwrap_or("")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_lowercase()
}

fn walk_element(
    el: ElementRef<'_>,
    parent: Option<usize>,
    parent_visible: bool,
    nodes: &mut Vec<DomNode>,
) {
    if nodes.len() >= MAX_NODES {
        return;
    }

    let tag = el.value().name().to_ascii_lowercase();
    if SKIPPED_TAGS.contains(&tag.as_str()) {
        return;
    }

    let visible = parent_visible && !is_hidden_by_markup(&el);
    let pointer = inline_style(&el).contains("cursor:pointer");

    let attrs = el
        .value()
        .attrs()
        .map(|(name, value)| (name.to_ascii_lowercase(), value.to_string()))
        .collect();

    let index = nodes.len();
    nodes.push(DomNode {
        tag,
        attrs,
        text: String::new(),
        parent,
        rect: None,
        visible,
        pointer,
    });

    for child in el.children() {
        if nodes.len() >= MAX_NODES {
            return;
        }

        if let Some(text) = child.value().as_text() {
            let text = collapse_whitespace(text);
            if !text.is_empty() {
                nodes.push(DomNode {
                    tag: TEXT_TAG.to_string(),
                    attrs: BTreeMap::new(),
                    text,
                    parent: Some(index),
                    rect: None,
                    visible,
                    pointer: false,
                });
            }
        } else if let Some(child_el) = ElementRef::wrap(child) {
            walk_element(child_el, Some(index), visible, nodes);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page_url() -> Url {
        Url::parse("https://brand.com/").unwrap()
    }

    fn viewport() -> Viewport {
        Viewport {
            width: 1280,
            height: 800,
        }
    }

    #[test]
    fn test_from_html_walks_body_in_order() {
        let html = r#"<html><head><title>T</title></head><body>
            <nav><a href="/a">A</a></nav>
            <main><h1>Title</h1><button>Go</button></main>
            <script>var x = "<a href='/fake'>";</script>
        </body></html>"#;
        let snapshot = DomSnapshot::from_html(page_url(), html, viewport());

        let tags: Vec<&str> = snapshot
            .nodes()
            .iter()
            .filter(|n| !n.is_text())
            .map(|n| n.tag.as_str())
            .collect();
        assert_eq!(tags, vec!["body", "nav", "a", "main", "h1", "button"]);

        let link = snapshot.nodes().iter().position(|n| n.tag == "a").unwrap();
        assert_eq!(snapshot.node(snapshot.parent(link).unwrap()).unwrap().tag, "nav");
        assert_eq!(snapshot.text_content(link), "A");

        let main = snapshot.nodes().iter().position(|n| n.tag == "main").unwrap();
        assert_eq!(snapshot.element_children(main).count(), 2);
    }

    #[test]
    fn test_from_html_visibility_inherited() {
        let html = r#"<body>
            <div style="display: none"><a href="/x">Hidden</a></div>
            <div hidden><button>Also hidden</button></div>
            <input type="hidden" name="csrf">
            <a href="/y">Shown</a>
        </body>"#;
        let snapshot = DomSnapshot::from_html(page_url(), html, viewport());

        let visible: Vec<(&str, bool)> = snapshot
            .nodes()
            .iter()
            .filter(|n| !n.is_text())
            .map(|n| (n.tag.as_str(), n.visible))
            .collect();
        assert_eq!(
            visible,
            vec![
                ("body", true),
                ("div", false),
                ("a", false),
                ("div", false),
                ("button", false),
                ("input", false),
                ("a", true),
            ]
        );
    }

    #[test]
    fn test_text_content_includes_descendants() {
        let html = r#"<body><a href="/x">Learn <strong>more</strong>  today</a></body>"#;
        let snapshot = DomSnapshot::from_html(page_url(), html, viewport());
        let link = snapshot.nodes().iter().position(|n| n.tag == "a").unwrap();
        assert_eq!(snapshot.text_content(link), "Learn more today");
    }

    #[test]
    fn test_ancestors_and_siblings() {
        let html = r#"<body><section><h2>One</h2><p>x</p><div><a href="/">Go</a></div></section></body>"#;
        let snapshot = DomSnapshot::from_html(page_url(), html, viewport());

        let link = snapshot.nodes().iter().position(|n| n.tag == "a").unwrap();
        let ancestors: Vec<&str> = snapshot
            .ancestors(link)
            .map(|i| snapshot.node(i).unwrap().tag.as_str())
            .collect();
        assert_eq!(ancestors, vec!["div", "section", "body"]);

        let div = snapshot.parent(link).unwrap();
        let siblings: Vec<&str> = snapshot
            .preceding_siblings(div)
            .into_iter()
            .map(|i| snapshot.node(i).unwrap().tag.as_str())
            .collect();
        assert_eq!(siblings, vec!["p", "h2"]);
    }

    #[test]
    fn test_from_capture_json() {
        let json = r##"{
            "viewport": {"innerWidth": 1024, "innerHeight": 700},
            "nodes": [
                {"tag": "body", "attrs": {}, "text": "", "parent": null, "rect": null, "visible": true, "pointer": false},
                {"tag": "a", "attrs": {"href": "/a"}, "text": "", "parent": 0,
                 "rect": {"top": 10, "left": 0, "width": 50, "height": 20}, "visible": true, "pointer": false},
                {"tag": "#text", "text": "A", "parent": 1}
            ]
        }"##;
        let snapshot = DomSnapshot::from_capture_json(page_url(), json).unwrap();

        assert_eq!(snapshot.viewport.height, 700);
        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot.node(1).unwrap().rect.unwrap().bottom(), 30.0);
        assert_eq!(snapshot.children(0), &[1]);
        assert_eq!(snapshot.text_content(1), "A");
    }

    #[test]
    fn test_from_capture_json_rejects_garbage() {
        let result = DomSnapshot::from_capture_json(page_url(), "not json");
        assert!(matches!(result, Err(ExtractionError::Capture(_))));
    }

    #[test]
    fn test_validate_malformed_parent() {
        let nodes = vec![
            DomNode {
                tag: "body".to_string(),
                attrs: BTreeMap::new(),
                text: String::new(),
                parent: None,
                rect: None,
                visible: true,
                pointer: false,
            },
            DomNode {
                tag: "a".to_string(),
                attrs: BTreeMap::new(),
                text: String::new(),
                parent: Some(5),
                rect: None,
                visible: true,
                pointer: false,
            },
            DomNode {
                tag: String::new(),
                attrs: BTreeMap::new(),
                text: String::new(),
                parent: Some(0),
                rect: None,
                visible: true,
                pointer: false,
            },
        ];
        let snapshot = DomSnapshot::new(page_url(), viewport(), nodes);

        assert!(snapshot.validate(0).is_ok());
        assert!(matches!(
            snapshot.validate(1),
            Err(ExtractionError::MalformedParent { index: 1, parent: 5 })
        ));
        assert!(matches!(
            snapshot.validate(2),
            Err(ExtractionError::EmptyTag { index: 2 })
        ));
        assert_eq!(snapshot.parent(1), None);
    }
}
