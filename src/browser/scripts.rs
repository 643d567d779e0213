//! In-page scripts evaluated by the Chromium driver

/// Serializes the document into the node array read by
/// `DomSnapshot::from_capture_json`
///
/// Nodes are emitted in document order starting at `<body>`. Each element
/// records its attributes, its box relative to the top of the document,
/// computed visibility, and whether it turns the cursor into a pointer
/// without inheriting it. Text runs become `#text` nodes.
pub const CAPTURE_DOM: &str = r#"(() => {
  const MAX_NODES = 20000;
  const SKIP = new Set(['SCRIPT', 'STYLE', 'NOSCRIPT', 'TEMPLATE']);
  const nodes = [];
  const scrollY = window.scrollY || 0;
  const scrollX = window.scrollX || 0;

  function visible(el, style) {
    if (el.hidden) return false;
    if (el.getAttribute('aria-hidden') === 'true') return false;
    if (style.display === 'none' || style.visibility === 'hidden') return false;
    if (parseFloat(style.opacity) === 0) return false;
    return true;
  }

  function walk(el, parent, parentVisible, parentCursor) {
    if (nodes.length >= MAX_NODES || SKIP.has(el.tagName)) return;
    const style = window.getComputedStyle(el);
    const isVisible = parentVisible && visible(el, style);
    const r = el.getBoundingClientRect();
    const attrs = {};
    for (const a of el.attributes) attrs[a.name.toLowerCase()] = a.value;
    const index = nodes.length;
    nodes.push({
      tag: el.tagName.toLowerCase(),
      attrs,
      parent,
      rect: { top: r.top + scrollY, left: r.left + scrollX, width: r.width, height: r.height },
      visible: isVisible,
      pointer: style.cursor === 'pointer' && parentCursor !== 'pointer',
    });
    for (const child of el.childNodes) {
      if (nodes.length >= MAX_NODES) return;
      if (child.nodeType === Node.TEXT_NODE) {
        const text = child.textContent.replace(/\s+/g, ' ').trim();
        if (text) nodes.push({ tag: '#text', text, parent: index, visible: isVisible });
      } else if (child.nodeType === Node.ELEMENT_NODE) {
        walk(child, index, isVisible, style.cursor);
      }
    }
  }

  if (document.body) walk(document.body, null, true, 'auto');
  return JSON.stringify({
    viewport: { width: window.innerWidth, height: window.innerHeight },
    nodes,
  });
})()"#;

/// Analytics and tag-management globals present on the page
pub const DETECT_ANALYTICS: &str = r#"(() => {
  const found = [];
  try { if (Array.isArray(window.dataLayer)) found.push('GTM'); } catch (e) {}
  try { if (window._satellite && typeof window._satellite.getVar === 'function') found.push('Adobe Launch'); } catch (e) {}
  try { if (window.utag) found.push('Tealium'); } catch (e) {}
  try { if (window.analytics && typeof window.analytics.track === 'function') found.push('Segment'); } catch (e) {}
  try { if (typeof window.gtag === 'function') found.push('GA4'); } catch (e) {}
  try { if (window.s && typeof window.s.t === 'function') found.push('Adobe Analytics'); } catch (e) {}
  try { if (typeof window.hj === 'function') found.push('Hotjar'); } catch (e) {}
  return found;
})()"#;

/// Status and content type of the current document
pub const PAGE_INFO: &str = r#"(() => {
  let status = null;
  try {
    const entry = performance.getEntriesByType('navigation')[0];
    if (entry && entry.responseStatus) status = entry.responseStatus;
  } catch (e) {}
  return { status, contentType: document.contentType || null, title: document.title || null };
})()"#;

/// Script testing whether `selector` matches anything
pub fn has_selector(selector: &str) -> String {
    format!(
        "(() => {{ try {{ return document.querySelector({}) !== null; }} catch (e) {{ return false; }} }})()",
        js_string(selector)
    )
}

/// Script clicking the first visible match of `selector`
pub fn click_visible(selector: &str) -> String {
    format!(
        r#"(() => {{
  let els;
  try {{ els = document.querySelectorAll({}); }} catch (e) {{ return false; }}
  for (const el of els) {{
    const r = el.getBoundingClientRect();
    const style = window.getComputedStyle(el);
    if (r.width > 0 && r.height > 0 && style.visibility !== 'hidden' && style.display !== 'none') {{
      el.click();
      return true;
    }}
  }}
  return false;
}})()"#,
        js_string(selector)
    )
}

/// Quotes `s` as a JavaScript string literal
fn js_string(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}
