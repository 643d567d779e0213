//! Context tagging
//!
//! Annotates element records with the first taxonomy category whose keyword
//! appears in the element's label, its section heading or its target URL.

mod taxonomy;

pub use taxonomy::{TagCategory, Taxonomy};

use crate::storage::ElementRecord;

/// Category assigned by URL hints under the default taxonomy
const URL_HINT_CATEGORY: &str = "isi";

/// URL fragments that mark prescribing information and medication guides
const URL_HINTS: &[&str] = &["prescribing", "medguide", "medication-guide", "medication_guide"];

/// Text matched against keywords: label, section heading and target URL,
/// lowercased and joined by newlines so no keyword spans two parts
fn haystack(record: &ElementRecord) -> String {
    let mut text = record.element_text.to_lowercase();
    for part in [&record.section_context, &record.target_url].into_iter().flatten() {
        text.push('\n');
        text.push_str(&part.to_lowercase());
    }
    text
}

/// Whether the URL path names a `pi` resource (`/pi`, `/pi/...`, `/pi.pdf`)
fn has_pi_segment(url: &str) -> bool {
    url.match_indices("/pi").any(|(pos, m)| {
        matches!(url[pos + m.len()..].chars().next(), None | Some('/') | Some('.') | Some('?') | Some('#'))
    })
}

fn url_hint(target: Option<&str>) -> bool {
    let Some(target) = target else {
        return false;
    };
    let lower = target.to_lowercase();
    URL_HINTS.iter().any(|hint| lower.contains(hint)) || has_pi_segment(&lower)
}

/// Finds the tag for one record
///
/// # Returns
///
/// * `Some("{category}")` - A default category matched
/// * `Some("{name}:{keyword}")` - The custom tag matched
/// * `None` - Nothing matched
pub fn detect_context(record: &ElementRecord, taxonomy: &Taxonomy) -> Option<String> {
    let text = haystack(record);

    match taxonomy {
        Taxonomy::Default(categories) => categories
            .iter()
            .find(|category| category.keywords.iter().any(|k| text.contains(k.as_str())))
            .map(|category| category.name.clone())
            .or_else(|| {
                url_hint(record.target_url.as_deref()).then(|| URL_HINT_CATEGORY.to_string())
            }),
        Taxonomy::Custom { name, keywords } => keywords
            .iter()
            .find(|k| text.contains(k.to_lowercase().as_str()))
            .map(|k| format!("{}:{}", name, k)),
    }
}

/// Tags a record, setting `pharma_context`
pub fn tag(mut record: ElementRecord, taxonomy: &Taxonomy) -> ElementRecord {
    record.pharma_context = detect_context(&record, taxonomy);
    record
}

/// Tags every record of a page in place
///
/// # Returns
///
/// The number of records that received a tag
pub fn tag_all(records: &mut [ElementRecord], taxonomy: &Taxonomy) -> usize {
    let mut tagged = 0;
    for record in records.iter_mut() {
        record.pharma_context = detect_context(record, taxonomy);
        if record.pharma_context.is_some() {
            tagged += 1;
        }
    }
    tagged
}
