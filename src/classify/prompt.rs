//! Classifier prompt construction and response parsing

use crate::classify::{ClassificationError, TierAssignment};
use crate::state::ValueTier;
use crate::storage::ElementRecord;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

/// Instructions sent ahead of each batch
pub const CLASSIFICATION_PROMPT: &str = "\
You are a pharma digital measurement expert. Classify each interactive website element as:

- HVA (High-Value Action): elements that directly drive patient or HCP engagement with core brand \
content. Examples: ISI links, prescribing information downloads, patient enrollment forms, adverse \
event reporting, HCP portal gates, dosing calculators, savings card signups.

- MVA (Medium-Value Action): elements that support brand engagement but are not primary conversion \
points. Examples: educational content links, video players, FAQ accordions, condition information \
tabs, doctor finder tools, newsletter signups.

- LVA (Low-Value Action): standard navigation or utility elements with minimal measurement value. \
Examples: cookie consent buttons, social media links, generic navigation, footer links, legal \
disclaimers, language selectors.

For each element, return a JSON object with:
- \"id\": the element ID provided
- \"tier\": one of \"HVA\", \"MVA\", or \"LVA\"
- \"reason\": a brief one-sentence explanation

Respond with ONLY a JSON array of classification objects. No other text.

Elements to classify:
";

#[derive(Serialize)]
struct PromptElement<'a> {
    id: i64,
    #[serde(rename = "type")]
    element_type: &'a str,
    text: &'a str,
    container: &'a str,
    section: &'a str,
    target_url: &'a str,
    pharma_context: &'a str,
    is_above_fold: bool,
}

impl<'a> PromptElement<'a> {
    fn from_record(id: i64, record: &'a ElementRecord) -> Self {
        fn or_placeholder<'s>(value: Option<&'s str>, fallback: &'s str) -> &'s str {
            value.filter(|v| !v.is_empty()).unwrap_or(fallback)
        }

        Self {
            id,
            element_type: record.element_type.as_str(),
            text: or_placeholder(Some(record.element_text.as_str()), "(no text)"),
            container: &record.container_context,
            section: or_placeholder(record.section_context.as_deref(), "(none)"),
            target_url: or_placeholder(record.target_url.as_deref(), "(none)"),
            pharma_context: or_placeholder(record.pharma_context.as_deref(), "(none)"),
            is_above_fold: record.is_above_fold,
        }
    }
}

/// Builds the full prompt for a batch
///
/// Records without an ID cannot be written back and are left out.
pub fn build_prompt(batch: &[ElementRecord]) -> Result<String, ClassificationError> {
    let elements: Vec<PromptElement<'_>> = batch
        .iter()
        .filter_map(|record| record.id.map(|id| PromptElement::from_record(id, record)))
        .collect();

    let listing = serde_json::to_string_pretty(&elements)
        .map_err(|e| ClassificationError::MalformedResponse(e.to_string()))?;

    Ok(format!("{}{}", CLASSIFICATION_PROMPT, listing))
}

#[derive(Deserialize)]
struct RawAssignment {
    id: Value,
    #[serde(default)]
    tier: String,
    #[serde(default)]
    reason: Option<String>,
}

/// Removes a surrounding markdown code fence, if any
fn strip_fence(text: &str) -> &str {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") {
        return trimmed;
    }

    let body = match trimmed.find('\n') {
        Some(pos) => &trimmed[pos + 1..],
        None => return "",
    };
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

fn element_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Parses a classifier reply into tier assignments
///
/// Entries with an unknown tier, or an ID outside the batch, are dropped.
///
/// # Arguments
///
/// * `text` - The reply text, a JSON array that may be wrapped in a code fence
/// * `batch` - The elements that were sent
///
/// # Returns
///
/// * `Ok(Vec<TierAssignment>)` - Usable assignments in reply order
/// * `Err(ClassificationError)` - The reply is not a JSON array of objects
pub fn parse_assignments(
    text: &str,
    batch: &[ElementRecord],
) -> Result<Vec<TierAssignment>, ClassificationError> {
    let json = strip_fence(text);
    let raw: Vec<RawAssignment> = serde_json::from_str(json).map_err(|e| {
        let preview: String = json.chars().take(200).collect();
        ClassificationError::MalformedResponse(format!("{} in reply: {}", e, preview))
    })?;

    let sent: HashSet<i64> = batch.iter().filter_map(|record| record.id).collect();

    let assignments = raw
        .into_iter()
        .filter_map(|entry| {
            let element_id = element_id(&entry.id).filter(|id| sent.contains(id))?;
            let tier = ValueTier::parse(&entry.tier)?;
            Some(TierAssignment {
                element_id,
                tier,
                reason: entry.reason.unwrap_or_default(),
            })
        })
        .collect();

    Ok(assignments)
}
