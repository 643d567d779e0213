//! Keyword taxonomies

use crate::config::CustomTagConfig;

/// One category of the default taxonomy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagCategory {
    pub name: String,
    /// Lowercase keywords
    pub keywords: Vec<String>,
}

impl TagCategory {
    pub fn new(name: &str, keywords: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
        }
    }
}

/// The keyword set a scan tags its elements against
///
/// Chosen once when the scan is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Taxonomy {
    /// Built-in categories, checked in declared order
    Default(Vec<TagCategory>),
    /// A single user-supplied tag; keywords keep the casing they were given
    Custom { name: String, keywords: Vec<String> },
}

impl Taxonomy {
    /// The built-in pharma taxonomy
    pub fn default_pharma() -> Self {
        Taxonomy::Default(vec![
            TagCategory::new(
                "isi",
                &[
                    "important safety information",
                    "full prescribing information",
                    "medication guide",
                    "prescribing information",
                    "safety information",
                ],
            ),
            TagCategory::new(
                "adverse_event",
                &[
                    "report side effects",
                    "adverse event",
                    "medwatch",
                    "report adverse",
                    "side effect",
                ],
            ),
            TagCategory::new(
                "patient_enrollment",
                &[
                    "patient support",
                    "copay",
                    "savings card",
                    "savings program",
                    "co-pay",
                    "patient assistance",
                    "enroll",
                    "sign up for savings",
                ],
            ),
            TagCategory::new(
                "hcp_gate",
                &[
                    "are you a healthcare professional",
                    "for us healthcare professionals",
                    "healthcare provider",
                    "hcp portal",
                    "for healthcare professionals",
                    "i am a healthcare",
                ],
            ),
            TagCategory::new(
                "fair_balance",
                &[
                    "indications and usage",
                    "contraindications",
                    "warnings and precautions",
                    "boxed warning",
                    "black box warning",
                ],
            ),
        ])
    }

    /// Selects the taxonomy for a scan
    ///
    /// A custom tag replaces the built-in categories entirely. Keywords are
    /// trimmed and blank ones dropped; matching ignores case but a tag
    /// reports the keyword as configured.
    pub fn from_config(custom: Option<&CustomTagConfig>) -> Self {
        match custom {
            Some(tag) => Taxonomy::Custom {
                name: tag.name.trim().to_string(),
                keywords: tag
                    .keywords
                    .iter()
                    .map(|k| k.trim().to_string())
                    .filter(|k| !k.is_empty())
                    .collect(),
            },
            None => Taxonomy::default_pharma(),
        }
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, Taxonomy::Custom { .. })
    }

    /// Category names in declared order, or the custom tag name
    pub fn category_names(&self) -> Vec<&str> {
        match self {
            Taxonomy::Default(categories) => categories.iter().map(|c| c.name.as_str()).collect(),
            Taxonomy::Custom { name, .. } => vec![name.as_str()],
        }
    }
}

impl Default for Taxonomy {
    fn default() -> Self {
        Taxonomy::default_pharma()
    }
}
