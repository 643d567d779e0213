//! Element classification vocabularies
//!
//! Closed sets used on element records: the structural element type, the
//! action it performs, and the value tier assigned by enrichment.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Structural kind of an interactive element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    Link,
    Button,
    Form,
    Download,
    Tab,
    Accordion,
    Menu,
    Unknown,
}

impl ElementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Link => "link",
            Self::Button => "button",
            Self::Form => "form",
            Self::Download => "download",
            Self::Tab => "tab",
            Self::Accordion => "accordion",
            Self::Menu => "menu",
            Self::Unknown => "unknown",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "link" => Some(Self::Link),
            "button" => Some(Self::Button),
            "form" => Some(Self::Form),
            "download" => Some(Self::Download),
            "tab" => Some(Self::Tab),
            "accordion" => Some(Self::Accordion),
            "menu" => Some(Self::Menu),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What activating an element does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    Navigate,
    Submit,
    Download,
    Toggle,
    Expand,
    Other,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Navigate => "navigate",
            Self::Submit => "submit",
            Self::Download => "download",
            Self::Toggle => "toggle",
            Self::Expand => "expand",
            Self::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "navigate" => Some(Self::Navigate),
            "submit" => Some(Self::Submit),
            "download" => Some(Self::Download),
            "toggle" => Some(Self::Toggle),
            "expand" => Some(Self::Expand),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Measurement value tier of an element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ValueTier {
    /// High-value action
    #[serde(rename = "HVA")]
    Hva,
    /// Medium-value action
    #[serde(rename = "MVA")]
    Mva,
    /// Low-value action
    #[serde(rename = "LVA")]
    Lva,
}

impl ValueTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hva => "HVA",
            Self::Mva => "MVA",
            Self::Lva => "LVA",
        }
    }

    /// Parses a tier label, ignoring case and surrounding whitespace
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "HVA" => Some(Self::Hva),
            "MVA" => Some(Self::Mva),
            "LVA" => Some(Self::Lva),
            _ => None,
        }
    }
}

impl fmt::Display for ValueTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who wrote an element's value tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TierSource {
    Model,
    Manual,
}

impl TierSource {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Model => "model",
            Self::Manual => "manual",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "model" => Some(Self::Model),
            "manual" => Some(Self::Manual),
            _ => None,
        }
    }
}
