//! Element fingerprints

use crate::extract::selector::normalize_selector;
use crate::extract::snapshot::collapse_whitespace;
use crate::state::ElementType;
use sha2::{Digest, Sha256};

/// Hex characters kept from the digest
pub const FINGERPRINT_LEN: usize = 32;

/// Computes the fingerprint of an element
///
/// The digest covers the element type, the lowercased whitespace-collapsed
/// label, the container context and the selector with positional indices
/// removed, so the same control found at a different sibling position on
/// another page maps to the same fingerprint.
///
/// # Arguments
///
/// * `element_type` - Classified type of the element
/// * `text` - Element label
/// * `container` - Container context
/// * `selector` - CSS selector as generated
///
/// # Returns
///
/// A 32-character lowercase hex string
pub fn fingerprint(element_type: ElementType, text: &str, container: &str, selector: &str) -> String {
    let normalized_text = collapse_whitespace(text).to_lowercase();
    let normalized_selector = normalize_selector(selector);

    let mut hasher = Sha256::new();
    hasher.update(element_type.as_str().as_bytes());
    hasher.update(b"\x1f");
    hasher.update(normalized_text.as_bytes());
    hasher.update(b"\x1f");
    hasher.update(container.as_bytes());
    hasher.update(b"\x1f");
    hasher.update(normalized_selector.as_bytes());

    let mut digest = hex::encode(hasher.finalize());
    digest.truncate(FINGERPRINT_LEN);
    digest
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_shape() {
        let fp = fingerprint(ElementType::Link, "Home", "nav", "nav > a");
        assert_eq!(fp.len(), FINGERPRINT_LEN);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_fingerprint_normalizes_text_and_position() {
        let a = fingerprint(ElementType::Link, "  Sign  Up ", "nav", "nav > li:nth-of-type(2) > a");
        let b = fingerprint(ElementType::Link, "sign up", "nav", "nav > li:nth-of-type(5) > a");
        assert_eq!(a, b);
    }

    #[test]
    fn test_fingerprint_distinguishes_fields() {
        let base = fingerprint(ElementType::Link, "Home", "nav", "nav > a");
        assert_ne!(base, fingerprint(ElementType::Button, "Home", "nav", "nav > a"));
        assert_ne!(base, fingerprint(ElementType::Link, "About", "nav", "nav > a"));
        assert_ne!(base, fingerprint(ElementType::Link, "Home", "footer", "nav > a"));
        assert_ne!(base, fingerprint(ElementType::Link, "Home", "nav", "div > a"));
    }

    #[test]
    fn test_fingerprint_field_boundaries() {
        assert_ne!(
            fingerprint(ElementType::Link, "ab", "c", "x"),
            fingerprint(ElementType::Link, "a", "bc", "x")
        );
    }
}
