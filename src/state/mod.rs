//! State module for scan, page and element vocabularies
//!
//! This module provides the enumerated states stored alongside scan data.
//!
//! # Components
//!
//! - `ScanStatus`: Scan lifecycle (pending, running, completed, failed, timeout)
//! - `PageOutcome`: What happened to each frontier entry
//! - `ElementType` / `ActionType` / `ValueTier`: Element record vocabularies
//! - `ConsentInfo` / `ScanQuality`: Consent-banner results and grading

mod consent;
mod element_kind;
mod page_outcome;
mod scan_status;

// Re-export main types
pub use consent::{ConsentAction, ConsentInfo, ScanQuality};
pub use element_kind::{ActionType, ElementType, TierSource, ValueTier};
pub use page_outcome::PageOutcome;
pub use scan_status::ScanStatus;
