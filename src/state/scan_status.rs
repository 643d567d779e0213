//! Scan lifecycle states
//!
//! A scan moves pending → running → {completed, failed, timeout}. A pending
//! scan may also fail outright when it cannot be started (for example the
//! browser cannot be launched). Terminal states are final.
use serde::{Deserialize, Serialize};
use std::fmt;

/// Represents the current state of a scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    /// Scan has been created and is waiting for its scheduler loop
    Pending,

    /// Scheduler loop is crawling
    Running,

    /// Frontier drained, page budget reached, or stopped by request
    Completed,

    /// Seed page failed or a policy violation stopped the scan
    Failed,

    /// Wall-clock limit reached; data gathered so far is kept
    Timeout,
}

impl ScanStatus {
    /// Returns true if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Timeout)
    }

    /// Returns true if the scan produced data that can be analyzed
    ///
    /// Timed-out scans keep their partial results and count as finished.
    pub fn is_finished_with_data(&self) -> bool {
        matches!(self, Self::Completed | Self::Timeout)
    }

    /// Checks whether moving from this state to `next` is allowed
    ///
    /// # Arguments
    ///
    /// * `next` - The requested state
    ///
    /// # Returns
    ///
    /// * `true` - The transition is forward-only and legal
    /// * `false` - The transition would move backwards or leave a terminal state
    pub fn can_transition_to(&self, next: ScanStatus) -> bool {
        match self {
            Self::Pending => matches!(next, Self::Running | Self::Failed),
            Self::Running => next.is_terminal(),
            Self::Completed | Self::Failed | Self::Timeout => false,
        }
    }

    /// Converts the status to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Timeout => "timeout",
        }
    }

    /// Parses a status from its database string representation
    ///
    /// Returns None if the string doesn't match any known status.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "timeout" => Some(Self::Timeout),
            _ => None,
        }
    }
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
