//! Wall-clock budget for a scan

use std::time::{Duration, Instant};

/// Tracks elapsed time against a scan's timeout
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    limit: Duration,
}

impl Deadline {
    /// Starts the clock now
    pub fn new(limit: Duration) -> Self {
        Self::starting_at(Instant::now(), limit)
    }

    pub fn starting_at(started: Instant, limit: Duration) -> Self {
        Self { started, limit }
    }

    /// Whether the budget has been used up
    pub fn is_exceeded(&self) -> bool {
        self.started.elapsed() >= self.limit
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn remaining(&self) -> Duration {
        self.limit.saturating_sub(self.started.elapsed())
    }
}
