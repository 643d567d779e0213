//! Breadth-first crawl frontier
//!
//! A FIFO queue of `(url, depth)` entries. Every URL that was ever queued
//! stays in the seen set, so a page is never enqueued twice in one scan.

use std::collections::{HashSet, VecDeque};
use url::Url;

/// A URL waiting to be fetched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedUrl {
    /// Normalized URL
    pub url: Url,
    /// Link distance from the seed
    pub depth: u32,
}

/// Why a URL was not added to the frontier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushRejection {
    AlreadySeen,
    Full,
}

/// FIFO frontier with normalized-URL deduplication
#[derive(Debug, Clone)]
pub struct Frontier {
    queue: VecDeque<QueuedUrl>,
    seen: HashSet<String>,
    capacity: usize,
}

impl Frontier {
    /// Creates an empty frontier holding at most `capacity` queued entries
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            seen: HashSet::new(),
            capacity,
        }
    }

    /// Queues a normalized URL
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The URL was queued
    /// * `Err(PushRejection)` - The URL was seen before, or the queue is full
    pub fn push(&mut self, url: Url, depth: u32) -> Result<(), PushRejection> {
        if self.seen.contains(url.as_str()) {
            return Err(PushRejection::AlreadySeen);
        }
        if self.queue.len() >= self.capacity {
            return Err(PushRejection::Full);
        }

        self.seen.insert(url.as_str().to_string());
        self.queue.push_back(QueuedUrl { url, depth });
        Ok(())
    }

    /// Records a URL as visited without queueing it (e.g. a redirect target)
    pub fn mark_seen(&mut self, url: &Url) {
        self.seen.insert(url.as_str().to_string());
    }

    pub fn pop(&mut self) -> Option<QueuedUrl> {
        self.queue.pop_front()
    }

    pub fn has_seen(&self, url: &Url) -> bool {
        self.seen.contains(url.as_str())
    }

    /// Number of queued entries
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Number of distinct URLs ever queued or marked
    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }
}
