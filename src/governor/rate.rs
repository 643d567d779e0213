//! Per-domain token-bucket rate limiting
//!
//! Each domain gets a bucket of capacity one, refilled at the scan's effective
//! request rate. The rate can never drop below [`HARD_RATE_FLOOR`], whatever
//! the configuration says.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Lowest request rate (requests per second) any scan may use
pub const HARD_RATE_FLOOR: f64 = 0.5;

/// Clamps a requested rate to the configured bounds
///
/// The ceiling is applied first and the floor last, so the hard floor wins
/// over a misconfigured ceiling. NaN and infinite inputs become the floor.
///
/// # Arguments
///
/// * `requested` - Rate asked for by the caller (req/s)
/// * `floor` - Configured floor; raised to [`HARD_RATE_FLOOR`] if lower
/// * `ceiling` - Configured ceiling
///
/// # Returns
///
/// The rate the governor will actually enforce
pub fn effective_rate(requested: f64, floor: f64, ceiling: f64) -> f64 {
    let floor = if floor.is_finite() {
        floor.max(HARD_RATE_FLOOR)
    } else {
        HARD_RATE_FLOOR
    };

    if !requested.is_finite() {
        return floor;
    }

    let bounded = if ceiling.is_finite() {
        requested.min(ceiling)
    } else {
        requested
    };

    bounded.max(floor)
}

/// A single-token bucket refilled continuously at `rate` tokens per second
#[derive(Debug, Clone)]
pub struct TokenBucket {
    tokens: f64,
    rate: f64,
    last_refill: Instant,
}

impl TokenBucket {
    const CAPACITY: f64 = 1.0;

    /// Creates a full bucket
    pub fn new(rate: f64, now: Instant) -> Self {
        Self {
            tokens: Self::CAPACITY,
            rate,
            last_refill: now,
        }
    }

    fn tokens_at(&self, now: Instant) -> f64 {
        let elapsed = now.saturating_duration_since(self.last_refill);
        (self.tokens + elapsed.as_secs_f64() * self.rate).min(Self::CAPACITY)
    }

    /// Takes the token if one is available at `now`
    pub fn try_acquire(&mut self, now: Instant) -> bool {
        self.tokens = self.tokens_at(now);
        self.last_refill = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Time from `now` until a token will be available
    pub fn time_until_available(&self, now: Instant) -> Duration {
        let deficit = 1.0 - self.tokens_at(now);
        if deficit <= 0.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(deficit / self.rate)
        }
    }
}

/// Token buckets keyed by domain, all sharing one rate
#[derive(Debug)]
pub struct RateLimiter {
    rate: f64,
    buckets: HashMap<String, TokenBucket>,
}

impl RateLimiter {
    /// Creates a limiter; `rate` is raised to the hard floor if needed
    pub fn new(rate: f64) -> Self {
        let rate = if rate.is_finite() {
            rate.max(HARD_RATE_FLOOR)
        } else {
            HARD_RATE_FLOOR
        };

        Self {
            rate,
            buckets: HashMap::new(),
        }
    }

    /// The enforced rate in requests per second
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Takes a token for `domain` without waiting
    pub fn try_acquire(&mut self, domain: &str, now: Instant) -> bool {
        let rate = self.rate;
        self.buckets
            .entry(domain.to_string())
            .or_insert_with(|| TokenBucket::new(rate, now))
            .try_acquire(now)
    }

    /// Waits until `domain` has a token, then takes it
    pub async fn throttle(&mut self, domain: &str) {
        loop {
            let now = Instant::now();
            if self.try_acquire(domain, now) {
                return;
            }

            let wait = self
                .buckets
                .get(domain)
                .map(|bucket| bucket.time_until_available(now))
                .unwrap_or(Duration::ZERO);

            tracing::trace!("Throttling {} for {:?}", domain, wait);
            tokio::time::sleep(wait).await;
        }
    }
}
