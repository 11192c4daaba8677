//! Minimum-interval rate limiter.

use std::sync::{Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

/// Spaces outbound calls at least `1 / requests_per_second` apart.
///
/// The read-wait-record sequence runs under one lock, so concurrent callers
/// are serialized through it. Each pipeline owns its own limiter.
#[derive(Debug)]
pub struct RateLimiter {
    interval: Option<Duration>,
    last_call: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Non-positive or non-finite rates disable throttling.
    #[must_use]
    pub fn new(requests_per_second: f64) -> Self {
        let interval = (requests_per_second.is_finite() && requests_per_second > 0.0)
            .then(|| Duration::from_secs_f64(1.0 / requests_per_second));
        Self {
            interval,
            last_call: Mutex::new(None),
        }
    }

    /// A limiter that never waits.
    #[must_use]
    pub const fn unlimited() -> Self {
        Self {
            interval: None,
            last_call: Mutex::new(None),
        }
    }

    #[must_use]
    pub const fn interval(&self) -> Option<Duration> {
        self.interval
    }

    /// Block until the next call is permitted, then record it.
    ///
    /// Returns how long the caller was held back.
    pub fn throttle(&self) -> Duration {
        let Some(interval) = self.interval else {
            return Duration::ZERO;
        };

        let mut last_call = self
            .last_call
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let waited = last_call.map_or(Duration::ZERO, |last| {
            interval.saturating_sub(last.elapsed())
        });
        if !waited.is_zero() {
            tracing::trace!(wait_ms = waited.as_millis(), "Rate limiting request");
            thread::sleep(waited);
        }
        *last_call = Some(Instant::now());
        waited
    }
}
