//! Bounded retry with exponential backoff and jitter.

use std::fmt;
use std::thread;
use std::time::Duration;

/// Errors that know whether another attempt could succeed.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

type Sleeper = Box<dyn Fn(Duration) + Send + Sync>;

/// Retries a fallible operation on retryable errors.
///
/// Before retry `n` (starting at 1) it waits `backoff_base^n` seconds plus
/// up to one second of random jitter.
pub struct RetryPolicy {
    max_retries: u32,
    backoff_base: f64,
    sleeper: Sleeper,
}

impl RetryPolicy {
    #[must_use]
    pub fn new(max_retries: u32, backoff_base: f64) -> Self {
        Self {
            max_retries,
            backoff_base,
            sleeper: Box::new(thread::sleep),
        }
    }

    /// A policy that never retries.
    #[must_use]
    pub fn none() -> Self {
        Self::new(0, 0.0)
    }

    /// Replace the sleep function (tests use this to avoid real waits).
    #[must_use]
    pub fn with_sleeper(mut self, sleeper: impl Fn(Duration) + Send + Sync + 'static) -> Self {
        self.sleeper = Box::new(sleeper);
        self
    }

    #[must_use]
    pub const fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Backoff before retry `attempt`, without jitter.
    #[must_use]
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let seconds = self.backoff_base.max(0.0).powi(exponent);
        Duration::try_from_secs_f64(seconds).unwrap_or(Duration::MAX)
    }

    fn delay(&self, attempt: u32) -> Duration {
        let jitter = Duration::from_secs_f64(rand::random::<f64>());
        self.base_delay(attempt).saturating_add(jitter)
    }

    /// Run `op`, retrying retryable failures up to `max_retries` times.
    ///
    /// # Errors
    ///
    /// Returns the first non-retryable error, or the last error once retries
    /// are exhausted.
    pub fn run<T, E, F>(&self, mut op: F) -> Result<T, E>
    where
        E: Retryable + fmt::Display,
        F: FnMut() -> Result<T, E>,
    {
        let mut attempt = 0;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    let delay = self.delay(attempt);
                    tracing::warn!(
                        attempt,
                        max_retries = self.max_retries,
                        delay_ms = delay.as_millis(),
                        error = %err,
                        "Retryable error, backing off"
                    );
                    (self.sleeper)(delay);
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_retries", &self.max_retries)
            .field("backoff_base", &self.backoff_base)
            .finish_non_exhaustive()
    }
}
