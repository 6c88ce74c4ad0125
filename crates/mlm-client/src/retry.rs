//! Retry policy with capped exponential backoff and jitter.
//!
//! The delay before retry `n` (1-based) is
//! `min(max_delay_units, 2^n) + jitter` units, with jitter uniform in `[0, 1)`.

use rand::Rng;
use std::time::Duration;

/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default cap on the exponential part of the delay, in units.
pub const DEFAULT_MAX_DELAY_UNITS: u32 = 60;

/// Configuration for retry behavior.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of retries after the first attempt.
    pub max_retries: u32,
    /// Length of one backoff unit.
    pub unit: Duration,
    /// Cap on the exponential part of the delay, in units.
    pub max_delay_units: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            unit: Duration::from_secs(1),
            max_delay_units: DEFAULT_MAX_DELAY_UNITS,
        }
    }
}

impl RetryConfig {
    /// Set the maximum number of retries.
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set the length of one backoff unit.
    pub fn with_unit(mut self, unit: Duration) -> Self {
        self.unit = unit;
        self
    }

    /// Set the cap on the exponential part of the delay.
    pub fn with_max_delay_units(mut self, units: u32) -> Self {
        self.max_delay_units = units;
        self
    }

    /// Disable retries.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Delay before the given retry (1-based), without jitter.
    pub fn base_delay(&self, retry: u32) -> Duration {
        let exponent = retry.min(31) as i32;
        let units = 2f64.powi(exponent).min(f64::from(self.max_delay_units));
        self.unit.mul_f64(units)
    }

    /// Delay before the given retry (1-based), with jitter.
    pub fn delay(&self, retry: u32) -> Duration {
        let jitter: f64 = rand::rng().random();
        self.base_delay(retry) + self.unit.mul_f64(jitter)
    }
}

/// Retry state for a single request.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
    retries: u32,
}

impl RetryPolicy {
    /// Create a new retry policy from config.
    pub fn new(config: RetryConfig) -> Self {
        Self { config, retries: 0 }
    }

    /// Number of retries performed so far.
    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Number of attempts made so far, counting the one in flight.
    pub fn attempts(&self) -> u32 {
        self.retries + 1
    }

    /// Returns true if another retry is allowed.
    pub fn should_retry(&self) -> bool {
        self.retries < self.config.max_retries
    }

    /// Record a retry and return the delay to wait before it.
    /// Returns None once every retry has been used.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if !self.should_retry() {
            return None;
        }
        self.retries += 1;
        Some(self.config.delay(self.retries))
    }
}
