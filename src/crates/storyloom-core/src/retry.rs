//! Retry policies — exponential backoff for transient failures
//!
//! Used by the provider adapter layer, never by the executor itself: the
//! engine only ever sees permanent errors. A policy defines how many attempts
//! an operation gets and how long to wait between them, with exponential
//! backoff and optional jitter to avoid thundering herds against rate-limited
//! providers.
//!
//! ```rust
//! use storyloom_core::retry::RetryPolicy;
//!
//! let policy = RetryPolicy::new(4)
//!     .with_initial_interval(0.25)
//!     .with_backoff_factor(2.0)
//!     .with_max_interval(30.0);
//!
//! for attempt in 0..5 {
//!     if !policy.should_retry(attempt) {
//!         break;
//!     }
//!     let _delay = policy.calculate_delay(attempt);
//! }
//! ```

use rand::Rng;
use std::time::Duration;

/// Configuration for retrying failed provider calls
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first)
    pub max_attempts: usize,

    /// Initial interval between retries in seconds
    pub initial_interval: f64,

    /// Multiplier for the interval after each retry
    pub backoff_factor: f64,

    /// Maximum interval between retries in seconds
    pub max_interval: f64,

    /// Whether to add random jitter to intervals
    pub jitter: bool,
}

impl RetryPolicy {
    /// Create a new retry policy with the given max attempts
    pub fn new(max_attempts: usize) -> Self {
        Self {
            max_attempts,
            initial_interval: 0.5,
            backoff_factor: 2.0,
            max_interval: 128.0,
            jitter: true,
        }
    }

    /// Set the initial interval between retries
    pub fn with_initial_interval(mut self, seconds: f64) -> Self {
        self.initial_interval = seconds;
        self
    }

    /// Set the backoff factor
    pub fn with_backoff_factor(mut self, factor: f64) -> Self {
        self.backoff_factor = factor;
        self
    }

    /// Set the maximum interval between retries
    pub fn with_max_interval(mut self, seconds: f64) -> Self {
        self.max_interval = seconds;
        self
    }

    /// Enable or disable jitter
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Calculate the delay for a given attempt number (0-indexed)
    ///
    /// Exponential backoff `initial_interval * backoff_factor^attempt`,
    /// capped at `max_interval`, with jitter drawing a factor in `0.5..=1.5`.
    pub fn calculate_delay(&self, attempt: usize) -> Duration {
        if attempt >= self.max_attempts {
            return Duration::from_secs(0);
        }

        let base = self.initial_interval * self.backoff_factor.powi(attempt as i32);
        let capped = base.min(self.max_interval);

        let final_delay = if self.jitter {
            let mut rng = rand::thread_rng();
            capped * rng.gen_range(0.5..=1.5)
        } else {
            capped
        };

        Duration::from_secs_f64(final_delay)
    }

    /// Whether another attempt is allowed
    pub fn should_retry(&self, attempt: usize) -> bool {
        attempt < self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3)
    }
}

/// Tracks attempts and the last error across retries of one operation
#[derive(Debug, Clone, Default)]
pub struct RetryState {
    /// Number of attempts made so far
    pub attempts: usize,

    /// Last error message
    pub last_error: Option<String>,
}

impl RetryState {
    /// Create a fresh retry state
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an attempt
    pub fn record_attempt(&mut self, error: Option<String>) {
        self.attempts += 1;
        self.last_error = error;
    }

    /// Reset after success
    pub fn reset(&mut self) {
        self.attempts = 0;
        self.last_error = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_retry_bounds() {
        let policy = RetryPolicy::new(3);
        assert!(policy.should_retry(0));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
    }

    #[test]
    fn test_delay_grows_and_caps() {
        let policy = RetryPolicy::new(10)
            .with_initial_interval(1.0)
            .with_backoff_factor(2.0)
            .with_max_interval(4.0)
            .with_jitter(false);

        assert_eq!(policy.calculate_delay(0), Duration::from_secs(1));
        assert_eq!(policy.calculate_delay(1), Duration::from_secs(2));
        assert_eq!(policy.calculate_delay(2), Duration::from_secs(4));
        assert_eq!(policy.calculate_delay(3), Duration::from_secs(4));
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let policy = RetryPolicy::new(5).with_initial_interval(1.0).with_jitter(true);
        for attempt in 0..5 {
            let delay = policy.calculate_delay(attempt).as_secs_f64();
            let base = (1.0f64 * 2.0f64.powi(attempt as i32)).min(policy.max_interval);
            assert!(delay >= base * 0.5 && delay <= base * 1.5);
        }
    }

    #[test]
    fn test_retry_state_tracking() {
        let mut state = RetryState::new();
        state.record_attempt(Some("timeout".to_string()));
        state.record_attempt(Some("rate limited".to_string()));

        assert_eq!(state.attempts, 2);
        assert_eq!(state.last_error.as_deref(), Some("rate limited"));

        state.reset();
        assert_eq!(state.attempts, 0);
        assert!(state.last_error.is_none());
    }
}
