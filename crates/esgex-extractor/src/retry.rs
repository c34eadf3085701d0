//! Retry controller
//!
//! Each schema is attempted up to `max_attempts` times. After failed attempt
//! `n` the controller waits `n * base_delay` before attempt `n + 1`:
//!
//! ```text
//! Attempting(n) ──ok──────────────────────────▶ Succeeded
//!       │
//!       └─fail─▶ n < max ─▶ Retrying{n, delay} ─▶ Attempting(n + 1)
//!                n = max ─▶ Exhausted
//! ```

use crate::config::ExtractorConfig;
use crate::error::TransientError;
use std::time::Duration;

/// Attempt bound and linear backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl RetryPolicy {
    /// Create a policy; `max_attempts` is clamped to at least 1
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Policy described by an extractor configuration
    pub fn from_config(config: &ExtractorConfig) -> Self {
        Self::new(config.max_retries, config.retry_base_delay())
    }

    /// Maximum attempts per schema
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Wait after failed attempt `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }

    /// State following a failed attempt
    pub fn after_failure<T>(&self, attempt: u32, cause: TransientError) -> RetryState<T> {
        if attempt >= self.max_attempts {
            RetryState::Exhausted {
                attempts: attempt,
                cause,
            }
        } else {
            RetryState::Retrying {
                attempt,
                delay: self.delay_for(attempt),
                cause,
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&ExtractorConfig::default())
    }
}

/// Where one schema's extraction stands
#[derive(Debug, Clone, PartialEq)]
pub enum RetryState<T> {
    /// About to make attempt `n` (1-based)
    Attempting(u32),

    /// Attempt `attempt` failed; wait `delay` before the next one
    Retrying {
        /// Attempt that just failed
        attempt: u32,
        /// Backoff before the next attempt
        delay: Duration,
        /// Why the attempt failed
        cause: TransientError,
    },

    /// An attempt produced a value
    Succeeded {
        /// Attempts used, including the successful one
        attempts: u32,
        /// The extracted value
        value: T,
    },

    /// Every allowed attempt failed
    Exhausted {
        /// Attempts made
        attempts: u32,
        /// Failure of the last attempt
        cause: TransientError,
    },
}

impl<T> RetryState<T> {
    /// Initial state
    pub fn start() -> Self {
        RetryState::Attempting(1)
    }

    /// Whether no further transitions will happen
    pub fn is_terminal(&self) -> bool {
        matches!(self, RetryState::Succeeded { .. } | RetryState::Exhausted { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_backoff() {
        let policy = RetryPolicy::new(3, Duration::from_secs(60));
        assert_eq!(policy.delay_for(1), Duration::from_secs(60));
        assert_eq!(policy.delay_for(2), Duration::from_secs(120));
        assert_eq!(policy.delay_for(3), Duration::from_secs(180));
    }

    #[test]
    fn test_zero_base_delay() {
        let policy = RetryPolicy::new(3, Duration::ZERO);
        assert_eq!(policy.delay_for(2), Duration::ZERO);
    }

    #[test]
    fn test_transitions() {
        let policy = RetryPolicy::new(3, Duration::from_secs(10));

        let state: RetryState<()> = policy.after_failure(1, TransientError::EmptyResponse);
        assert_eq!(
            state,
            RetryState::Retrying {
                attempt: 1,
                delay: Duration::from_secs(10),
                cause: TransientError::EmptyResponse
            }
        );

        let state: RetryState<()> = policy.after_failure(2, TransientError::Timeout(5));
        assert!(matches!(state, RetryState::Retrying { attempt: 2, .. }));
        assert!(!state.is_terminal());

        let state: RetryState<()> = policy.after_failure(3, TransientError::EmptyResponse);
        assert_eq!(
            state,
            RetryState::Exhausted {
                attempts: 3,
                cause: TransientError::EmptyResponse
            }
        );
        assert!(state.is_terminal());
    }

    #[test]
    fn test_single_attempt_policy() {
        let policy = RetryPolicy::new(0, Duration::from_secs(1));
        assert_eq!(policy.max_attempts(), 1);

        let state: RetryState<()> = policy.after_failure(1, TransientError::EmptyResponse);
        assert!(matches!(state, RetryState::Exhausted { attempts: 1, .. }));
    }

    #[test]
    fn test_default_policy_matches_default_config() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts(), 3);
        assert_eq!(policy.delay_for(1), Duration::from_secs(60));
        assert_eq!(RetryState::<()>::start(), RetryState::Attempting(1));
    }
}
