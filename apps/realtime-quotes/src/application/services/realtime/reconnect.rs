//! Backoff between reconnect attempts.
//!
//! Attempt `n` (1-based) waits `base_delay * factor^(n-1)`, clamped to
//! `ceiling`. With the defaults that is 1s, 2s, 4s, 8s, 16s and then the
//! manager gives up.

use std::time::Duration;

use rand::Rng;

/// Backoff parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectConfig {
    /// Wait before attempt 1.
    pub base_delay: Duration,
    /// No single wait exceeds this.
    pub ceiling: Duration,
    /// Integer growth per attempt.
    pub factor: u32,
    /// Random spread as a fraction of the wait; `0.0` keeps it exact.
    pub jitter: f64,
    /// Attempts before `RetriesExhausted`.
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self::with_base(Duration::from_secs(1), 5)
    }
}

impl ReconnectConfig {
    /// Doubling backoff from `base_delay`, capped at one minute.
    #[must_use]
    pub const fn with_base(base_delay: Duration, max_attempts: u32) -> Self {
        Self {
            base_delay,
            ceiling: Duration::from_secs(60),
            factor: 2,
            jitter: 0.0,
            max_attempts,
        }
    }

    /// Exact wait before `attempt`; attempt 0 is treated as 1.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let growth = self
            .factor
            .checked_pow(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(growth)
            .map_or(self.ceiling, |delay| delay.min(self.ceiling))
    }
}

/// Counts attempts since the last successful connect.
///
/// ```rust
/// use std::time::Duration;
/// use realtime_quotes::application::services::realtime::{ReconnectConfig, ReconnectPolicy};
///
/// let mut backoff = ReconnectPolicy::new(ReconnectConfig::with_base(Duration::from_millis(100), 2));
/// assert_eq!(backoff.next_delay(), Some(Duration::from_millis(100)));
/// assert_eq!(backoff.next_delay(), Some(Duration::from_millis(200)));
/// assert_eq!(backoff.next_delay(), None);
/// ```
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    config: ReconnectConfig,
    attempts: u32,
}

impl ReconnectPolicy {
    /// Policy with no attempts used.
    #[must_use]
    pub const fn new(config: ReconnectConfig) -> Self {
        Self {
            config,
            attempts: 0,
        }
    }

    /// Claim the next attempt and return its wait, or `None` when the
    /// limit is reached. A refused claim does not move the counter.
    #[must_use]
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.is_exhausted() {
            return None;
        }
        self.attempts += 1;
        let exact = self.config.delay_for_attempt(self.attempts);
        Some(spread(exact, self.config.jitter))
    }

    /// Back to zero attempts.
    pub const fn reset(&mut self) {
        self.attempts = 0;
    }

    /// Attempts claimed so far.
    #[must_use]
    pub const fn attempt_count(&self) -> u32 {
        self.attempts
    }

    /// Limit from the config.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.config.max_attempts
    }

    /// No attempts left.
    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.attempts >= self.config.max_attempts
    }
}

fn spread(delay: Duration, jitter: f64) -> Duration {
    if jitter <= 0.0 || delay.is_zero() {
        return delay;
    }
    let scale = rand::rng().random_range((1.0 - jitter).max(0.0)..=1.0 + jitter);
    delay.mul_f64(scale).max(Duration::from_millis(1))
}
