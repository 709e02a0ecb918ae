//! Bounded exponential backoff for broker resolution and session establishment.
//!
//! ```text
//! delay[n] = min(initial * multiplier^(n-1), max_delay)
//! ```
//!
//! With the default policy there is a single attempt and no delay, so a failed
//! phase is fatal right away.

use embassy_time::Duration;

/// How often and how patiently a failed negotiation phase is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per phase, including the first. Zero behaves as one.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_delay: Duration,
    /// Cap on any single delay.
    pub max_delay: Duration,
    /// Factor applied to the delay after each retry.
    pub multiplier: u32,
}

impl RetryPolicy {
    /// A single attempt: the first failure is final.
    pub const fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::from_secs(0),
            max_delay: Duration::from_secs(0),
            multiplier: 1,
        }
    }

    /// Up to `max_attempts` attempts, doubling the delay from `initial_delay`
    /// up to `max_delay`.
    pub const fn exponential(max_attempts: u32, initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay,
            max_delay,
            multiplier: 2,
        }
    }

    /// Set the growth factor
    #[must_use]
    pub const fn with_multiplier(mut self, multiplier: u32) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Start a fresh backoff sequence for one phase.
    pub fn backoff(&self) -> Backoff {
        Backoff {
            policy: *self,
            attempt: 1,
            current_delay: self.initial_delay,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::no_retry()
    }
}

/// Backoff state for one negotiation phase.
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: RetryPolicy,
    attempt: u32,
    current_delay: Duration,
}

impl Backoff {
    /// The attempt currently being made, starting at 1.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Record a failed attempt and return how long to wait before the next,
    /// or `None` once the attempt budget is spent.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.attempt >= self.policy.max_attempts.max(1) {
            return None;
        }
        self.attempt += 1;

        let delay = if self.current_delay > self.policy.max_delay {
            self.policy.max_delay
        } else {
            self.current_delay
        };
        let grown = self
            .current_delay
            .as_ticks()
            .saturating_mul(u64::from(self.policy.multiplier.max(1)));
        self.current_delay = Duration::from_ticks(grown);
        Some(delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_retry_gives_up_immediately() {
        let mut backoff = RetryPolicy::no_retry().backoff();
        assert_eq!(backoff.attempt(), 1);
        assert_eq!(backoff.next_delay(), None);
    }

    #[test]
    fn zero_attempts_behaves_as_one() {
        let policy = RetryPolicy::exponential(0, Duration::from_millis(10), Duration::from_secs(1));
        assert_eq!(policy.backoff().next_delay(), None);
    }

    #[test]
    fn delays_double_up_to_cap() {
        let policy =
            RetryPolicy::exponential(5, Duration::from_millis(100), Duration::from_millis(300));
        let mut backoff = policy.backoff();

        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(100)));
        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(200)));
        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(300)));
        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(300)));
        assert_eq!(backoff.attempt(), 5);
        assert_eq!(backoff.next_delay(), None);
    }

    #[test]
    fn custom_multiplier() {
        let policy = RetryPolicy::exponential(3, Duration::from_millis(10), Duration::from_secs(1))
            .with_multiplier(3);
        let mut backoff = policy.backoff();
        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(10)));
        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(30)));
    }
}
