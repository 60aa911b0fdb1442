//! Exponential backoff between failed resyncs

use rand::Rng;
use std::time::Duration;
use tracing::warn;

/// Retry policy for resynchronization
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    /// Consecutive failures before giving up; `None` retries forever
    pub max_failures: Option<u32>,
    /// Spread each delay by up to ±20%
    pub jitter: bool,
    /// A watch open at least this long counts as healthy
    pub stable_after: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            max_failures: None,
            jitter: true,
            stable_after: Duration::from_secs(30),
        }
    }
}

/// Tracks consecutive resync failures
#[derive(Debug)]
pub struct ResyncBackoff {
    policy: BackoffPolicy,
    failures: u32,
    current_delay: Duration,
}

impl ResyncBackoff {
    pub fn new(policy: BackoffPolicy) -> Self {
        let current_delay = policy.initial_delay;
        Self {
            policy,
            failures: 0,
            current_delay,
        }
    }

    /// Consecutive failures since the last success
    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }

    /// Forget past failures and delays once a watch has proven healthy
    pub fn reset(&mut self) {
        self.failures = 0;
        self.current_delay = self.policy.initial_delay;
    }

    /// Clear the failure count after a successful resync.
    ///
    /// The delay keeps growing until [`reset`](Self::reset), so a watch that
    /// keeps ending right after it opens is still spaced out.
    pub fn record_success(&mut self) {
        self.failures = 0;
    }

    /// Delay before resyncing after a watch that ended early.
    ///
    /// Grows like [`next_delay`](Self::next_delay) but is not counted
    /// against the failure budget.
    pub fn early_end_delay(&mut self) -> Duration {
        self.advance()
    }

    /// Record a failure and return how long to wait before retrying.
    ///
    /// Returns `None` once the failure budget is spent.
    pub fn next_delay(&mut self) -> Option<Duration> {
        self.failures += 1;

        if let Some(max) = self.policy.max_failures {
            if self.failures >= max {
                warn!(failures = self.failures, max, "Resync failure budget exhausted");
                return None;
            }
        }

        Some(self.advance())
    }

    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn advance(&mut self) -> Duration {
        let delay = if self.policy.jitter {
            let factor = rand::thread_rng().gen_range(0.8..=1.2);
            self.current_delay.mul_f64(factor)
        } else {
            self.current_delay
        };

        let next_ms = (self.current_delay.as_millis() as f64 * self.policy.multiplier) as u64;
        self.current_delay = Duration::from_millis(next_ms).min(self.policy.max_delay);

        delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(max_failures: Option<u32>) -> BackoffPolicy {
        BackoffPolicy {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(500),
            multiplier: 2.0,
            max_failures,
            jitter: false,
            stable_after: Duration::from_secs(30),
        }
    }

    #[test]
    fn test_exponential_growth_capped() {
        let mut backoff = ResyncBackoff::new(policy(None));
        let delays: Vec<_> = (0..5).map(|_| backoff.next_delay().unwrap()).collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_millis(100),
                Duration::from_millis(200),
                Duration::from_millis(400),
                Duration::from_millis(500),
                Duration::from_millis(500),
            ]
        );
        assert_eq!(backoff.failures(), 5);
    }

    #[test]
    fn test_reset() {
        let mut backoff = ResyncBackoff::new(policy(None));
        backoff.next_delay();
        backoff.next_delay();
        backoff.reset();
        assert_eq!(backoff.failures(), 0);
        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(100)));
    }

    #[test]
    fn test_failure_budget() {
        let mut backoff = ResyncBackoff::new(policy(Some(3)));
        assert!(backoff.next_delay().is_some());
        assert!(backoff.next_delay().is_some());
        assert!(backoff.next_delay().is_none());

        // a budget of one fails fast
        let mut backoff = ResyncBackoff::new(policy(Some(1)));
        assert!(backoff.next_delay().is_none());
    }

    #[test]
    fn test_early_end_delay_skips_budget() {
        let mut backoff = ResyncBackoff::new(policy(Some(2)));
        assert_eq!(backoff.early_end_delay(), Duration::from_millis(100));
        assert_eq!(backoff.early_end_delay(), Duration::from_millis(200));
        assert_eq!(backoff.failures(), 0);

        // failures continue from the escalated delay
        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(400)));
        assert_eq!(backoff.failures(), 1);
    }

    #[test]
    fn test_success_keeps_delay() {
        let mut backoff = ResyncBackoff::new(policy(Some(2)));
        backoff.next_delay();
        backoff.record_success();
        assert_eq!(backoff.failures(), 0);
        assert_eq!(backoff.early_end_delay(), Duration::from_millis(200));

        backoff.reset();
        assert_eq!(backoff.early_end_delay(), Duration::from_millis(100));
    }

    #[test]
    fn test_jitter_bounds() {
        let mut backoff = ResyncBackoff::new(BackoffPolicy {
            jitter: true,
            ..policy(None)
        });
        let delay = backoff.next_delay().unwrap();
        assert!(delay >= Duration::from_millis(79));
        assert!(delay <= Duration::from_millis(121));
    }
}
