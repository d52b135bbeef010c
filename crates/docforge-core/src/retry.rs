//! Backoff schedule for transient generation faults.

use std::time::Duration;

use rand::Rng;

use crate::config::RetryConfig;

/// Exponential backoff with a cap and uniform jitter. The deterministic
/// schedule lives in [`RetryPolicy::delay_for`]; randomness is confined to
/// [`RetryPolicy::jittered`] so the schedule itself stays testable.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
    multiplier: f64,
    max_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.base_delay_ms),
            multiplier: config.multiplier.max(1.0),
            max_delay: Duration::from_millis(config.max_delay_ms.max(config.base_delay_ms)),
        }
    }

    /// Total attempts allowed: the first try plus `max_retries` retries.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Delay before the retry that follows a failed `attempt` (1-based):
    /// base * multiplier^(attempt-1), capped at the configured maximum.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(32);
        let millis = self.base_delay.as_millis() as f64 * self.multiplier.powi(exp as i32);
        let capped = millis.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }

    /// Add uniform jitter of up to half the delay, so synchronized callers
    /// spread out instead of retrying in lockstep.
    pub fn jittered(&self, delay: Duration) -> Duration {
        let half = delay.as_millis() as u64 / 2;
        if half == 0 {
            return delay;
        }
        let extra = rand::thread_rng().gen_range(0..=half);
        delay + Duration::from_millis(extra)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(base_ms: u64, multiplier: f64, max_ms: u64, retries: u32) -> RetryPolicy {
        RetryPolicy::from_config(&RetryConfig {
            max_retries: retries,
            base_delay_ms: base_ms,
            multiplier,
            max_delay_ms: max_ms,
        })
    }

    #[test]
    fn defaults_allow_four_attempts() {
        assert_eq!(RetryPolicy::default().max_attempts(), 4);
    }

    #[test]
    fn schedule_doubles_then_caps() {
        let policy = policy(1_000, 2.0, 30_000, 3);
        assert_eq!(policy.delay_for(1), Duration::from_millis(1_000));
        assert_eq!(policy.delay_for(2), Duration::from_millis(2_000));
        assert_eq!(policy.delay_for(3), Duration::from_millis(4_000));
        assert_eq!(policy.delay_for(10), Duration::from_millis(30_000));
    }

    #[test]
    fn multiplier_below_one_is_clamped() {
        let policy = policy(1_000, 0.5, 30_000, 3);
        assert_eq!(policy.delay_for(5), Duration::from_millis(1_000));
    }

    #[test]
    fn jitter_stays_within_half_extra() {
        let policy = policy(1_000, 2.0, 30_000, 3);
        let base = policy.delay_for(2);
        for _ in 0..50 {
            let jittered = policy.jittered(base);
            assert!(jittered >= base);
            assert!(jittered <= base + base / 2);
        }
    }

    #[test]
    fn jitter_of_zero_delay_is_zero() {
        let policy = policy(0, 2.0, 0, 3);
        assert_eq!(policy.jittered(Duration::ZERO), Duration::ZERO);
    }
}
