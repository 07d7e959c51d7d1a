//! Retry and backoff policy for task executions.
//!
//! [`RetryCfg`] is carried on every [`TaskDef`](crate::TaskDef). The task
//! registry's execution wrapper enforces it: each attempt is raced against
//! `timeout`, and a failed attempt is retried up to `retries` times after
//! [`RetryCfg::delay`].
//!
//! The delay for attempt `n` (0-indexed) is derived from `n` alone for the
//! deterministic kinds, so jitter never feeds back into later delays:
//!
//! | kind | delay |
//! |---|---|
//! | `Constant` | `base` |
//! | `Linear` | `base × (n + 1)` |
//! | `Exponential` | `base × factor^n` |
//! | `DecorrelatedJitter` | uniform in `[base, min(prev × 3, max)]` |
//!
//! Every result is capped at `max`. With `jitter` set, the deterministic kinds
//! use equal jitter: `d/2 + rand[0, d/2]`.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use taskclock::{BackoffKind, RetryCfg};
//!
//! let retry = RetryCfg::with_retries(5)
//!     .backoff(BackoffKind::Exponential, Duration::from_millis(100), Duration::from_secs(1));
//!
//! assert_eq!(retry.delay(0, Duration::ZERO), Duration::from_millis(100));
//! assert_eq!(retry.delay(2, Duration::ZERO), Duration::from_millis(400));
//! assert_eq!(retry.delay(10, Duration::ZERO), Duration::from_secs(1));
//! ```

use std::time::Duration;

use rand::Rng;

/// How retry delays grow between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackoffKind {
    Constant,
    Linear,
    #[default]
    Exponential,
    DecorrelatedJitter,
}

/// Retry, timeout and backoff settings for a task.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryCfg {
    /// Extra attempts after the first failure.
    pub retries: u32,
    /// Per-attempt time limit; a timed-out attempt counts as a failure.
    pub timeout: Option<Duration>,
    pub kind: BackoffKind,
    /// Initial delay.
    pub base: Duration,
    /// Delay cap.
    pub max: Duration,
    /// Growth factor for [`BackoffKind::Exponential`].
    pub factor: f64,
    /// Apply equal jitter to deterministic kinds.
    pub jitter: bool,
}

impl Default for RetryCfg {
    fn default() -> Self {
        RetryCfg {
            retries: 0,
            timeout: None,
            kind: BackoffKind::Exponential,
            base: Duration::from_secs(1),
            max: Duration::from_secs(60),
            factor: 2.0,
            jitter: false,
        }
    }
}

impl RetryCfg {
    /// No retries and no timeout.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_retries(retries: u32) -> Self {
        RetryCfg {
            retries,
            ..Self::default()
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn backoff(mut self, kind: BackoffKind, base: Duration, max: Duration) -> Self {
        self.kind = kind;
        self.base = base;
        self.max = max;
        self
    }

    pub fn factor(mut self, factor: f64) -> Self {
        self.factor = factor;
        self
    }

    pub fn jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Delay before retry number `attempt` (0 for the first retry).
    ///
    /// `prev` is the previous delay, only consulted by
    /// [`BackoffKind::DecorrelatedJitter`].
    pub fn delay(&self, attempt: u32, prev: Duration) -> Duration {
        let base_secs = self.base.as_secs_f64();
        let secs = match self.kind {
            BackoffKind::Constant => base_secs,
            BackoffKind::Linear => base_secs * (attempt as f64 + 1.0),
            BackoffKind::Exponential => {
                base_secs * self.factor.powi(attempt.min(i32::MAX as u32) as i32)
            }
            BackoffKind::DecorrelatedJitter => return self.decorrelated(prev),
        };

        let capped = if !secs.is_finite() || secs < 0.0 || secs > self.max.as_secs_f64() {
            self.max
        } else {
            Duration::from_secs_f64(secs)
        };

        if self.jitter {
            equal_jitter(capped)
        } else {
            capped
        }
    }

    fn decorrelated(&self, prev: Duration) -> Duration {
        let base_ms = self.base.min(self.max).as_millis() as u64;
        let prev_ms = prev.max(self.base).as_millis() as u64;
        let upper = prev_ms.saturating_mul(3).min(self.max.as_millis() as u64);

        if base_ms >= upper {
            return Duration::from_millis(base_ms);
        }
        Duration::from_millis(rand::rng().random_range(base_ms..=upper))
    }
}

/// `delay/2 + random[0, delay/2]`
fn equal_jitter(delay: Duration) -> Duration {
    let ms = delay.as_millis() as u64;
    let half = ms / 2;
    if half == 0 {
        return delay;
    }
    Duration::from_millis(half + rand::rng().random_range(0..=half))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(kind: BackoffKind) -> RetryCfg {
        RetryCfg::with_retries(3).backoff(kind, Duration::from_millis(100), Duration::from_secs(30))
    }

    #[test]
    fn test_defaults() {
        let retry = RetryCfg::default();
        assert_eq!(retry.retries, 0);
        assert_eq!(retry.timeout, None);
        assert_eq!(retry.kind, BackoffKind::Exponential);
        assert!(!retry.jitter);
    }

    #[test]
    fn test_constant() {
        let retry = cfg(BackoffKind::Constant);
        for attempt in 0..10 {
            assert_eq!(retry.delay(attempt, Duration::ZERO), Duration::from_millis(100));
        }
    }

    #[test]
    fn test_linear() {
        let retry = cfg(BackoffKind::Linear);
        assert_eq!(retry.delay(0, Duration::ZERO), Duration::from_millis(100));
        assert_eq!(retry.delay(1, Duration::ZERO), Duration::from_millis(200));
        assert_eq!(retry.delay(4, Duration::ZERO), Duration::from_millis(500));
    }

    #[test]
    fn test_exponential_growth_and_cap() {
        let retry = cfg(BackoffKind::Exponential);
        assert_eq!(retry.delay(0, Duration::ZERO), Duration::from_millis(100));
        assert_eq!(retry.delay(1, Duration::ZERO), Duration::from_millis(200));
        assert_eq!(retry.delay(3, Duration::ZERO), Duration::from_millis(800));
        assert_eq!(retry.delay(100, Duration::ZERO), Duration::from_secs(30));
    }

    #[test]
    fn test_factor_overflow_clamps() {
        let retry = cfg(BackoffKind::Exponential).factor(f64::MAX);
        assert_eq!(retry.delay(5, Duration::ZERO), Duration::from_secs(30));
    }

    #[test]
    fn test_equal_jitter_bounds() {
        let retry = cfg(BackoffKind::Constant).jitter(true);
        for attempt in 0..50 {
            let delay = retry.delay(attempt, Duration::ZERO);
            assert!(delay >= Duration::from_millis(50));
            assert!(delay <= Duration::from_millis(100));
        }
    }

    #[test]
    fn test_decorrelated_bounds() {
        let retry = cfg(BackoffKind::DecorrelatedJitter);
        let mut prev = Duration::ZERO;
        for attempt in 0..50 {
            let delay = retry.delay(attempt, prev);
            assert!(delay >= Duration::from_millis(100));
            assert!(delay <= Duration::from_secs(30));
            assert!(delay <= prev.max(Duration::from_millis(100)) * 3);
            prev = delay;
        }
    }
}
