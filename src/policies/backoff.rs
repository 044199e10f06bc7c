//! # Retry delay policy.
//!
//! [`BackoffPolicy`] decides how long a [`Repeat`](crate::Repeat) loop waits after
//! attempt `n` (0-based retry index):
//!
//! ```text
//! base(n)  = min(first × factor^n, max)
//! delay(n) = jitter(base(n))
//! ```
//!
//! `factor = 1.0` gives a constant delay, which is the retry loop default
//! ([`BackoffPolicy::constant`]). The base is derived from `n` alone, so a jittered
//! delay never feeds into the next one.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use pipeworks::{BackoffPolicy, JitterPolicy};
//!
//! let steady = BackoffPolicy::constant(Duration::from_millis(250));
//! assert_eq!(steady.next(0), Duration::from_millis(250));
//! assert_eq!(steady.next(9), Duration::from_millis(250));
//!
//! let growing = BackoffPolicy::exponential(Duration::from_millis(50), Duration::from_secs(1));
//! assert_eq!(growing.next(2), Duration::from_millis(200));
//! assert_eq!(growing.next(20), Duration::from_secs(1));
//!
//! let spread = growing.with_jitter(JitterPolicy::Equal);
//! assert!(spread.next(2) >= Duration::from_millis(100));
//! ```

use std::time::Duration;

use crate::policies::jitter::JitterPolicy;

/// Delay policy between retry attempts.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BackoffPolicy {
    /// Delay after the first attempt.
    pub first: Duration,
    /// Upper bound for the base delay.
    pub max: Duration,
    /// Growth per attempt; `1.0` keeps the delay constant.
    pub factor: f64,
    /// Randomization applied on top of the base delay.
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// Constant [`DEFAULT_RETRY_DELAY`](crate::DEFAULT_RETRY_DELAY) without jitter.
    fn default() -> Self {
        Self::constant(crate::core::DEFAULT_RETRY_DELAY)
    }
}

impl BackoffPolicy {
    /// Same `delay` after every attempt.
    pub fn constant(delay: Duration) -> Self {
        Self {
            first: delay,
            max: delay,
            factor: 1.0,
            jitter: JitterPolicy::None,
        }
    }

    /// Doubling delay starting at `first`, capped at `max`.
    pub fn exponential(first: Duration, max: Duration) -> Self {
        Self {
            first,
            max,
            factor: 2.0,
            jitter: JitterPolicy::None,
        }
    }

    pub fn with_factor(mut self, factor: f64) -> Self {
        self.factor = factor;
        self
    }

    pub fn with_jitter(mut self, jitter: JitterPolicy) -> Self {
        self.jitter = jitter;
        self
    }

    /// Delay to wait after retry index `attempt` (0-based).
    pub fn next(&self, attempt: u32) -> Duration {
        let base = self.base(attempt);
        match self.jitter {
            JitterPolicy::Decorrelated => {
                self.jitter
                    .apply_decorrelated(self.first.min(self.max), base, self.max)
            }
            other => other.apply(base),
        }
    }

    /// Un-jittered delay, clamped to `max`; overflow and negative growth clamp too.
    fn base(&self, attempt: u32) -> Duration {
        let exp = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = self.first.as_secs_f64() * self.factor.powi(exp);
        if secs.is_finite() && (0.0..=self.max.as_secs_f64()).contains(&secs) {
            Duration::from_secs_f64(secs)
        } else {
            self.max
        }
    }
}
