//! # Jitter for retry delays.
//!
//! Randomizes a base delay so several loops retrying the same resource do not
//! wake up in lockstep.
//!
//! | policy         | delay                                   |
//! |----------------|-----------------------------------------|
//! | `None`         | `base`                                  |
//! | `Full`         | `random[0, base]`                       |
//! | `Equal`        | `base/2 + random[0, base/2]`            |
//! | `Decorrelated` | `random[floor, min(prev × 3, max)]`     |

use std::time::Duration;

use rand::Rng;

/// Randomization applied to a retry delay.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum JitterPolicy {
    /// Exact delays.
    #[default]
    None,
    /// Anywhere between zero and the base delay.
    Full,
    /// Upper half of the base delay.
    Equal,
    /// Grows from a floor towards three times the previous delay;
    /// see [`apply_decorrelated`](Self::apply_decorrelated).
    Decorrelated,
}

impl JitterPolicy {
    /// Applies the policy to `delay`.
    ///
    /// `Decorrelated` needs more context and returns `delay` unchanged here.
    pub fn apply(&self, delay: Duration) -> Duration {
        let ms = millis(delay);
        match self {
            JitterPolicy::None | JitterPolicy::Decorrelated => delay,
            JitterPolicy::Full => Duration::from_millis(random_between(0, ms)),
            JitterPolicy::Equal => {
                let half = ms / 2;
                Duration::from_millis(half + random_between(0, half))
            }
        }
    }

    /// Decorrelated jitter: `random[floor, min(prev × 3, max)]`.
    ///
    /// Other policies fall back to [`apply`](Self::apply) on `prev`.
    pub fn apply_decorrelated(&self, floor: Duration, prev: Duration, max: Duration) -> Duration {
        if *self != JitterPolicy::Decorrelated {
            return self.apply(prev);
        }
        let low = millis(floor);
        let high = millis(prev).saturating_mul(3).min(millis(max)).max(low);
        Duration::from_millis(random_between(low, high))
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

fn random_between(low: u64, high: u64) -> u64 {
    if low >= high {
        return low;
    }
    rand::rng().random_range(low..=high)
}
