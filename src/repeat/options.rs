//! # Retry loop options.
//!
//! [`RepeatOptions`] bounds and decorates a [`Repeat`](crate::Repeat) loop.
//!
//! ## Field semantics
//! - `retry_delay`: wait before the next attempt (`next(try)`); default constant 250ms
//! - `max_tries`: give up after this many attempts (`None` = unbounded)
//! - `timeout`: give up once this much time passed since the loop started (`None` = unbounded)
//! - `ping_on_retry`: called before each wait; its failures are logged and swallowed
//! - `dont_rethrow_on`: errors matching this filter end the loop with `false` instead of an error
//! - `finally`: called exactly once when the loop ends, however it ends
//!
//! Each `run` starts its own try counter and timer; options can be reused.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::{
    core::{Config, DEFAULT_RETRY_DELAY},
    error::{FailureFilter, TaskError},
    policies::BackoffPolicy,
};

/// Hook invoked by the retry loop.
pub type Callback = Arc<dyn Fn() -> Result<(), TaskError> + Send + Sync>;

/// Options of a retry loop.
#[derive(Clone)]
pub struct RepeatOptions {
    /// Delay policy between attempts.
    pub retry_delay: BackoffPolicy,
    /// Maximum number of attempts.
    pub max_tries: Option<u32>,
    /// Overall time budget measured from loop start.
    pub timeout: Option<Duration>,
    /// Called on every retry cycle.
    pub ping_on_retry: Option<Callback>,
    /// Errors that end the loop quietly when giving up.
    pub dont_rethrow_on: Option<FailureFilter>,
    /// Called once when the loop ends.
    pub finally: Option<Callback>,
}

impl Default for RepeatOptions {
    fn default() -> Self {
        Self {
            retry_delay: BackoffPolicy::constant(DEFAULT_RETRY_DELAY),
            max_tries: None,
            timeout: None,
            ping_on_retry: None,
            dont_rethrow_on: None,
            finally: None,
        }
    }
}

impl RepeatOptions {
    /// Options with the retry delay taken from `cfg`.
    pub fn with_defaults(cfg: &Config) -> Self {
        Self {
            retry_delay: BackoffPolicy::constant(cfg.retry_delay),
            ..Self::default()
        }
    }

    /// Constant delay between attempts.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = BackoffPolicy::constant(delay);
        self
    }

    /// Arbitrary (e.g. exponential, jittered) delay policy.
    pub fn with_backoff(mut self, policy: BackoffPolicy) -> Self {
        self.retry_delay = policy;
        self
    }

    pub fn with_max_tries(mut self, max_tries: u32) -> Self {
        self.max_tries = Some(max_tries);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_ping_on_retry<F>(mut self, f: F) -> Self
    where
        F: Fn() -> Result<(), TaskError> + Send + Sync + 'static,
    {
        self.ping_on_retry = Some(Arc::new(f));
        self
    }

    pub fn with_dont_rethrow_on(mut self, filter: FailureFilter) -> Self {
        self.dont_rethrow_on = Some(filter);
        self
    }

    pub fn with_finally<F>(mut self, f: F) -> Self
    where
        F: Fn() -> Result<(), TaskError> + Send + Sync + 'static,
    {
        self.finally = Some(Arc::new(f));
        self
    }

    /// `true` if neither a try limit nor a timeout bounds the loop.
    pub fn is_unbounded(&self) -> bool {
        self.max_tries.is_none() && self.timeout.is_none()
    }
}

impl fmt::Debug for RepeatOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepeatOptions")
            .field("retry_delay", &self.retry_delay)
            .field("max_tries", &self.max_tries)
            .field("timeout", &self.timeout)
            .field("ping_on_retry", &self.ping_on_retry.is_some())
            .field("dont_rethrow_on", &self.dont_rethrow_on)
            .field("finally", &self.finally.is_some())
            .finish()
    }
}
