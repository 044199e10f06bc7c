//! # Global runtime configuration.
//!
//! Provides [`Config`]: centralized defaults for pipelines and retry loops.
//!
//! Config is used in two ways:
//! 1. **Pipeline creation**: `Pipeline::builder(name).with_config(config)`
//! 2. **Retry defaults**: `RepeatOptions::with_defaults(&config)`
//!
//! ## Sentinel values
//! - `bus_capacity = 0` → clamped to 1 by the bus

use std::borrow::Cow;
use std::time::Duration;

use crate::core::pipeline::Invoke;

/// Default capacity of a pipeline's event bus.
pub const DEFAULT_BUS_CAPACITY: usize = 1024;

/// Default wait between retry attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(250);

/// Global configuration for pipelines and retry loops.
///
/// ## Field semantics
/// - `bus_capacity`: Event bus ring buffer size (min 1; clamped by Bus)
/// - `name_suffixes`: Suffixes stripped from type-derived step names (first match wins)
/// - `default_invoke`: Invocation mode of top-level pipelines
/// - `retry_delay`: Default constant delay between retry attempts
///
/// ## Notes
/// All fields are public for flexibility.
#[derive(Clone, Debug)]
pub struct Config {
    /// Capacity of the event bus broadcast channel ring buffer.
    ///
    /// Receivers that lag behind more than `bus_capacity` events will
    /// receive `Lagged` and skip older items.
    pub bus_capacity: usize,

    /// Suffixes removed from type names when naming lazy steps (`UploadStep` → `Upload`).
    pub name_suffixes: Vec<Cow<'static, str>>,

    /// Invocation mode of pipelines built with this config.
    pub default_invoke: Invoke,

    /// Delay between retry attempts used by `RepeatOptions::with_defaults`.
    pub retry_delay: Duration,
}

impl Config {
    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `bus_capacity = 1024`
    /// - `name_suffixes = ["Step", "Task"]`
    /// - `default_invoke = Invoke::Sequential`
    /// - `retry_delay = 250ms`
    fn default() -> Self {
        Self {
            bus_capacity: DEFAULT_BUS_CAPACITY,
            name_suffixes: vec![Cow::Borrowed("Step"), Cow::Borrowed("Task")],
            default_invoke: Invoke::Sequential,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }
}
