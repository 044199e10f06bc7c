//! Retry delay policies.
//!
//! ## Contents
//! - [`BackoffPolicy`] how long to wait between attempts (first / factor / max + jitter)
//! - [`JitterPolicy`]  randomization strategy so concurrent loops spread out
//!
//! ## Wiring
//! ```text
//! RepeatOptions { retry_delay: BackoffPolicy, .. }
//!      └─► Repeat::run waits retry_delay.next(tries - 1) on its Clock
//! ```
//!
//! ## Defaults
//! - `BackoffPolicy::default()` → constant 250ms, jitter=None.
//! - `JitterPolicy::None`; consider `Equal` when many loops poll one resource.

mod backoff;
mod jitter;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
