//! Retry loops.
//!
//! - [`Repeat`]: runs a task until a predicate holds, bounded by [`RepeatOptions`];
//! - [`Clock`]: time source for elapsed-time checks and retry waits
//!   ([`TokioClock`] in production, [`ManualClock`] in tests).

mod clock;
mod options;
mod runner;

pub use clock::{Clock, ManualClock, TokioClock};
pub use options::{Callback, RepeatOptions};
pub use runner::Repeat;
