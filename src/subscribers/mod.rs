//! # Event subscribers.
//!
//! [`Subscribe`] implementations react to the events that pipelines and retry
//! loops publish on their [`Bus`](crate::Bus). A [`SubscriberSet`] fans events out to
//! them without blocking the run.
//!
//! ```text
//!   Pipeline / Repeat ── publish(Event) ──► Bus ──► SubscriberSet::attach listener
//!                                                        │
//!                                              ┌─────────┼──────────┐
//!                                              ▼         ▼          ▼
//!                                          LogWriter  Progress    Custom
//! ```
//!
//! [`LogWriter`] (feature `logging`) renders events and issue trails through `tracing`.

#[cfg(feature = "logging")]
mod log;
mod set;
mod subscribe;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
