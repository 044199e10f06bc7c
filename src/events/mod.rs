//! Runtime events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to lifecycle notifications emitted by managed tasks,
//! pipelines and the retry runner.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `core::runner::run_managed` (started/ended), `Repeat` (retry events),
//!   `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: callers draining [`Bus::subscribe`] receivers, and
//!   [`SubscriberSet::attach`](crate::SubscriberSet::attach) listeners.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
