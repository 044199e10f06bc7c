//! # Lifecycle events emitted by tasks, pipelines and the retry runner.
//!
//! The [`EventKind`] enum classifies event types across three categories:
//! - **Task lifecycle**: a task run started, logged an issue, or ended (with its [`TaskResult`])
//! - **Retry loop**: retry scheduled, ping failed, loop succeeded or gave up
//! - **Subscriber health**: a subscriber panicked or dropped an event
//!
//! The [`Event`] struct carries additional metadata such as timestamps, task name,
//! reasons, attempts, retry delays and run durations.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use pipeworks::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::RetryScheduled)
//!     .with_task("probe")
//!     .with_reason("connection refused")
//!     .with_attempt(3)
//!     .with_delay(Duration::from_millis(250));
//!
//! assert_eq!(ev.kind, EventKind::RetryScheduled);
//! assert_eq!(ev.task.as_deref(), Some("probe"));
//! assert_eq!(ev.delay_ms, Some(250));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::tasks::{Issue, TaskResult};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Task lifecycle ===
    /// A task run is starting (fired before the cancellation check).
    ///
    /// Sets:
    /// - `task`: task name
    TaskStarted,

    /// A running task wrote an issue. Published once, by the task that wrote it;
    /// enclosing pipelines do not repeat it.
    ///
    /// Sets:
    /// - `task`: name of the writing task
    /// - `issue`: the issue
    IssueLogged,

    /// A task run ended: success, failure, skip due to cancellation, or an aborted future.
    /// Fired exactly once per run.
    ///
    /// Sets:
    /// - `task`: task name
    /// - `result`: issue trail of the run (children included for pipelines)
    /// - `elapsed_ms`: duration of the run
    /// - `reason`: error message when the run failed (or `"aborted"`)
    TaskEnded,

    // === Retry loop ===
    /// Another attempt will follow after `delay_ms`.
    ///
    /// Sets:
    /// - `task`: task name
    /// - `attempt`: attempt that just finished (1-based)
    /// - `delay_ms`: wait before the next attempt
    /// - `reason`: error of the attempt, if any
    RetryScheduled,

    /// The ping-on-retry callback failed; the loop continues.
    ///
    /// Sets:
    /// - `task`: task name
    /// - `attempt`: current attempt
    /// - `reason`: callback error
    PingFailed,

    /// The until-predicate was satisfied.
    ///
    /// Sets:
    /// - `task`: task name
    /// - `attempt`: number of attempts made
    RepeatSucceeded,

    /// Max tries, timeout or cancellation ended the loop before the predicate held.
    ///
    /// Sets:
    /// - `task`: task name
    /// - `attempt`: number of attempts made
    /// - `reason`: what ended the loop: `"max tries reached"`, `"timeout elapsed"` or `"cancelled"`
    RepeatGaveUp,

    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `task`: subscriber name
    /// - `reason`: panic info/message
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `task`: subscriber name
    /// - `reason`: reason string (e.g., "full", "closed")
    SubscriberOverflow,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Name of the task, if applicable.
    pub task: Option<Arc<str>>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
    /// Attempt count (starting from 1).
    pub attempt: Option<u32>,
    /// Delay before the next attempt in milliseconds (compact).
    pub delay_ms: Option<u32>,
    /// Issue trail of an ended run.
    pub result: Option<Arc<TaskResult>>,
    /// Issue written by a running task.
    pub issue: Option<Arc<Issue>>,
    /// Duration of an ended run in milliseconds.
    pub elapsed_ms: Option<u64>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            task: None,
            reason: None,
            attempt: None,
            delay_ms: None,
            result: None,
            issue: None,
            elapsed_ms: None,
        }
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a task name.
    #[inline]
    pub fn with_task(mut self, task: impl Into<Arc<str>>) -> Self {
        self.task = Some(task.into());
        self
    }

    /// Attaches an attempt count.
    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a retry delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.delay_ms = Some(ms);
        self
    }

    /// Attaches the issue trail of a finished run.
    #[inline]
    pub fn with_result(mut self, result: TaskResult) -> Self {
        self.result = Some(Arc::new(result));
        self
    }

    /// Attaches an issue written by a running task.
    #[inline]
    pub fn with_issue(mut self, issue: Issue) -> Self {
        self.issue = Some(Arc::new(issue));
        self
    }

    /// Attaches the duration of a finished run (stored as milliseconds).
    #[inline]
    pub fn with_elapsed(mut self, d: Duration) -> Self {
        self.elapsed_ms = Some(d.as_millis().min(u128::from(u64::MAX)) as u64);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_task(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_task(subscriber)
            .with_reason(info)
    }

    #[inline]
    pub fn is_subscriber_event(&self) -> bool {
        matches!(
            self.kind,
            EventKind::SubscriberOverflow | EventKind::SubscriberPanicked
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_is_monotonic() {
        let a = Event::new(EventKind::TaskStarted);
        let b = Event::new(EventKind::TaskEnded);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn test_delay_saturates() {
        let ev = Event::new(EventKind::RetryScheduled).with_delay(Duration::from_secs(u64::MAX));
        assert_eq!(ev.delay_ms, Some(u32::MAX));
    }
}
