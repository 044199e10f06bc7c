//! # LogWriter: renders events through `tracing`.
//!
//! Available with the `logging` feature. Attach it to a pipeline's bus and install
//! any `tracing` subscriber to see a run as it happens:
//!
//! ```text
//! DEBUG task started task="build"
//!  INFO compiled 1.4.0 task="build" level=info
//!  INFO task ended task="build" issues=1 elapsed_ms=12
//!  WARN retry scheduled task="probe" attempt=1 delay_ms=250 reason="execution failed: not yet"
//! ERROR task ended task="deploy" issues=3 elapsed_ms=840 reason="execution failed: disk full"
//! ```
//!
//! Issues are rendered from `IssueLogged`, once, at the issue's level and while the
//! writing task is still running. `TaskEnded` only produces the summary line.

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;
use crate::tasks::{Issue, Level};

/// Event writer subscriber.
#[derive(Debug, Default)]
pub struct LogWriter;

impl LogWriter {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn log_issue(task: &str, issue: &Issue) {
    let message = issue.message.as_str();
    match issue.level {
        Level::Verbose => tracing::trace!(task, level = %issue.level, "{message}"),
        Level::Debug => tracing::debug!(task, level = %issue.level, "{message}"),
        Level::Info | Level::Success => tracing::info!(task, level = %issue.level, "{message}"),
        Level::Warning => tracing::warn!(task, level = %issue.level, "{message}"),
        Level::Error | Level::Critical => tracing::error!(task, level = %issue.level, "{message}"),
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let task = e.task.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("");
        match e.kind {
            EventKind::TaskStarted => tracing::debug!(task, "task started"),
            EventKind::IssueLogged => {
                if let Some(issue) = &e.issue {
                    log_issue(task, issue);
                }
            }
            EventKind::TaskEnded => {
                let issues = e.result.as_ref().map(|r| r.issues()).unwrap_or_default();
                let count = issues.len();
                if issues.iter().any(|i| i.level.is_failure()) || !reason.is_empty() {
                    tracing::error!(task, issues = count, elapsed_ms = e.elapsed_ms, reason, "task ended");
                } else {
                    tracing::info!(task, issues = count, elapsed_ms = e.elapsed_ms, "task ended");
                }
            }
            EventKind::RetryScheduled => tracing::warn!(
                task,
                attempt = e.attempt,
                delay_ms = e.delay_ms,
                reason,
                "retry scheduled"
            ),
            EventKind::PingFailed => {
                tracing::warn!(task, attempt = e.attempt, reason, "ping on retry failed")
            }
            EventKind::RepeatSucceeded => {
                tracing::info!(task, attempts = e.attempt, "repeat succeeded")
            }
            EventKind::RepeatGaveUp => {
                tracing::warn!(task, attempts = e.attempt, reason, "repeat gave up")
            }
            EventKind::SubscriberOverflow => {
                tracing::warn!(subscriber = task, reason, "subscriber overflow")
            }
            EventKind::SubscriberPanicked => {
                tracing::error!(subscriber = task, reason, "subscriber panicked")
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
