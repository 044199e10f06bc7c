//! # Task results and issue trails.
//!
//! Every run produces one [`TaskResult`]: the name of the task plus an ordered
//! list of [`Issue`]s. A task body writes issues through an [`Issues`] sink; a
//! pipeline appends each child's issues to its own trail.
//!
//! ## Rules
//! - Insertion order is preserved; merging concatenates, never reorders or deduplicates.
//! - One [`Issues`] sink per task run; concurrent sub-tasks never share a sink.
//! - A sink bound to a bus publishes `IssueLogged` for every issue written to it, at
//!   the moment it is written. Issues copied in from child results are not published again.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::TaskError;
use crate::events::{Bus, Event, EventKind};

/// Severity of an [`Issue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Verbose,
    Debug,
    Info,
    Success,
    Warning,
    Error,
    Critical,
}

impl Level {
    /// `Error` and `Critical` mark a failure.
    #[inline]
    pub fn is_failure(self) -> bool {
        self >= Level::Error
    }

    /// Short lowercase label.
    pub fn as_str(self) -> &'static str {
        match self {
            Level::Verbose => "verbose",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Success => "success",
            Level::Warning => "warning",
            Level::Error => "error",
            Level::Critical => "critical",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One structured entry of a task's trail.
#[derive(Debug, Clone)]
pub struct Issue {
    pub level: Level,
    pub message: String,
    pub error: Option<TaskError>,
}

impl Issue {
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            error: None,
        }
    }

    /// Attaches an error payload.
    pub fn with_error(mut self, error: TaskError) -> Self {
        self.error = Some(error);
        self
    }

    /// Issue recording a raised task error.
    ///
    /// Resolution failures are `Critical` so wiring problems stand out from
    /// business-logic failures.
    pub fn failure(error: &TaskError) -> Self {
        let level = match error {
            TaskError::Unresolved { .. } => Level::Critical,
            _ => Level::Error,
        };
        Issue::new(level, error.to_string()).with_error(error.clone())
    }
}

/// Outcome of one task run.
#[derive(Debug, Clone, Default)]
pub struct TaskResult {
    name: String,
    issues: Vec<Issue>,
}

impl TaskResult {
    /// Creates an empty result for `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            issues: Vec::new(),
        }
    }

    /// Creates a result with an initial set of issues.
    pub fn with_issues(name: impl Into<String>, issues: Vec<Issue>) -> Self {
        Self {
            name: name.into(),
            issues,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    pub fn into_issues(self) -> Vec<Issue> {
        self.issues
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    /// `true` if any issue is `Error` or `Critical`.
    pub fn has_errors(&self) -> bool {
        self.issues.iter().any(|i| i.level.is_failure())
    }

    /// Error payloads in trail order.
    pub fn errors(&self) -> impl Iterator<Item = &TaskError> {
        self.issues.iter().filter_map(|i| i.error.as_ref())
    }

    /// Adds one issue at the end of the trail.
    pub fn push(&mut self, issue: Issue) {
        self.issues.push(issue);
    }

    /// Appends all of `other`'s issues after this result's own.
    pub fn append(&mut self, other: &TaskResult) {
        self.issues.extend(other.issues.iter().cloned());
    }

    /// Returns `self` followed by `other`, keeping `self`'s name.
    pub fn merge(mut self, other: TaskResult) -> TaskResult {
        self.issues.extend(other.issues);
        self
    }
}

/// Destination of live `IssueLogged` events.
struct Feed {
    bus: Bus,
    task: Arc<str>,
}

/// Append-only issue sink handed to a task body.
///
/// Cloning yields another handle to the same trail, so the sink can be moved
/// into `async move` blocks. The lock is never held across an `.await`.
#[derive(Clone, Default)]
pub struct Issues {
    inner: Arc<Mutex<Vec<Issue>>>,
    feed: Option<Arc<Feed>>,
}

impl Issues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sink that also publishes every written issue to `bus` on behalf of `task`.
    pub fn live(bus: &Bus, task: &str) -> Self {
        Self {
            inner: Arc::default(),
            feed: Some(Arc::new(Feed {
                bus: bus.clone(),
                task: Arc::from(task),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Issue>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push(&self, issue: Issue) {
        let mut trail = self.lock();
        // published under the lock so event order matches trail order
        if let Some(feed) = &self.feed {
            feed.bus.publish(
                Event::new(EventKind::IssueLogged)
                    .with_task(Arc::clone(&feed.task))
                    .with_issue(issue.clone()),
            );
        }
        trail.push(issue);
    }

    pub fn add(&self, level: Level, message: impl Into<String>) {
        self.push(Issue::new(level, message));
    }

    pub fn add_error(&self, message: impl Into<String>, error: TaskError) {
        self.push(Issue::new(Level::Error, message).with_error(error));
    }

    pub fn info(&self, message: impl Into<String>) {
        self.add(Level::Info, message);
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.add(Level::Warning, message);
    }

    pub fn success(&self, message: impl Into<String>) {
        self.add(Level::Success, message);
    }

    /// Appends every issue of a nested result, in order, without publishing them.
    pub fn extend_from(&self, result: &TaskResult) {
        self.lock().extend(result.issues().iter().cloned());
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Takes the collected issues, leaving the sink empty.
    pub fn take(&self) -> Vec<Issue> {
        std::mem::take(&mut *self.lock())
    }

    /// Copies the collected issues.
    pub fn snapshot(&self) -> Vec<Issue> {
        self.lock().clone()
    }
}

impl fmt::Debug for Issues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.lock().iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn messages(r: &TaskResult) -> Vec<&str> {
        r.issues().iter().map(|i| i.message.as_str()).collect()
    }

    #[test]
    fn test_new_result_has_no_issues() {
        let r = TaskResult::new("empty");
        assert!(r.is_empty());
        assert!(!r.has_errors());
        assert_eq!(r.name(), "empty");
    }

    #[test]
    fn test_merge_concatenates_in_order() {
        let r1 = TaskResult::with_issues(
            "r1",
            vec![Issue::new(Level::Info, "a"), Issue::new(Level::Warning, "b")],
        );
        let r2 = TaskResult::with_issues(
            "r2",
            vec![Issue::new(Level::Info, "a"), Issue::new(Level::Debug, "c")],
        );
        let merged = r1.merge(r2);
        assert_eq!(messages(&merged), vec!["a", "b", "a", "c"]);
        assert_eq!(merged.name(), "r1");
    }

    #[test]
    fn test_append_keeps_error_payloads() {
        let mut initial = TaskResult::new("initial");
        initial.push(Issue::new(Level::Error, "first").with_error(TaskError::fail("io")));

        let mut appended = TaskResult::new("appended");
        appended.push(Issue::new(Level::Error, "second").with_error(TaskError::fatal("arg")));

        initial.append(&appended);
        assert_eq!(messages(&initial), vec!["first", "second"]);
        let labels: Vec<_> = initial.errors().map(TaskError::as_label).collect();
        assert_eq!(labels, vec!["task_failed", "task_fatal"]);
    }

    #[test]
    fn test_failure_issue_levels() {
        let plain = Issue::failure(&TaskError::fail("x"));
        assert_eq!(plain.level, Level::Error);

        let wiring = Issue::failure(&TaskError::Unresolved {
            step: "Upload".into(),
            reason: "missing".into(),
        });
        assert_eq!(wiring.level, Level::Critical);
        assert!(wiring.error.is_some());
    }

    #[test]
    fn test_issues_handles_share_one_trail() {
        let issues = Issues::new();
        let other = issues.clone();
        issues.info("one");
        other.warn("two");
        assert_eq!(issues.len(), 2);

        let taken = issues.take();
        assert_eq!(taken.len(), 2);
        assert!(other.is_empty());
    }

    #[test]
    fn test_live_sink_publishes_written_issues_only() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let issues = Issues::live(&bus, "upload");
        issues.info("started");
        issues.extend_from(&TaskResult::with_issues(
            "child",
            vec![Issue::new(Level::Warning, "from child")],
        ));
        issues.push(Issue::failure(&TaskError::fail("disk full")));

        let mut published = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            assert_eq!(ev.kind, EventKind::IssueLogged);
            assert_eq!(ev.task.as_deref(), Some("upload"));
            published.push(ev.issue.map(|i| i.message.clone()).unwrap_or_default());
        }
        assert_eq!(published, vec!["started", "execution failed: disk full"]);
        assert_eq!(issues.len(), 3);
    }
}
