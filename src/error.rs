//! Error types used by pipelines, tasks and the retry runner.
//!
//! This module defines the main error types:
//!
//! - [`TaskError`]: errors raised by individual task bodies (and recorded as issues).
//! - [`TaskFailure`]: a failed run, carrying the aggregated [`TaskResult`] plus the representative error.
//! - [`RuntimeError`]: caller contract violations and dispatch failures.
//! - [`ResolveError`]: a lazy step could not be produced by the [`Registry`](crate::Registry).
//!
//! [`TaskError`] and [`RuntimeError`] provide `as_label` helpers for logs/metrics.
//! [`FailureFilter`] matches errors by [`ErrorKind`] or by concrete source type and
//! drives [`RepeatOptions::dont_rethrow_on`](crate::RepeatOptions::dont_rethrow_on).

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::tasks::TaskResult;

/// # Errors produced by task execution.
///
/// Cheap to clone: the same error value is stored in the issue trail and returned to the caller.
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum TaskError {
    /// Task execution exceeded a time limit.
    #[error("timed out after {timeout:?}")]
    Timeout {
        /// The timeout duration that was exceeded.
        timeout: Duration,
    },

    /// Non-recoverable error (retrying is pointless).
    #[error("fatal error: {error}")]
    Fatal {
        /// The underlying error message.
        error: String,
    },

    /// Task execution failed but may succeed if retried.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// Task observed cancellation and stopped early.
    #[error("context cancelled")]
    Canceled,

    /// A lazy step could not be resolved (wiring problem, not business logic).
    #[error("failed to resolve step '{step}': {reason}")]
    Unresolved {
        /// Display name of the lazy step.
        step: String,
        /// Resolver error message.
        reason: String,
    },

    /// Task body panicked.
    #[error("task panicked: {error}")]
    Panicked {
        /// Panic payload rendered as text.
        error: String,
    },

    /// Arbitrary error raised by user code.
    #[error(transparent)]
    Source(Arc<dyn StdError + Send + Sync + 'static>),

    /// Several errors surfaced together (e.g. a task error plus a failing cleanup).
    #[error("{} errors occurred: {}", .errors.len(), join_messages(.errors))]
    Aggregate {
        /// The combined errors, in the order they occurred.
        errors: Vec<TaskError>,
    },
}

fn join_messages(errors: &[TaskError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Coarse classification of [`TaskError`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Timeout,
    Fatal,
    Fail,
    Canceled,
    Unresolved,
    Panicked,
    Source,
    Aggregate,
}

impl TaskError {
    /// Wraps any user error.
    pub fn from_error<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        TaskError::Source(Arc::new(error))
    }

    /// Shorthand for [`TaskError::Fail`].
    pub fn fail(error: impl Into<String>) -> Self {
        TaskError::Fail {
            error: error.into(),
        }
    }

    /// Shorthand for [`TaskError::Fatal`].
    pub fn fatal(error: impl Into<String>) -> Self {
        TaskError::Fatal {
            error: error.into(),
        }
    }

    /// Returns the variant classification.
    pub fn kind(&self) -> ErrorKind {
        match self {
            TaskError::Timeout { .. } => ErrorKind::Timeout,
            TaskError::Fatal { .. } => ErrorKind::Fatal,
            TaskError::Fail { .. } => ErrorKind::Fail,
            TaskError::Canceled => ErrorKind::Canceled,
            TaskError::Unresolved { .. } => ErrorKind::Unresolved,
            TaskError::Panicked { .. } => ErrorKind::Panicked,
            TaskError::Source(_) => ErrorKind::Source,
            TaskError::Aggregate { .. } => ErrorKind::Aggregate,
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use pipeworks::TaskError;
    /// use std::time::Duration;
    ///
    /// let err = TaskError::Timeout { timeout: Duration::from_secs(1) };
    /// assert_eq!(err.as_label(), "task_timeout");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Timeout { .. } => "task_timeout",
            TaskError::Fatal { .. } => "task_fatal",
            TaskError::Fail { .. } => "task_failed",
            TaskError::Canceled => "task_canceled",
            TaskError::Unresolved { .. } => "step_unresolved",
            TaskError::Panicked { .. } => "task_panicked",
            TaskError::Source(_) => "task_error",
            TaskError::Aggregate { .. } => "task_aggregate",
        }
    }

    /// Returns the wrapped user error if it is of type `E`.
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: StdError + 'static,
    {
        match self {
            TaskError::Source(inner) => inner.as_ref().downcast_ref::<E>(),
            _ => None,
        }
    }

    /// Combines `self` with a later error into one [`TaskError::Aggregate`].
    ///
    /// Existing aggregates are flattened so the root causes stay one level deep.
    pub fn combine(self, later: TaskError) -> TaskError {
        let mut errors = match self {
            TaskError::Aggregate { errors } => errors,
            other => vec![other],
        };
        match later {
            TaskError::Aggregate { errors: more } => errors.extend(more),
            other => errors.push(other),
        }
        TaskError::Aggregate { errors }
    }
}

/// Matches task errors that a retry loop may give up on quietly.
///
/// Built either from an [`ErrorKind`] or from a concrete user error type wrapped
/// in [`TaskError::Source`].
#[derive(Clone)]
pub struct FailureFilter {
    label: &'static str,
    matches: Arc<dyn Fn(&TaskError) -> bool + Send + Sync>,
}

impl FailureFilter {
    /// Matches every error of the given kind.
    pub fn kind(kind: ErrorKind) -> Self {
        Self {
            label: "kind",
            matches: Arc::new(move |e: &TaskError| e.kind() == kind),
        }
    }

    /// Matches [`TaskError::Source`] errors whose concrete type is `E`.
    pub fn source<E>() -> Self
    where
        E: StdError + 'static,
    {
        Self {
            label: std::any::type_name::<E>(),
            matches: Arc::new(|e: &TaskError| e.downcast_ref::<E>().is_some()),
        }
    }

    /// Matches errors accepted by an arbitrary predicate.
    pub fn when<F>(f: F) -> Self
    where
        F: Fn(&TaskError) -> bool + Send + Sync + 'static,
    {
        Self {
            label: "custom",
            matches: Arc::new(f),
        }
    }

    /// Returns `true` if `err` is covered by this filter.
    pub fn matches(&self, err: &TaskError) -> bool {
        (self.matches)(err)
    }
}

impl fmt::Debug for FailureFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FailureFilter")
            .field("label", &self.label)
            .finish()
    }
}

/// A failed run: the complete issue trail plus the error that is being raised.
#[derive(Error, Debug, Clone)]
#[error("task '{}' failed: {error}", .result.name())]
pub struct TaskFailure {
    /// Aggregated result (also delivered through `TaskEnded`).
    pub result: TaskResult,
    /// Representative error (for pipelines: the first failing step's error).
    #[source]
    pub error: TaskError,
}

/// # Errors produced by the runtime itself.
///
/// These represent caller contract violations and dispatch failures rather than task failures.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// `Repeat::run` was called without an until-predicate.
    #[error("no until-predicate set: the task could run forever; set one and consider max tries or a timeout")]
    MissingPredicate,

    /// No pipeline registered under the given name.
    #[error("pipeline not found: {name}")]
    UnknownPipeline {
        /// Requested pipeline name.
        name: String,
    },

    /// Pipeline arguments could not be built from the given strings.
    #[error("invalid arguments for pipeline '{pipeline}': {reason}")]
    InvalidArgs {
        /// Pipeline name.
        pipeline: String,
        /// Parser error message.
        reason: String,
    },

    /// A retried task failed and the error was not filtered.
    #[error(transparent)]
    Task(#[from] TaskError),

    /// A dispatched pipeline run failed.
    #[error(transparent)]
    Run(#[from] TaskFailure),
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::MissingPredicate => "runtime_missing_predicate",
            RuntimeError::UnknownPipeline { .. } => "runtime_unknown_pipeline",
            RuntimeError::InvalidArgs { .. } => "runtime_invalid_args",
            RuntimeError::Task(e) => e.as_label(),
            RuntimeError::Run(f) => f.error.as_label(),
        }
    }

    /// Returns the underlying task error, if this is a task failure.
    pub fn task_error(&self) -> Option<&TaskError> {
        match self {
            RuntimeError::Task(e) => Some(e),
            RuntimeError::Run(f) => Some(&f.error),
            _ => None,
        }
    }
}

/// Errors produced by the dependency [`Registry`](crate::Registry).
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum ResolveError {
    /// Nothing registered for the requested type.
    #[error("no registration for type {type_name}")]
    NotRegistered {
        /// Fully qualified type name.
        type_name: &'static str,
    },

    /// The registered factory failed.
    #[error("factory for {type_name} failed: {reason}")]
    Factory {
        /// Fully qualified type name.
        type_name: &'static str,
        /// Factory error message.
        reason: String,
    },
}

impl ResolveError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ResolveError::NotRegistered { .. } => "resolve_not_registered",
            ResolveError::Factory { .. } => "resolve_factory_failed",
        }
    }
}
