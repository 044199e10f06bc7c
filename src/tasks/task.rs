//! # Task abstraction.
//!
//! This module defines the [`Task`] trait (async, cancelable, argument-carrying) and the
//! shared handle type [`TaskRef`], an `Arc<dyn Task<A>>` suitable for sharing across pipelines.
//!
//! A task receives a [`CancellationToken`] and should periodically check it to stop
//! cooperatively. The body reports progress through an [`Issues`] sink; raising an
//! error ends the run and the error is recorded in the trail by [`Task::record_failure`].

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::TaskError;
use crate::tasks::result::{Issue, Issues, TaskResult};

/// Shared handle to a task.
pub type TaskRef<A> = Arc<dyn Task<A>>;

/// # Asynchronous, cancelable unit of work over arguments `A`.
///
/// A `Task` has a stable [`name`](Task::name) and an async [`run`](Task::run) body.
/// Lifecycle notifications, cancellation-before-start and error capture are handled by
/// the runner ([`ManagedTask`](crate::ManagedTask), [`Pipeline`](crate::Pipeline)), not by
/// the body itself.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use async_trait::async_trait;
/// use tokio_util::sync::CancellationToken;
/// use pipeworks::{Issues, Task, TaskError};
///
/// struct Greet;
///
/// #[async_trait]
/// impl Task<String> for Greet {
///     fn name(&self) -> &str { "greet" }
///
///     async fn run(&self, who: Arc<String>, issues: Issues, ctx: CancellationToken) -> Result<(), TaskError> {
///         if ctx.is_cancelled() {
///             return Err(TaskError::Canceled);
///         }
///         issues.info(format!("hello {who}"));
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Task<A>: Send + Sync + 'static
where
    A: Send + Sync + 'static,
{
    /// Returns a human-readable task name.
    fn name(&self) -> &str;

    /// Executes the task body once.
    ///
    /// Implementations should check `ctx.is_cancelled()` and exit quickly.
    async fn run(&self, args: Arc<A>, issues: Issues, ctx: CancellationToken)
    -> Result<(), TaskError>;

    /// Records a raised error in the run's issue trail.
    ///
    /// Composite tasks whose children already recorded the error override this with a no-op.
    fn record_failure(&self, issues: &Issues, error: &TaskError) {
        issues.push(Issue::failure(error));
    }

    /// Checks the task's wiring without running it, appending findings to `report`.
    fn validate(&self, report: &mut TaskResult) {
        let _ = report;
    }
}
