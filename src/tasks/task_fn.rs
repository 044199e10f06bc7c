//! # Function-backed task (`TaskFn`)
//!
//! [`TaskFn`] wraps a closure `F: Fn(Arc<A>, Issues, CancellationToken) -> Fut`, producing a
//! fresh future per run. This avoids shared mutable state between runs.
//!
//! ## Concurrency semantics
//! - Each run creates a **new** future that owns its state.
//! - No hidden mutation between runs; if shared state is needed, capture an `Arc<...>`
//!   explicitly inside the closure.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use pipeworks::{Issues, TaskFn, TaskRef, TaskError};
//!
//! let t: TaskRef<()> = TaskFn::arc("worker", |_args, issues: Issues, ctx: CancellationToken| async move {
//!     if ctx.is_cancelled() {
//!         return Err(TaskError::Canceled);
//!     }
//!     issues.info("working");
//!     Ok::<_, TaskError>(())
//! });
//!
//! assert_eq!(t.name(), "worker");
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::TaskError;
use crate::tasks::result::Issues;
use crate::tasks::task::{Task, TaskRef};

/// Function-backed task implementation.
///
/// Wraps a closure that *creates* a new future per run.
#[derive(Debug)]
pub struct TaskFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> TaskFn<F> {
    /// Creates a new function-backed task.
    ///
    /// Prefer [`TaskFn::arc`] when you immediately need a [`TaskRef`].
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }

    /// Creates the task and returns it as a shared handle (`Arc<dyn Task<A>>`).
    ///
    /// Argument types of the closure are inferred from the expected [`TaskRef`].
    pub fn arc<A, Fut>(name: impl Into<Cow<'static, str>>, f: F) -> TaskRef<A>
    where
        A: Send + Sync + 'static,
        F: Fn(Arc<A>, Issues, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        Arc::new(Self::new(name, f))
    }
}

#[async_trait]
impl<A, F, Fut> Task<A> for TaskFn<F>
where
    A: Send + Sync + 'static,
    F: Fn(Arc<A>, Issues, CancellationToken) -> Fut + Send + Sync + 'static, // Fn, not FnMut
    Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(
        &self,
        args: Arc<A>,
        issues: Issues,
        ctx: CancellationToken,
    ) -> Result<(), TaskError> {
        (self.f)(args, issues, ctx).await
    }
}
