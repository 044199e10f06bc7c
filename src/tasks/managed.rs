//! # Managed task handle.
//!
//! [`ManagedTask`] binds a [`TaskRef`] to an event [`Bus`] and runs it through
//! [`run_managed`](crate::core::run_managed): `TaskStarted`, optional body (its issues
//! stream out as `IssueLogged`), `TaskEnded`.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use pipeworks::{EventKind, Issues, ManagedTask, TaskFn};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let task = ManagedTask::new(TaskFn::arc("hello", |_args, issues: Issues, _ctx| async move {
//!     issues.info("hello");
//!     Ok(())
//! }));
//! let mut events = task.subscribe();
//!
//! let result = task.run(Arc::new(()), CancellationToken::new()).await.unwrap();
//! assert_eq!(result.issues().len(), 1);
//! assert_eq!(events.try_recv().unwrap().kind, EventKind::TaskStarted);
//! # }
//! ```

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::{
    core::run_managed,
    error::TaskFailure,
    events::{Bus, Event},
    tasks::{TaskRef, TaskResult},
};

/// A task plus the bus its lifecycle notifications go to.
pub struct ManagedTask<A: Send + Sync + 'static> {
    task: TaskRef<A>,
    bus: Bus,
}

impl<A: Send + Sync + 'static> ManagedTask<A> {
    /// Wraps `task` with a fresh bus.
    pub fn new(task: TaskRef<A>) -> Self {
        Self::with_bus(task, Bus::default())
    }

    /// Wraps `task`, publishing to an existing bus.
    pub fn with_bus(task: TaskRef<A>, bus: Bus) -> Self {
        Self { task, bus }
    }

    pub fn name(&self) -> &str {
        self.task.name()
    }

    pub fn task(&self) -> &TaskRef<A> {
        &self.task
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Receiver for the lifecycle and issue events of subsequent runs.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    /// Runs the task once.
    ///
    /// Cancellation before start yields an empty result; a raised error is recorded in
    /// the result and returned as [`TaskFailure`].
    pub async fn run(
        &self,
        args: Arc<A>,
        ctx: CancellationToken,
    ) -> Result<TaskResult, TaskFailure> {
        run_managed(self.task.as_ref(), args, &ctx, &self.bus).await
    }
}

impl<A: Send + Sync + 'static> Clone for ManagedTask<A> {
    fn clone(&self) -> Self {
        Self {
            task: Arc::clone(&self.task),
            bus: self.bus.clone(),
        }
    }
}
