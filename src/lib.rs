//! # pipeworks
//!
//! **Pipeworks** composes async units of work into pipelines and retries them
//! until a condition holds.
//!
//! Every unit is a [`Task`] over shared arguments `A`. A task writes structured
//! [`Issue`]s while it runs; a [`Pipeline`] runs its steps sequentially or in
//! parallel, nests blocks to any depth and concatenates the issue trails of its
//! children in insertion order. [`Repeat`] drives a task until a predicate holds,
//! bounded by tries and time.
//!
//! ## Architecture
//! ```text
//!               ┌──────────────────────────────────────────────┐
//!               │ Pipeline "release" (Sequential)              │
//!               │   ├─ Step "build"        (TaskFn)            │
//!               │   ├─ Block "publish"     (Parallel)          │
//!               │   │     ├─ Step "upload"                     │
//!               │   │     └─ Step "Notify" (lazy, Registry)    │
//!               │   └─ Step "verify"                           │
//!               └─────────────────────┬────────────────────────┘
//!                                     │ run_managed per step
//!                                     ▼
//!  TaskStarted / IssueLogged / TaskEnded   RetryScheduled / RepeatGaveUp (Repeat)
//!                                     │
//!                                     ▼
//!                         Bus (broadcast channel)
//!                                     │
//!                                     ▼
//!                    SubscriberSet ──► LogWriter, custom Subscribe impls
//! ```
//!
//! ### Run semantics
//! ```text
//! Sequential:  cancelled? stop │ run step │ append issues │ failed? raise
//! Parallel:    run all (join) │ append issues in insertion order │ raise first failure
//! Repeat:      run │ until(err)? done │ bounds hit? give up │ ping │ sleep(delay) │ loop
//! ```
//!
//! ## Features
//! | Area              | Description                                                   | Key types / traits                           |
//! |-------------------|---------------------------------------------------------------|----------------------------------------------|
//! | **Tasks**         | Async units with issue trails, closures or types              | [`Task`], [`TaskFn`], [`TaskResult`]         |
//! | **Pipelines**     | Sequential/parallel composition, nesting, lazy steps          | [`Pipeline`], [`Invoke`], [`Registry`]       |
//! | **Retry**         | Repeat until a predicate holds, bounded by tries and time     | [`Repeat`], [`RepeatOptions`], [`Clock`]     |
//! | **Policies**      | Delay growth and jitter between attempts                      | [`BackoffPolicy`], [`JitterPolicy`]          |
//! | **Events**        | Lifecycle notifications and fan-out to subscribers            | [`Bus`], [`Event`], [`Subscribe`]            |
//! | **Dispatch**      | Run registered pipelines by name with parsed arguments        | [`Dispatcher`], [`FromArgs`]                 |
//! | **Errors**        | Typed errors for tasks and the runtime                        | [`TaskError`], [`RuntimeError`]              |
//!
//! ## Optional features
//! - `logging`: exports [`LogWriter`], a subscriber rendering events through `tracing`.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use pipeworks::{Invoke, Issues, Pipeline, TaskError};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let mut release: Pipeline<String> = Pipeline::new("release");
//!     release.add_step_fn(Some("build"), |version: Arc<String>, issues: Issues, _| async move {
//!         issues.info(format!("built {version}"));
//!         Ok(())
//!     });
//!     release
//!         .add_block_with(Some("publish"), Invoke::Parallel)
//!         .add_step_fn(Some("upload"), |_, issues: Issues, _| async move {
//!             issues.success("uploaded");
//!             Ok(())
//!         })
//!         .add_step_fn(Some("announce"), |_, _, _| async move {
//!             Err(TaskError::fail("mail server down"))
//!         });
//!
//!     let failure = release
//!         .run(Arc::new("1.4.0".to_string()), CancellationToken::new())
//!         .await
//!         .unwrap_err();
//!
//!     let trail: Vec<_> = failure.result.issues().iter().map(|i| i.message.as_str()).collect();
//!     assert_eq!(
//!         trail,
//!         ["built 1.4.0", "uploaded", "execution failed: mail server down"]
//!     );
//! }
//! ```

mod core;
mod error;
mod events;
mod policies;
mod repeat;
mod subscribers;
mod tasks;

// ---- Public re-exports ----

pub use core::{
    Config, DEFAULT_BUS_CAPACITY, DEFAULT_RETRY_DELAY, Dispatcher, FromArgs, Invoke, Pipeline,
    PipelineBuilder, Registry, run_managed,
};
pub use error::{ErrorKind, FailureFilter, ResolveError, RuntimeError, TaskError, TaskFailure};
pub use events::{Bus, Event, EventKind};
pub use policies::{BackoffPolicy, JitterPolicy};
pub use repeat::{Callback, Clock, ManualClock, Repeat, RepeatOptions, TokioClock};
pub use subscribers::{Subscribe, SubscriberSet};
pub use tasks::{
    Issue, Issues, LazyStep, Level, ManagedTask, Task, TaskFn, TaskRef, TaskResult,
    type_display_name,
};

// Optional: expose a simple built-in tracing subscriber (demo/reference only).
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
