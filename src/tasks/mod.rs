//! # Task abstractions and results.
//!
//! This module provides the core task-related types:
//! - [`Task`] - trait for implementing async cancelable tasks over arguments `A`
//! - [`TaskFn`] - function-based task implementation
//! - [`TaskRef`] - shared reference to a task (`Arc<dyn Task<A>>`)
//! - [`LazyStep`] - task resolved at run time
//! - [`ManagedTask`] - task bound to an event bus, run with lifecycle notifications
//! - [`TaskResult`], [`Issue`], [`Issues`], [`Level`] - ordered issue trails

mod lazy;
mod managed;
mod name;
mod result;
mod task;
mod task_fn;

pub use lazy::LazyStep;
pub use managed::ManagedTask;
pub use name::type_display_name;
pub use result::{Issue, Issues, Level, TaskResult};
pub use task::{Task, TaskRef};
pub use task_fn::TaskFn;
