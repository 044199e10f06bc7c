//! Runtime core: composition and execution.
//!
//! Public pieces:
//! - [`Pipeline`] / [`Invoke`]: ordered steps and nested blocks, run sequentially or in parallel;
//! - [`Registry`]: type-keyed factories backing lazy steps;
//! - [`Dispatcher`] / [`FromArgs`]: run registered pipelines by name;
//! - [`Config`]: shared defaults.
//!
//! Internal modules:
//! - [`runner`]: executes one managed run with event publishing and panic capture.

mod config;
mod dispatcher;
mod pipeline;
mod registry;
mod runner;

pub use config::{Config, DEFAULT_BUS_CAPACITY, DEFAULT_RETRY_DELAY};
pub use dispatcher::{Dispatcher, FromArgs};
pub use pipeline::{Invoke, Pipeline, PipelineBuilder};
pub use registry::Registry;
pub(crate) use runner::panic_message;
pub use runner::run_managed;
