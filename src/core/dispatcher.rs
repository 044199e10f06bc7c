//! # Dispatch pipelines by name.
//!
//! [`Dispatcher`] maps a case-insensitive pipeline name to a typed invoker. Each invoker
//! parses command-line style arguments into the pipeline's argument type ([`FromArgs`])
//! and runs the pipeline.
//!
//! ```text
//! dispatcher.run("Deploy", ["env=prod"], ctx)
//!     ├─► lookup "deploy"        ── miss ──► RuntimeError::UnknownPipeline
//!     ├─► A::from_args(argv)     ── Err  ──► RuntimeError::InvalidArgs
//!     └─► pipeline.run(args, ctx)
//!             ├─► Ok(result)
//!             └─► Err(failure)   ──────────► RuntimeError::Run
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use crate::{
    core::pipeline::Pipeline,
    error::{RuntimeError, TaskFailure},
    tasks::TaskResult,
};

/// Pipeline arguments that can be built from an argument vector.
pub trait FromArgs: Sized + Send + Sync + 'static {
    /// Parses `argv`; the error string explains what was wrong.
    fn from_args(argv: &[String]) -> Result<Self, String>;
}

impl FromArgs for () {
    fn from_args(argv: &[String]) -> Result<Self, String> {
        match argv.first() {
            None => Ok(()),
            Some(arg) => Err(format!("pipeline takes no arguments, got '{arg}'")),
        }
    }
}

/// Accepts `key=value` and `-key value` (or `--key value`) pairs; later keys win.
impl FromArgs for HashMap<String, String> {
    fn from_args(argv: &[String]) -> Result<Self, String> {
        let mut out = HashMap::new();
        let mut it = argv.iter();
        while let Some(arg) = it.next() {
            if let Some((key, value)) = arg.split_once('=') {
                let key = key.trim_start_matches('-');
                if key.is_empty() {
                    return Err(format!("missing key in '{arg}'"));
                }
                out.insert(key.to_string(), value.to_string());
            } else if arg.starts_with('-') {
                let key = arg.trim_start_matches('-');
                if key.is_empty() {
                    return Err(format!("missing key in '{arg}'"));
                }
                let value = it
                    .next()
                    .ok_or_else(|| format!("missing value for '{arg}'"))?;
                out.insert(key.to_string(), value.clone());
            } else {
                return Err(format!("unexpected argument '{arg}'"));
            }
        }
        Ok(out)
    }
}

type RunFuture = BoxFuture<'static, Result<TaskResult, TaskFailure>>;
type Invoker = Box<dyn Fn(&[String], CancellationToken) -> Result<RunFuture, String> + Send + Sync>;

/// Name-keyed table of runnable pipelines.
#[derive(Default)]
pub struct Dispatcher {
    pipelines: HashMap<String, Invoker>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `pipeline` under `name` (case-insensitive), replacing any previous entry.
    pub fn register<A: FromArgs>(&mut self, name: &str, pipeline: Pipeline<A>) -> &mut Self {
        let pipeline = Arc::new(pipeline);
        let invoker: Invoker = Box::new(
            move |argv: &[String], ctx: CancellationToken| -> Result<RunFuture, String> {
                let args = Arc::new(A::from_args(argv)?);
                let pipeline = Arc::clone(&pipeline);
                Ok(Box::pin(async move { pipeline.run(args, ctx).await }))
            },
        );
        self.pipelines.insert(name.to_lowercase(), invoker);
        self
    }

    /// Returns `true` if a pipeline is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.pipelines.contains_key(&name.to_lowercase())
    }

    /// Registered (lower-cased) names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.pipelines.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Parses `argv` for the pipeline registered as `name` and runs it.
    pub async fn run(
        &self,
        name: &str,
        argv: &[String],
        ctx: CancellationToken,
    ) -> Result<TaskResult, RuntimeError> {
        tracing::info!(pipeline = %name, "dispatching pipeline");
        let invoker = self
            .pipelines
            .get(&name.to_lowercase())
            .ok_or_else(|| RuntimeError::UnknownPipeline {
                name: name.to_string(),
            })?;

        let run = invoker(argv, ctx).map_err(|reason| RuntimeError::InvalidArgs {
            pipeline: name.to_string(),
            reason,
        })?;
        tracing::debug!(pipeline = %name, args = ?argv, "starting pipeline");
        Ok(run.await?)
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("pipelines", &self.names())
            .finish()
    }
}
