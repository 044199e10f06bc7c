//! # Pipeline: ordered composition of steps and nested blocks.
//!
//! A [`Pipeline`] owns an ordered list of sub-tasks (leaf steps or nested pipelines,
//! "blocks") and is itself a [`Task`], so pipelines nest to any depth.
//!
//! ## Architecture
//! ```text
//! Pipeline::run(args, ctx) ──► run_managed(self) ──► TaskStarted
//!                                   │
//!                                   ▼
//!                       Task::run for Pipeline
//!       ┌───────────────────────────┴────────────────────────────┐
//!   Sequential                                                Parallel
//!   for step in steps {                                       if ctx cancelled → done
//!     ├─► ctx cancelled? → stop (rest skipped)                join_all(run_managed(step)..)
//!     ├─► run_managed(step) ─► append issues                  append issues in insertion order
//!     └─► failed? → return its error                          return first failure (insertion order)
//!   }
//!                                   │
//!                                   ▼
//!                               TaskEnded(aggregated result)
//! ```
//!
//! ## Rules
//! - Steps are added through `&mut self` builder methods before running; running takes
//!   `&self`, so an owned pipeline cannot be mutated while it runs. Interior mutability
//!   inside caller-provided steps is the caller's responsibility.
//! - Sequential mode stops before the next step once `ctx` is cancelled; skipped steps
//!   are neither run nor reported.
//! - Parallel mode never cancels siblings: every step runs to completion, then the first
//!   failure (by insertion order) is raised.
//! - Parallel steps are polled concurrently on the caller's task (no concurrency cap);
//!   CPU-bound steps should hand work to `spawn_blocking` themselves.
//! - Issues always concatenate in insertion order; a failing step's error appears once.

use std::borrow::Cow;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::{
    core::{config::Config, registry::Registry, runner::run_managed},
    error::{TaskError, TaskFailure},
    events::{Bus, Event},
    tasks::{Issues, LazyStep, Task, TaskFn, TaskRef, TaskResult, type_display_name},
};

/// How a pipeline runs its sub-tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Invoke {
    /// One after another, in insertion order.
    #[default]
    Sequential,
    /// All at once; joined before returning.
    Parallel,
}

/// One entry of a pipeline; blocks point into the owning pipeline's `blocks`.
enum Section<A: Send + Sync + 'static> {
    Step(TaskRef<A>),
    Block(usize),
}

/// Composite task running steps and nested blocks.
///
/// # Example
/// ```rust
/// use std::sync::Arc;
/// use tokio_util::sync::CancellationToken;
/// use pipeworks::{Issues, Pipeline};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let mut pipeline: Pipeline<()> = Pipeline::new("deploy");
/// pipeline.add_step_fn(Some("build"), |_args, issues: Issues, _ctx| async move {
///     issues.info("built");
///     Ok(())
/// });
/// pipeline
///     .add_block(Some("publish"))
///     .add_step_fn(Some("upload"), |_args, issues: Issues, _ctx| async move {
///         issues.info("uploaded");
///         Ok(())
///     })
///     .add_step_fn(Some("notify"), |_args, issues: Issues, _ctx| async move {
///         issues.info("notified");
///         Ok(())
///     });
///
/// let result = pipeline.run(Arc::new(()), CancellationToken::new()).await.unwrap();
/// let messages: Vec<_> = result.issues().iter().map(|i| i.message.as_str()).collect();
/// assert_eq!(messages, ["built", "uploaded", "notified"]);
/// # }
/// ```
pub struct Pipeline<A: Send + Sync + 'static> {
    name: String,
    invoke: Invoke,
    sections: Vec<Section<A>>,
    blocks: Vec<Pipeline<A>>,
    bus: Bus,
    registry: Arc<Registry>,
    suffixes: Arc<[Cow<'static, str>]>,
}

/// Builder for a top-level [`Pipeline`] over arguments `A`.
pub struct PipelineBuilder<A> {
    name: String,
    invoke: Invoke,
    bus: Option<Bus>,
    registry: Option<Arc<Registry>>,
    cfg: Config,
    _args: PhantomData<fn(A)>,
}

impl<A: Send + Sync + 'static> PipelineBuilder<A> {
    /// Creates a builder with default [`Config`].
    pub fn new(name: impl Into<String>) -> Self {
        let cfg = Config::default();
        Self {
            name: name.into(),
            invoke: cfg.default_invoke,
            bus: None,
            registry: None,
            cfg,
            _args: PhantomData,
        }
    }

    /// Applies configuration (bus capacity, name suffixes, default mode).
    pub fn with_config(mut self, cfg: Config) -> Self {
        self.invoke = cfg.default_invoke;
        self.cfg = cfg;
        self
    }

    /// Sets the invocation mode.
    pub fn with_invoke(mut self, invoke: Invoke) -> Self {
        self.invoke = invoke;
        self
    }

    /// Sets the registry used to resolve lazy steps.
    pub fn with_registry(mut self, registry: Arc<Registry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Publishes lifecycle events to an existing bus instead of a new one.
    pub fn with_bus(mut self, bus: Bus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Builds the (empty) pipeline.
    pub fn build(self) -> Pipeline<A> {
        let bus = self
            .bus
            .unwrap_or_else(|| Bus::new(self.cfg.bus_capacity_clamped()));
        Pipeline {
            name: self.name,
            invoke: self.invoke,
            sections: Vec::new(),
            blocks: Vec::new(),
            bus,
            registry: self.registry.unwrap_or_default(),
            suffixes: self.cfg.name_suffixes.into(),
        }
    }
}

impl<A: Send + Sync + 'static> Pipeline<A> {
    /// Creates an empty sequential pipeline with its own bus and an empty registry.
    pub fn new(name: impl Into<String>) -> Self {
        PipelineBuilder::new(name).build()
    }

    /// Starts a [`PipelineBuilder`].
    pub fn builder(name: impl Into<String>) -> PipelineBuilder<A> {
        PipelineBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn invoke(&self) -> Invoke {
        self.invoke
    }

    /// Number of direct sub-tasks.
    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Names of the direct sub-tasks, in insertion order.
    pub fn step_names(&self) -> impl Iterator<Item = &str> {
        self.sections.iter().map(|s| self.section_task(s).name())
    }

    /// Bus shared by this pipeline and all its blocks.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Receiver for lifecycle events of subsequent runs (whole tree).
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    /// Appends an eagerly built step.
    pub fn add_step(&mut self, task: TaskRef<A>) -> &mut Self {
        self.sections.push(Section::Step(task));
        self
    }

    /// Appends a closure step; unnamed steps are called `Step {n}`.
    pub fn add_step_fn<F, Fut>(&mut self, name: Option<&str>, f: F) -> &mut Self
    where
        F: Fn(Arc<A>, Issues, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        let name = self.section_name(name, "Step");
        self.add_step(TaskFn::arc(name, f))
    }

    /// Appends a step of type `S` resolved from the registry at run time.
    ///
    /// Unnamed lazy steps take `S`'s simple type name minus the configured suffixes.
    pub fn add_lazy_step<S: Task<A>>(&mut self, name: Option<&str>) -> &mut Self {
        let name = name
            .map(str::to_string)
            .unwrap_or_else(|| type_display_name::<S>(&*self.suffixes));
        let registry = Arc::clone(&self.registry);
        let step = LazyStep::<A, S>::new(name, move || registry.resolve::<S>());
        self.add_step(Arc::new(step))
    }

    /// Appends a parallel block and returns it for further chaining.
    pub fn add_block(&mut self, name: Option<&str>) -> &mut Pipeline<A> {
        self.add_block_with(name, Invoke::Parallel)
    }

    /// Appends a block with an explicit mode and returns it; unnamed blocks are called `Block {n}`.
    pub fn add_block_with(&mut self, name: Option<&str>, invoke: Invoke) -> &mut Pipeline<A> {
        let block = Pipeline {
            name: self.section_name(name, "Block"),
            invoke,
            sections: Vec::new(),
            blocks: Vec::new(),
            bus: self.bus.clone(),
            registry: Arc::clone(&self.registry),
            suffixes: Arc::clone(&self.suffixes),
        };
        let idx = self.blocks.len();
        self.blocks.push(block);
        self.sections.push(Section::Block(idx));
        &mut self.blocks[idx]
    }

    fn section_task<'a>(&'a self, section: &'a Section<A>) -> &'a dyn Task<A> {
        match section {
            Section::Step(task) => task.as_ref(),
            Section::Block(idx) => &self.blocks[*idx],
        }
    }

    fn section_name(&self, name: Option<&str>, kind: &str) -> String {
        name.map(str::to_string)
            .unwrap_or_else(|| format!("{kind} {}", self.sections.len()))
    }

    /// Runs the pipeline.
    ///
    /// On failure the returned [`TaskFailure`] carries the full aggregated result and
    /// the first failing step's error; the same result is published with `TaskEnded`.
    pub async fn run(
        &self,
        args: Arc<A>,
        ctx: CancellationToken,
    ) -> Result<TaskResult, TaskFailure> {
        run_managed(self, args, &ctx, &self.bus).await
    }

    /// Resolves every lazy step (recursively) without running anything.
    ///
    /// The report holds one `Success` issue per resolvable lazy step and one
    /// `Critical` issue per step that would fail to resolve.
    pub fn validate_lazy_steps(&self) -> TaskResult {
        let mut report = TaskResult::new(self.name.clone());
        Task::validate(self, &mut report);
        report
    }

    /// `true` if every lazy step resolves; failures are logged.
    pub fn assert_lazy_steps(&self) -> bool {
        let report = self.validate_lazy_steps();
        for issue in report.issues().iter().filter(|i| i.level.is_failure()) {
            tracing::error!(pipeline = %self.name, "{}", issue.message);
        }
        !report.has_errors()
    }

    async fn run_sequential(
        &self,
        args: Arc<A>,
        issues: &Issues,
        ctx: &CancellationToken,
    ) -> Result<(), TaskError> {
        for (idx, section) in self.sections.iter().enumerate() {
            if ctx.is_cancelled() {
                tracing::debug!(
                    pipeline = %self.name,
                    skipped = self.sections.len() - idx,
                    "cancelled; skipping remaining steps"
                );
                break;
            }
            match run_managed(self.section_task(section), Arc::clone(&args), ctx, &self.bus).await {
                Ok(result) => issues.extend_from(&result),
                Err(failure) => {
                    issues.extend_from(&failure.result);
                    return Err(failure.error);
                }
            }
        }
        Ok(())
    }

    async fn run_parallel(
        &self,
        args: Arc<A>,
        issues: &Issues,
        ctx: &CancellationToken,
    ) -> Result<(), TaskError> {
        if ctx.is_cancelled() {
            return Ok(());
        }
        let runs = self
            .sections
            .iter()
            .map(|section| run_managed(self.section_task(section), Arc::clone(&args), ctx, &self.bus));

        let mut first_error = None;
        for outcome in join_all(runs).await {
            match outcome {
                Ok(result) => issues.extend_from(&result),
                Err(failure) => {
                    issues.extend_from(&failure.result);
                    first_error.get_or_insert(failure.error);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

#[async_trait]
impl<A: Send + Sync + 'static> Task<A> for Pipeline<A> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(
        &self,
        args: Arc<A>,
        issues: Issues,
        ctx: CancellationToken,
    ) -> Result<(), TaskError> {
        tracing::debug!(
            pipeline = %self.name,
            mode = ?self.invoke,
            steps = self.sections.len(),
            "running pipeline"
        );
        match self.invoke {
            Invoke::Sequential => self.run_sequential(args, &issues, &ctx).await,
            Invoke::Parallel => self.run_parallel(args, &issues, &ctx).await,
        }
    }

    fn record_failure(&self, _issues: &Issues, _error: &TaskError) {
        // the failing sub-task already put its error in the trail
    }

    fn validate(&self, report: &mut TaskResult) {
        for section in &self.sections {
            self.section_task(section).validate(report);
        }
    }
}

impl<A: Send + Sync + 'static> fmt::Debug for Pipeline<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("invoke", &self.invoke)
            .field("steps", &self.step_names().collect::<Vec<_>>())
            .finish()
    }
}
