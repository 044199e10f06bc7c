//! # Lazy steps.
//!
//! A [`LazyStep`] stands in for a step type `S` that is produced by a resolver at run
//! time (typically [`Registry::resolve`](crate::Registry::resolve)). Resolution failures
//! surface as [`TaskError::Unresolved`], recorded as a `Critical` issue, so callers can
//! tell broken wiring from failing business logic.
//!
//! ```text
//! LazyStep::run()
//!   ├─► resolve() ── Err ──► TaskError::Unresolved (Critical issue)
//!   └─► Ok(step)  ──► step.run(args, issues, ctx)
//! ```

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::{ResolveError, TaskError};
use crate::tasks::result::{Issue, Issues, Level, TaskResult};
use crate::tasks::task::Task;

type ResolveFn<S> = dyn Fn() -> Result<Arc<S>, ResolveError> + Send + Sync;

/// Step whose instance is resolved on every run instead of at build time.
pub struct LazyStep<A, S> {
    name: String,
    resolve: Arc<ResolveFn<S>>,
    _args: PhantomData<fn(A)>,
}

impl<A, S> LazyStep<A, S> {
    /// Creates a lazy step named `name` backed by `resolve`.
    pub fn new<F>(name: impl Into<String>, resolve: F) -> Self
    where
        F: Fn() -> Result<Arc<S>, ResolveError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            resolve: Arc::new(resolve),
            _args: PhantomData,
        }
    }

    /// Runs the resolver without running the step.
    pub fn try_resolve(&self) -> Result<Arc<S>, TaskError> {
        (self.resolve)().map_err(|e| TaskError::Unresolved {
            step: self.name.clone(),
            reason: e.to_string(),
        })
    }
}

impl<A, S> fmt::Debug for LazyStep<A, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyStep")
            .field("name", &self.name)
            .field("step_type", &std::any::type_name::<S>())
            .finish()
    }
}

#[async_trait]
impl<A, S> Task<A> for LazyStep<A, S>
where
    A: Send + Sync + 'static,
    S: Task<A>,
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
        let step = self.try_resolve().inspect_err(|e| {
            tracing::warn!(step = %self.name, error = %e, "lazy step resolution failed");
        })?;
        step.run(args, issues, ctx).await
    }

    fn validate(&self, report: &mut TaskResult) {
        match self.try_resolve() {
            Ok(_) => report.push(Issue::new(
                Level::Success,
                format!("{}: resolves to {}", self.name, std::any::type_name::<S>()),
            )),
            Err(e) => report.push(Issue::failure(&e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Probe;

    #[async_trait]
    impl Task<()> for Probe {
        fn name(&self) -> &str {
            "probe"
        }

        async fn run(&self, _: Arc<()>, issues: Issues, _: CancellationToken) -> Result<(), TaskError> {
            issues.info("probed");
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_resolved_step_runs_body() {
        let lazy: LazyStep<(), Probe> = LazyStep::new("Probe", || Ok(Arc::new(Probe)));
        let issues = Issues::new();
        lazy.run(Arc::new(()), issues.clone(), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(issues.snapshot()[0].message, "probed");
    }

    #[tokio::test]
    async fn test_unresolved_step_raises_distinct_error() {
        let lazy: LazyStep<(), Probe> = LazyStep::new("Probe", || {
            Err(ResolveError::NotRegistered { type_name: "Probe" })
        });
        let err = lazy
            .run(Arc::new(()), Issues::new(), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, TaskError::Unresolved { ref step, .. } if step == "Probe"));
    }

    #[test]
    fn test_validate_reports_per_step() {
        let ok: LazyStep<(), Probe> = LazyStep::new("Good", || Ok(Arc::new(Probe)));
        let bad: LazyStep<(), Probe> = LazyStep::new("Bad", || {
            Err(ResolveError::NotRegistered { type_name: "Probe" })
        });
        let mut report = TaskResult::new("validation");
        Task::<()>::validate(&ok, &mut report);
        Task::<()>::validate(&bad, &mut report);

        let levels: Vec<_> = report.issues().iter().map(|i| i.level).collect();
        assert_eq!(levels, vec![Level::Success, Level::Critical]);
    }
}
