//! # Repeat: run a task until a predicate holds.
//!
//! [`Repeat`] drives one task through repeated managed runs, bounded by
//! [`RepeatOptions`]. Each attempt is a full managed run (lifecycle events included).
//!
//! ## Architecture
//! ```text
//! Repeat::task(t).until(pred).with_options(opts).run()
//!
//! loop {
//!   ├─► ctx cancelled? ──────────────────────────► give up
//!   ├─► run_managed(task) ─► err of this attempt (or None)
//!   ├─► tries += 1
//!   ├─► pred(err) ── true ─► publish RepeatSucceeded ─► Ok(true)
//!   ├─► max tries / timeout / cancelled? ────────► give up
//!   │        └─► no error seen       → Ok(false)
//!   │            error in filter     → Ok(false)
//!   │            otherwise           → Err(last error)
//!   ├─► ping_on_retry (failures logged, never raised)
//!   ├─► publish RetryScheduled
//!   └─► clock.sleep(retry_delay.next(tries - 1))  (cut short by ctx)
//! }
//! finally (exactly once) ─► its error alone, or aggregated with the last task error
//! ```
//!
//! ## Rules
//! - Attempts run strictly one after another
//! - The predicate sees only the current attempt's error; giving up uses the last error seen
//! - Try counter and timer are local to one `run`
//! - Time is read from the injected [`Clock`]

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use tokio::select;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::{
    core::{panic_message, run_managed},
    error::{RuntimeError, TaskError},
    events::{Bus, Event, EventKind},
    repeat::{
        clock::{Clock, TokioClock},
        options::{Callback, RepeatOptions},
    },
    tasks::TaskRef,
};

type Until = Arc<dyn Fn(Option<&TaskError>) -> bool + Send + Sync>;

/// Retry loop around a single task.
///
/// # Example
/// ```rust
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicU32, Ordering};
/// use std::time::Duration;
/// use pipeworks::{Repeat, RepeatOptions, TaskError, TaskFn};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let calls = Arc::new(AtomicU32::new(0));
/// let counter = calls.clone();
/// let flaky = TaskFn::arc("flaky", move |_, _, _| {
///     let counter = counter.clone();
///     async move {
///         if counter.fetch_add(1, Ordering::SeqCst) < 2 {
///             return Err(TaskError::fail("not yet"));
///         }
///         Ok(())
///     }
/// });
///
/// let done = Repeat::task(flaky)
///     .until_no_error()
///     .with_options(
///         RepeatOptions::default()
///             .with_max_tries(5)
///             .with_retry_delay(Duration::from_millis(1)),
///     )
///     .run()
///     .await
///     .unwrap();
///
/// assert!(done);
/// assert_eq!(calls.load(Ordering::SeqCst), 3);
/// # }
/// ```
pub struct Repeat<A: Send + Sync + 'static = ()> {
    task: TaskRef<A>,
    args: Arc<A>,
    once: bool,
    until: Option<Until>,
    options: RepeatOptions,
    bus: Bus,
    clock: Arc<dyn Clock>,
    ctx: CancellationToken,
}

impl Repeat<()> {
    /// Repeats a task that takes no arguments.
    pub fn task(task: TaskRef<()>) -> Self {
        Self::task_with_args(task, Arc::new(()))
    }

    /// Runs the task body on the first attempt only; later attempts just re-check the predicate.
    pub fn task_once(task: TaskRef<()>) -> Self {
        Self::task(task).once()
    }
}

impl<A: Send + Sync + 'static> Repeat<A> {
    /// Repeats `task`, passing the same `args` to every attempt.
    pub fn task_with_args(task: TaskRef<A>, args: Arc<A>) -> Self {
        Self {
            task,
            args,
            once: false,
            until: None,
            options: RepeatOptions::default(),
            bus: Bus::default(),
            clock: Arc::new(TokioClock),
            ctx: CancellationToken::new(),
        }
    }

    /// Executes the body on the first attempt only.
    pub fn once(mut self) -> Self {
        self.once = true;
        self
    }

    /// Stop condition, evaluated after every attempt with that attempt's error.
    pub fn until<F>(mut self, pred: F) -> Self
    where
        F: Fn(Option<&TaskError>) -> bool + Send + Sync + 'static,
    {
        self.until = Some(Arc::new(pred));
        self
    }

    /// Stops at the first attempt that does not fail.
    pub fn until_no_error(self) -> Self {
        self.until(|err| err.is_none())
    }

    pub fn with_options(mut self, options: RepeatOptions) -> Self {
        self.options = options;
        self
    }

    /// Publishes attempt and retry events to `bus`.
    pub fn with_bus(mut self, bus: Bus) -> Self {
        self.bus = bus;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Token passed to every attempt; cancelling it ends the loop at the next check.
    pub fn with_cancellation(mut self, ctx: CancellationToken) -> Self {
        self.ctx = ctx;
        self
    }

    /// Runs the loop.
    ///
    /// Returns `Ok(true)` once the predicate holds and `Ok(false)` when giving up without
    /// an error to raise. Fails with [`RuntimeError::MissingPredicate`] before any attempt
    /// if no predicate was set, and with [`RuntimeError::Task`] when giving up on an
    /// error (or when `finally` fails).
    pub async fn run(self) -> Result<bool, RuntimeError> {
        let until = self.until.clone().ok_or(RuntimeError::MissingPredicate)?;
        if self.options.is_unbounded() {
            tracing::warn!(
                task = %self.task.name(),
                "repeat has neither max tries nor a timeout and may run forever"
            );
        }

        let mut last_error = None;
        let outcome = self.repeat(until.as_ref(), &mut last_error).await;

        match self.options.finally.as_ref().map(call_hook) {
            Some(Err(finally_err)) => {
                tracing::warn!(task = %self.task.name(), error = %finally_err, "finally hook failed");
                let err = match last_error {
                    Some(task_err) => task_err.combine(finally_err),
                    None => finally_err,
                };
                Err(RuntimeError::Task(err))
            }
            _ => outcome.map_err(RuntimeError::Task),
        }
    }

    async fn repeat(
        &self,
        until: &(dyn Fn(Option<&TaskError>) -> bool + Send + Sync),
        last_error: &mut Option<TaskError>,
    ) -> Result<bool, TaskError> {
        let started = self.clock.now();
        let mut tries: u32 = 0;

        loop {
            if self.ctx.is_cancelled() {
                return self.give_up("cancelled", tries, last_error.as_ref());
            }

            let error = if self.once && tries > 0 {
                None
            } else {
                self.attempt().await
            };
            tries += 1;
            if let Some(e) = &error {
                *last_error = Some(e.clone());
            }

            if until(error.as_ref()) {
                self.bus.publish(
                    Event::new(EventKind::RepeatSucceeded)
                        .with_task(self.task.name())
                        .with_attempt(tries),
                );
                return Ok(true);
            }

            if let Some(reason) = self.exhausted(tries, started) {
                return self.give_up(reason, tries, last_error.as_ref());
            }

            self.ping(tries);

            let delay = self.options.retry_delay.next(tries - 1);
            let mut scheduled = Event::new(EventKind::RetryScheduled)
                .with_task(self.task.name())
                .with_attempt(tries)
                .with_delay(delay);
            if let Some(e) = &error {
                scheduled = scheduled.with_reason(e.to_string());
            }
            self.bus.publish(scheduled);

            select! {
                _ = self.clock.sleep(delay) => {}
                _ = self.ctx.cancelled() => {}
            }
        }
    }

    async fn attempt(&self) -> Option<TaskError> {
        run_managed(self.task.as_ref(), Arc::clone(&self.args), &self.ctx, &self.bus)
            .await
            .err()
            .map(|failure| failure.error)
    }

    fn exhausted(&self, tries: u32, started: Instant) -> Option<&'static str> {
        if self.options.max_tries.is_some_and(|max| tries >= max) {
            return Some("max tries reached");
        }
        if self
            .options
            .timeout
            .is_some_and(|timeout| self.clock.now().duration_since(started) >= timeout)
        {
            return Some("timeout elapsed");
        }
        if self.ctx.is_cancelled() {
            return Some("cancelled");
        }
        None
    }

    fn give_up(
        &self,
        reason: &'static str,
        tries: u32,
        last_error: Option<&TaskError>,
    ) -> Result<bool, TaskError> {
        tracing::debug!(task = %self.task.name(), tries, reason, "giving up");
        self.bus.publish(
            Event::new(EventKind::RepeatGaveUp)
                .with_task(self.task.name())
                .with_attempt(tries)
                .with_reason(reason),
        );

        match last_error {
            None => Ok(false),
            Some(err)
                if self
                    .options
                    .dont_rethrow_on
                    .as_ref()
                    .is_some_and(|filter| filter.matches(err)) =>
            {
                Ok(false)
            }
            Some(err) => Err(err.clone()),
        }
    }

    fn ping(&self, attempt: u32) {
        let Some(ping) = &self.options.ping_on_retry else {
            return;
        };
        if let Err(e) = call_hook(ping) {
            tracing::warn!(task = %self.task.name(), attempt, error = %e, "ping on retry failed");
            self.bus.publish(
                Event::new(EventKind::PingFailed)
                    .with_task(self.task.name())
                    .with_attempt(attempt)
                    .with_reason(e.to_string()),
            );
        }
    }
}

/// Calls a hook, turning a panic into [`TaskError::Panicked`].
fn call_hook(hook: &Callback) -> Result<(), TaskError> {
    std::panic::catch_unwind(AssertUnwindSafe(|| hook())).unwrap_or_else(|panic| {
        Err(TaskError::Panicked {
            error: panic_message(panic.as_ref()),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, FailureFilter};
    use crate::policies::{BackoffPolicy, JitterPolicy};
    use crate::repeat::clock::ManualClock;
    use crate::tasks::TaskFn;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    /// Task counting its runs; fails with `error()` while `fail` says so.
    fn counting<F>(runs: &Arc<AtomicU32>, fail: F) -> TaskRef<()>
    where
        F: Fn(u32) -> Option<TaskError> + Send + Sync + 'static,
    {
        let runs = runs.clone();
        let fail = Arc::new(fail);
        TaskFn::arc("counted", move |_, _, _| {
            let n = runs.fetch_add(1, Ordering::SeqCst) + 1;
            let outcome = match fail(n) {
                Some(e) => Err(e),
                None => Ok(()),
            };
            async move { outcome }
        })
    }

    fn manual() -> Arc<ManualClock> {
        Arc::new(ManualClock::new())
    }

    fn drain(rx: &mut tokio::sync::broadcast::Receiver<Event>) -> Vec<Event> {
        let mut out = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            out.push(ev);
        }
        out
    }

    #[tokio::test]
    async fn test_success_on_first_try_never_sleeps() {
        let runs = Arc::new(AtomicU32::new(0));
        let clock = manual();
        let done = Repeat::task(counting(&runs, |_| None))
            .until_no_error()
            .with_options(RepeatOptions::default().with_max_tries(5))
            .with_clock(clock.clone())
            .run()
            .await
            .unwrap();

        assert!(done);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(clock.sleeps().is_empty());
    }

    #[tokio::test]
    async fn test_max_tries_bounds_attempts() {
        let runs = Arc::new(AtomicU32::new(0));
        let clock = manual();
        let done = Repeat::task(counting(&runs, |_| None))
            .until(|_| false)
            .with_options(RepeatOptions::default().with_max_tries(3))
            .with_clock(clock.clone())
            .run()
            .await
            .unwrap();

        assert!(!done);
        assert_eq!(runs.load(Ordering::SeqCst), 3);
        assert_eq!(clock.sleeps(), vec![Duration::from_millis(250); 2]);
    }

    #[tokio::test]
    async fn test_gives_up_by_raising_last_error() {
        let runs = Arc::new(AtomicU32::new(0));
        let err = Repeat::task(counting(&runs, |n| Some(TaskError::fail(format!("try {n}")))))
            .until_no_error()
            .with_options(RepeatOptions::default().with_max_tries(3))
            .with_clock(manual())
            .run()
            .await
            .unwrap_err();

        assert_eq!(runs.load(Ordering::SeqCst), 3);
        assert!(matches!(
            err.task_error(),
            Some(TaskError::Fail { error }) if error == "try 3"
        ));
    }

    #[tokio::test]
    async fn test_filtered_error_gives_up_quietly() {
        let runs = Arc::new(AtomicU32::new(0));
        let opts = RepeatOptions::default()
            .with_max_tries(2)
            .with_dont_rethrow_on(FailureFilter::kind(ErrorKind::Timeout));
        let done = Repeat::task(counting(&runs, |_| {
            Some(TaskError::Timeout {
                timeout: Duration::from_secs(1),
            })
        }))
        .until_no_error()
        .with_options(opts)
        .with_clock(manual())
        .run()
        .await
        .unwrap();

        assert!(!done);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_missing_predicate_runs_nothing() {
        let runs = Arc::new(AtomicU32::new(0));
        let err = Repeat::task(counting(&runs, |_| None)).run().await.unwrap_err();
        assert!(matches!(err, RuntimeError::MissingPredicate));
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_finally_runs_once_on_success() {
        let runs = Arc::new(AtomicU32::new(0));
        let finals = Arc::new(AtomicU32::new(0));
        let seen = finals.clone();
        let done = Repeat::task(counting(&runs, |n| (n < 2).then(|| TaskError::fail("early"))))
            .until_no_error()
            .with_options(
                RepeatOptions::default()
                    .with_max_tries(5)
                    .with_finally(move || {
                        seen.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }),
            )
            .with_clock(manual())
            .run()
            .await
            .unwrap();

        assert!(done);
        assert_eq!(finals.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_finally_error_aggregates_with_task_error() {
        let runs = Arc::new(AtomicU32::new(0));
        let err = Repeat::task(counting(&runs, |_| Some(TaskError::fail("task"))))
            .until_no_error()
            .with_options(
                RepeatOptions::default()
                    .with_max_tries(1)
                    .with_finally(|| Err(TaskError::fail("cleanup"))),
            )
            .with_clock(manual())
            .run()
            .await
            .unwrap_err();

        match err.task_error() {
            Some(TaskError::Aggregate { errors }) => {
                assert_eq!(errors.len(), 2);
                assert_eq!(errors[0].to_string(), "execution failed: task");
                assert_eq!(errors[1].to_string(), "execution failed: cleanup");
            }
            other => panic!("expected aggregate, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_finally_error_alone_without_task_error() {
        let runs = Arc::new(AtomicU32::new(0));
        let err = Repeat::task(counting(&runs, |_| None))
            .until_no_error()
            .with_options(RepeatOptions::default().with_finally(|| Err(TaskError::fail("cleanup"))))
            .with_clock(manual())
            .run()
            .await
            .unwrap_err();
        assert!(matches!(err.task_error(), Some(TaskError::Fail { error }) if error == "cleanup"));
    }

    #[tokio::test]
    async fn test_ping_failures_are_swallowed_and_published() {
        let runs = Arc::new(AtomicU32::new(0));
        let pings = Arc::new(AtomicU32::new(0));
        let seen = pings.clone();
        let bus = Bus::new(64);
        let mut rx = bus.subscribe();

        let done = Repeat::task(counting(&runs, |_| None))
            .until(|_| false)
            .with_options(
                RepeatOptions::default()
                    .with_max_tries(3)
                    .with_ping_on_retry(move || {
                        if seen.fetch_add(1, Ordering::SeqCst) == 0 {
                            return Err(TaskError::fail("ping down"));
                        }
                        panic!("ping exploded");
                    }),
            )
            .with_bus(bus)
            .with_clock(manual())
            .run()
            .await
            .unwrap();

        assert!(!done);
        assert_eq!(pings.load(Ordering::SeqCst), 2);
        let ping_failures: Vec<_> = drain(&mut rx)
            .into_iter()
            .filter(|e| e.kind == EventKind::PingFailed)
            .collect();
        assert_eq!(ping_failures.len(), 2);
        assert_eq!(ping_failures[1].reason.as_deref(), Some("task panicked: ping exploded"));
    }

    #[tokio::test]
    async fn test_task_once_only_polls_afterwards() {
        let runs = Arc::new(AtomicU32::new(0));
        let checks = Arc::new(AtomicU32::new(0));
        let seen = checks.clone();
        let done = Repeat::task_once(counting(&runs, |_| None))
            .until(move |_| seen.fetch_add(1, Ordering::SeqCst) == 2)
            .with_options(RepeatOptions::default().with_max_tries(5))
            .with_clock(manual())
            .run()
            .await
            .unwrap();

        assert!(done);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(checks.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_timeout_measured_on_clock() {
        let runs = Arc::new(AtomicU32::new(0));
        let clock = manual();
        let done = Repeat::task(counting(&runs, |_| None))
            .until(|_| false)
            .with_options(
                RepeatOptions::default()
                    .with_timeout(Duration::from_secs(1))
                    .with_retry_delay(Duration::from_millis(300)),
            )
            .with_clock(clock.clone())
            .run()
            .await
            .unwrap();

        assert!(!done);
        // attempts at 0, 300, 600, 900 and 1200ms
        assert_eq!(runs.load(Ordering::SeqCst), 5);
        assert_eq!(clock.sleeps().len(), 4);
    }

    #[tokio::test]
    async fn test_cancellation_ends_loop() {
        let runs = Arc::new(AtomicU32::new(0));
        let ctx = CancellationToken::new();
        let canceller = ctx.clone();
        let bus = Bus::new(64);
        let mut rx = bus.subscribe();
        let done = Repeat::task(counting(&runs, |_| None))
            .until(|_| false)
            .with_options(RepeatOptions::default().with_ping_on_retry(move || {
                canceller.cancel();
                Ok(())
            }))
            .with_cancellation(ctx)
            .with_bus(bus)
            .with_clock(manual())
            .run()
            .await
            .unwrap();

        assert!(!done);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        let gave_up = drain(&mut rx).pop().unwrap();
        assert_eq!(gave_up.kind, EventKind::RepeatGaveUp);
        assert_eq!(gave_up.reason.as_deref(), Some("cancelled"));
        assert_eq!(gave_up.attempt, Some(1));
    }

    #[tokio::test]
    async fn test_backoff_grows_per_try_and_events_follow() {
        let runs = Arc::new(AtomicU32::new(0));
        let clock = manual();
        let bus = Bus::new(64);
        let mut rx = bus.subscribe();
        let backoff = BackoffPolicy {
            first: Duration::from_millis(100),
            max: Duration::from_secs(1),
            factor: 2.0,
            jitter: JitterPolicy::None,
        };

        let result = Repeat::task(counting(&runs, |_| Some(TaskError::fail("down"))))
            .until_no_error()
            .with_options(RepeatOptions::default().with_max_tries(4).with_backoff(backoff))
            .with_bus(bus)
            .with_clock(clock.clone())
            .run()
            .await;

        assert!(result.is_err());
        assert_eq!(
            clock.sleeps(),
            vec![
                Duration::from_millis(100),
                Duration::from_millis(200),
                Duration::from_millis(400)
            ]
        );

        let events = drain(&mut rx);
        let retries: Vec<_> = events
            .iter()
            .filter(|e| e.kind == EventKind::RetryScheduled)
            .map(|e| (e.attempt, e.delay_ms))
            .collect();
        assert_eq!(
            retries,
            vec![(Some(1), Some(100)), (Some(2), Some(200)), (Some(3), Some(400))]
        );
        let gave_up = events.last().unwrap();
        assert_eq!(gave_up.kind, EventKind::RepeatGaveUp);
        assert_eq!(gave_up.reason.as_deref(), Some("max tries reached"));
    }
}
