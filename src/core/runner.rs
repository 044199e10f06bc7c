//! # Run a task once as a managed unit.
//!
//! Executes one run of a [`Task`], publishes lifecycle events to [`Bus`] and turns the
//! outcome into a [`TaskResult`] or a [`TaskFailure`].
//!
//! ## Event flow
//!
//! ```text
//! Skipped (ctx already cancelled):
//!   publish TaskStarted → publish TaskEnded (empty result) → Ok
//!
//! Success:
//!   publish TaskStarted → task.run() ─┬─ issues.push() → publish IssueLogged (live)
//!                                     └─ Ok(()) → publish TaskEnded(result, elapsed) → Ok(result)
//!
//! Failure / panic:
//!   publish TaskStarted → task.run() → Err(e) → record_failure(e)
//!                                             → publish TaskEnded(result, e)
//!                                             → Err(TaskFailure { result, e })
//! ```
//!
//! ## Rules
//! - Always publishes **exactly one** `TaskEnded`, from a drop guard, so it also fires
//!   when the run future is dropped mid-flight
//! - Cancellation before start is **not** an error
//! - Panics in the body are caught and reported as [`TaskError::Panicked`]
//! - The result inside `TaskEnded` and the returned failure describe the same fault
//! - Issues written by the body (and by `record_failure`) stream out as `IssueLogged`
//!   while the task runs

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::{
    error::{TaskError, TaskFailure},
    events::{Bus, Event, EventKind},
    tasks::{Issues, Task, TaskResult},
};

/// Publishes `TaskEnded` once, when dropped.
struct EndGuard<'a> {
    bus: &'a Bus,
    name: &'a str,
    started: Instant,
    ended: Option<Event>,
}

impl<'a> EndGuard<'a> {
    fn new(bus: &'a Bus, name: &'a str) -> Self {
        Self {
            bus,
            name,
            started: Instant::now(),
            ended: None,
        }
    }

    fn finish(&mut self, result: &TaskResult, error: Option<&TaskError>) {
        let mut ev = Event::new(EventKind::TaskEnded)
            .with_task(self.name)
            .with_result(result.clone())
            .with_elapsed(self.started.elapsed());
        if let Some(e) = error {
            ev = ev.with_reason(e.to_string());
        }
        self.ended = Some(ev);
    }
}

impl Drop for EndGuard<'_> {
    fn drop(&mut self) {
        let ev = self.ended.take().unwrap_or_else(|| {
            Event::new(EventKind::TaskEnded)
                .with_task(self.name)
                .with_result(TaskResult::new(self.name))
                .with_elapsed(self.started.elapsed())
                .with_reason("aborted")
        });
        self.bus.publish(ev);
    }
}

/// Executes `task` once, publishing lifecycle events to `bus`.
///
/// ### Flow
/// 1. Publish `TaskStarted`
/// 2. Skip the body if `ctx` is already cancelled
/// 3. Run the body with a fresh [`Issues`] sink bound to `bus`, catching panics
/// 4. On error let the task record it ([`Task::record_failure`])
/// 5. Publish `TaskEnded` (via guard) and return
pub async fn run_managed<A, T>(
    task: &T,
    args: Arc<A>,
    ctx: &CancellationToken,
    bus: &Bus,
) -> Result<TaskResult, TaskFailure>
where
    A: Send + Sync + 'static,
    T: Task<A> + ?Sized,
{
    let name = task.name();
    bus.publish(Event::new(EventKind::TaskStarted).with_task(name));
    let mut guard = EndGuard::new(bus, name);

    if ctx.is_cancelled() {
        let result = TaskResult::new(name);
        guard.finish(&result, None);
        return Ok(result);
    }

    let issues = Issues::live(bus, name);
    let outcome = AssertUnwindSafe(task.run(args, issues.clone(), ctx.clone()))
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| {
            Err(TaskError::Panicked {
                error: panic_message(panic.as_ref()),
            })
        });

    match outcome {
        Ok(()) => {
            let result = TaskResult::with_issues(name, issues.take());
            guard.finish(&result, None);
            Ok(result)
        }
        Err(error) => {
            task.record_failure(&issues, &error);
            let result = TaskResult::with_issues(name, issues.take());
            guard.finish(&result, Some(&error));
            Err(TaskFailure { result, error })
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::{Level, TaskFn, TaskRef};
    use std::sync::atomic::{AtomicBool, Ordering};

    fn drain(rx: &mut tokio::sync::broadcast::Receiver<Event>) -> Vec<Event> {
        let mut out = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            out.push(ev);
        }
        out
    }

    #[tokio::test]
    async fn test_success_publishes_started_then_ended() {
        let bus = Bus::default();
        let mut rx = bus.subscribe();
        let task: TaskRef<()> = TaskFn::arc("ok", |_, issues: Issues, _| async move {
            issues.info("did it");
            Ok(())
        });

        let result = run_managed(task.as_ref(), Arc::new(()), &CancellationToken::new(), &bus)
            .await
            .unwrap();
        assert_eq!(result.issues().len(), 1);

        let events = drain(&mut rx);
        let kinds: Vec<_> = events.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![EventKind::TaskStarted, EventKind::IssueLogged, EventKind::TaskEnded]
        );
        assert_eq!(events[1].issue.as_ref().unwrap().message, "did it");
        let ended = events[2].result.as_ref().unwrap();
        assert_eq!(ended.name(), "ok");
        assert!(events[2].reason.is_none());
        assert!(events[2].elapsed_ms.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_issues_stream_before_the_run_ends() {
        let bus = Bus::default();
        let mut rx = bus.subscribe();
        let task: TaskRef<()> = TaskFn::arc("slow", |_, issues: Issues, _| async move {
            issues.info("halfway");
            tokio::time::sleep(std::time::Duration::from_millis(1500)).await;
            Ok(())
        });

        let ctx = CancellationToken::new();
        let fut = run_managed(task.as_ref(), Arc::new(()), &ctx, &bus);
        tokio::pin!(fut);
        assert!(futures::poll!(fut.as_mut()).is_pending());
        let kinds: Vec<_> = drain(&mut rx).iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![EventKind::TaskStarted, EventKind::IssueLogged]);

        fut.await.unwrap();
        let ended = drain(&mut rx).pop().unwrap();
        assert_eq!(ended.kind, EventKind::TaskEnded);
        let elapsed = ended.elapsed_ms.unwrap();
        assert!((1500..1510).contains(&elapsed), "elapsed {elapsed}ms");
    }

    #[tokio::test]
    async fn test_cancelled_before_start_skips_body() {
        let bus = Bus::default();
        let mut rx = bus.subscribe();
        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        let task: TaskRef<()> = TaskFn::arc("skipped", move |_, _, _| {
            let flag = flag.clone();
            async move {
                flag.store(true, Ordering::SeqCst);
                Ok(())
            }
        });

        let ctx = CancellationToken::new();
        ctx.cancel();
        let result = run_managed(task.as_ref(), Arc::new(()), &ctx, &bus)
            .await
            .unwrap();

        assert!(result.is_empty());
        assert!(!ran.load(Ordering::SeqCst));
        assert_eq!(drain(&mut rx).len(), 2);
    }

    #[tokio::test]
    async fn test_error_is_captured_and_returned() {
        let bus = Bus::default();
        let mut rx = bus.subscribe();
        let task: TaskRef<()> =
            TaskFn::arc("boom", |_, _, _| async { Err(TaskError::fail("buuh")) });

        let failure = run_managed(task.as_ref(), Arc::new(()), &CancellationToken::new(), &bus)
            .await
            .unwrap_err();

        assert!(matches!(failure.error, TaskError::Fail { ref error } if error == "buuh"));
        let issue = &failure.result.issues()[0];
        assert_eq!(issue.level, Level::Error);
        assert_eq!(issue.error.as_ref().map(TaskError::as_label), Some("task_failed"));

        let ended = drain(&mut rx).pop().unwrap();
        assert_eq!(ended.kind, EventKind::TaskEnded);
        assert_eq!(ended.result.unwrap().errors().count(), 1);
        assert_eq!(ended.reason.as_deref(), Some("execution failed: buuh"));
    }

    #[tokio::test]
    async fn test_panic_becomes_error() {
        let bus = Bus::default();
        let task: TaskRef<()> = TaskFn::arc("panics", |_, _, _| async {
            if true {
                panic!("kaboom");
            }
            Ok(())
        });

        let failure = run_managed(task.as_ref(), Arc::new(()), &CancellationToken::new(), &bus)
            .await
            .unwrap_err();
        assert!(matches!(failure.error, TaskError::Panicked { ref error } if error == "kaboom"));
    }

    #[tokio::test]
    async fn test_dropped_run_still_publishes_ended() {
        let bus = Bus::default();
        let mut rx = bus.subscribe();
        let task: TaskRef<()> = TaskFn::arc("slow", |_, _, _| async {
            futures::future::pending::<()>().await;
            Ok(())
        });

        let ctx = CancellationToken::new();
        {
            let fut = run_managed(task.as_ref(), Arc::new(()), &ctx, &bus);
            tokio::pin!(fut);
            assert!(futures::poll!(fut.as_mut()).is_pending());
        }

        let events = drain(&mut rx);
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].kind, EventKind::TaskEnded);
        assert_eq!(events[1].reason.as_deref(), Some("aborted"));
    }
}
