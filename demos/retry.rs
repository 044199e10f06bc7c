//! # Example: retry
//!
//! Polls a flaky service with [`Repeat`] until it answers, waiting longer after
//! each failure and giving up after five tries.
//!
//! ## Flow
//! ```text
//! Repeat::run()
//!   ├─► attempt 1 → Err("connection refused") → RetryScheduled{delay≈100ms}
//!   ├─► attempt 2 → Err("connection refused") → RetryScheduled{delay≈200ms}
//!   ├─► attempt 3 → Ok  → until_no_error() holds → RepeatSucceeded
//!   └─► finally
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example retry --features logging
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use pipeworks::{
    BackoffPolicy, Bus, JitterPolicy, LogWriter, Repeat, RepeatOptions, Subscribe, SubscriberSet,
    TaskError, TaskFn,
};

static CALLS: AtomicU32 = AtomicU32::new(0);

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let bus = Bus::new(128);
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    let logger = SubscriberSet::attach(subs, &bus);

    let probe = TaskFn::arc("probe", |_, issues, _| async move {
        let call = CALLS.fetch_add(1, Ordering::Relaxed) + 1;
        if call <= 2 {
            return Err(TaskError::fail("connection refused"));
        }
        issues.success(format!("service answered on call {call}"));
        Ok(())
    });

    let options = RepeatOptions::default()
        .with_max_tries(5)
        .with_timeout(Duration::from_secs(10))
        .with_backoff(
            BackoffPolicy::exponential(Duration::from_millis(100), Duration::from_secs(2))
                .with_jitter(JitterPolicy::Equal),
        )
        .with_ping_on_retry(|| {
            println!("[main] still waiting...");
            Ok(())
        })
        .with_finally(|| {
            println!("[main] closing connection pool");
            Ok(())
        });

    let answered = Repeat::task(probe)
        .until_no_error()
        .with_options(options)
        .with_bus(bus)
        .run()
        .await;
    logger.shutdown().await;

    println!("[main] service up: {}", answered?);
    Ok(())
}
