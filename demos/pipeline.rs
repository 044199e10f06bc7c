//! # Example: pipeline
//!
//! A release pipeline with a parallel block and a lazy step, dispatched by name
//! with command-line style arguments and logged through [`LogWriter`].
//!
//! ## Flow
//! ```text
//! Dispatcher::run("release", ["version=1.4.0"])
//!   └─► Pipeline "release" (Sequential)
//!         ├─► Step "build"
//!         ├─► Block "publish" (Parallel)
//!         │     ├─► Step "upload"   (slow)
//!         │     └─► Step "Mirror"   (lazy, from Registry)
//!         └─► Step "verify"
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=debug cargo run --example pipeline --features logging -- version=1.4.0
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use pipeworks::{
    Dispatcher, Issues, LogWriter, Pipeline, Registry, Subscribe, SubscriberSet, Task, TaskError,
};

type Args = HashMap<String, String>;

/// Copies the release to a mirror; built by the registry when the step runs.
struct MirrorStep {
    host: String,
}

#[async_trait]
impl Task<Args> for MirrorStep {
    fn name(&self) -> &str {
        "mirror"
    }

    async fn run(&self, args: Arc<Args>, issues: Issues, _ctx: CancellationToken) -> Result<(), TaskError> {
        let version = args.get("version").map(String::as_str).unwrap_or("dev");
        tokio::time::sleep(Duration::from_millis(50)).await;
        issues.success(format!("mirrored {version} to {}", self.host));
        Ok(())
    }
}

fn release_pipeline(registry: Arc<Registry>) -> Pipeline<Args> {
    let mut release: Pipeline<Args> = Pipeline::builder("release").with_registry(registry).build();

    release.add_step_fn(Some("build"), |args: Arc<Args>, issues: Issues, _| async move {
        let version = args.get("version").cloned().unwrap_or_else(|| "dev".into());
        issues.info(format!("compiled {version}"));
        Ok(())
    });

    release
        .add_block(Some("publish"))
        .add_step_fn(Some("upload"), |_, issues: Issues, ctx: CancellationToken| async move {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_millis(200)) => {
                    issues.success("uploaded artifacts");
                    Ok(())
                }
                _ = ctx.cancelled() => Err(TaskError::Canceled),
            }
        })
        .add_lazy_step::<MirrorStep>(None);

    release.add_step_fn(Some("verify"), |_, issues: Issues, _| async move {
        issues.warn("checksum service slow, verified locally");
        Ok(())
    });

    release
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut registry = Registry::new();
    registry.register_with(|| MirrorStep {
        host: "mirror.internal".into(),
    });

    let release = release_pipeline(Arc::new(registry));
    if !release.assert_lazy_steps() {
        anyhow::bail!("release pipeline has unresolved steps");
    }

    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    let logger = SubscriberSet::attach(subs, release.bus());

    let mut dispatcher = Dispatcher::new();
    dispatcher.register("release", release);

    let argv: Vec<String> = std::env::args().skip(1).collect();
    let outcome = dispatcher.run("release", &argv, CancellationToken::new()).await;
    logger.shutdown().await;

    let result = outcome?;
    println!("[main] {} issues:", result.issues().len());
    for issue in result.issues() {
        println!("  {:>8}  {}", issue.level, issue.message);
    }
    Ok(())
}
