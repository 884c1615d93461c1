//! # Demo: dispatcher
//!
//! Three tasks behind one [`Dispatcher`]:
//! - `heartbeat`: never fails;
//! - `ingest`: fails now and then, revived with a multiplying backoff;
//! - `one-shot`: no restart policy, dies on its first failure.
//!
//! Lifecycle events flow through a shared bus into the built-in `LogWriter`.
//! Press Ctrl-C to stop: the watchdog goes first, then every task.
//!
//! ## Run
//! ```bash
//! RUST_LOG=info cargo run --example dispatcher
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tickvisor::{
    Bus, Dispatcher, LogWriter, ProcessFn, RestartPolicy, Subscribe, SupervisedTask, TaskConfig,
    TaskError, WatchdogConfig,
};
use tracing_subscriber::EnvFilter;

fn fast() -> TaskConfig {
    TaskConfig::default()
        .with_initial_delay(Duration::from_millis(100))
        .with_period(Duration::from_millis(500))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let bus = Bus::default();

    let heartbeat = SupervisedTask::builder(ProcessFn::arc("heartbeat", || async {
        Ok::<_, TaskError>(())
    }))
    .with_config(fast())
    .with_bus(bus.clone())
    .build();

    let batches = Arc::new(AtomicU64::new(0));
    let ingest = SupervisedTask::builder(ProcessFn::arc("ingest", move || {
        let n = batches.fetch_add(1, Ordering::Relaxed) + 1;
        async move {
            if n % 5 == 0 {
                Err(TaskError::fail(format!("batch #{n}: upstream timeout")))
            } else {
                Ok(())
            }
        }
    }))
    .with_config(fast())
    .with_restart_policy(RestartPolicy::multiply(10, Duration::from_millis(500))?)
    .with_bus(bus.clone())
    .build();

    let one_shot = SupervisedTask::builder(ProcessFn::arc("one-shot", || async {
        Err::<(), _>(TaskError::fail("misconfigured"))
    }))
    .with_config(fast())
    .with_bus(bus.clone())
    .build();

    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    let dispatcher = Dispatcher::builder(vec![heartbeat, ingest, one_shot])
        .with_watchdog(WatchdogConfig::every(Duration::from_millis(250)))
        .with_bus(bus)
        .with_subscribers(subs)
        .build()?;

    println!("[demo] running, press Ctrl-C to stop");
    dispatcher.run_until_signal().await?;
    Ok(())
}
