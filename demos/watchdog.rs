//! # Demo: watchdog
//!
//! A task that fails on every third tick, guarded by a timeline restart policy
//! (1s, 2s, 3s, walked twice). The watchdog revives it after each crash until the
//! budget of six revivals runs out; the task then stays dead.
//!
//! ## Flow
//! ```text
//! tick ok, tick ok, tick fails ─► TaskSuspended
//! watchdog pass ─► next_start_time(now) = now + 1s ─► force_start()
//! tick ok, tick ok, tick fails ─► stopped; revival gated until the 1s window passes
//! ...
//! 7th crash ─► next_start_time(now) = None ─► abandoned
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=tickvisor=debug cargo run --example watchdog
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tickvisor::{
    ProcessFn, RestartPolicy, SupervisedTask, TaskConfig, TaskError, Watchdog, WatchdogConfig,
};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tickvisor=info")),
        )
        .init();

    let ticks = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&ticks);
    let every_third = ProcessFn::arc("every-third", move || {
        let n = counter.fetch_add(1, Ordering::Relaxed) + 1;
        async move {
            if n % 3 == 0 {
                Err(TaskError::fail(format!("tick #{n} crashed")))
            } else {
                println!("[every-third] tick #{n} ok");
                Ok(())
            }
        }
    });

    let task = SupervisedTask::builder(every_third)
        .with_config(
            TaskConfig::default()
                .with_initial_delay(Duration::from_millis(200))
                .with_period(Duration::from_millis(300)),
        )
        .with_restart_policy(RestartPolicy::timeline_seconds(&[1, 2, 3], 2)?)
        .build();

    let watchdog = Watchdog::new([task.clone()], WatchdogConfig::every(Duration::from_millis(250)));

    task.start();
    watchdog.start();

    while !(task.is_stopped() && task.restart_policy().is_some_and(|p| p.remaining_attempts() == 0))
    {
        tokio::time::sleep(Duration::from_millis(500)).await;
    }

    watchdog.safe_stop().await;
    println!(
        "[demo] abandoned after {} ticks ({} ok)",
        task.total_process_count(),
        task.successful_process_count()
    );
    Ok(())
}
