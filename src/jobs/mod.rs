// Jobs module - Periodic tasks driven by the scheduler

mod crash_watchdog;
mod log_rotation;
mod pending_restart;
mod scheduler;
mod traffic;

pub use crash_watchdog::CrashWatchdogJob;
pub use log_rotation::LogRotationJob;
pub use pending_restart::PendingRestartJob;
pub use scheduler::{Scheduler, SchedulerHandle};
pub use traffic::TrafficJob;

use crate::error::Result;
use async_trait::async_trait;
use std::any::Any;
use std::sync::Arc;
use tracing::error;

/// A unit of periodic work
///
/// Errors returned from `run` end the current cycle only; the scheduler logs
/// them and runs the job again on its next tick.
#[async_trait]
pub trait Job: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self) -> Result<()>;
}

/// Run one cycle of `job`, containing its errors and panics
///
/// Returns `true` if the cycle completed without error.
pub async fn run_guarded(job: Arc<dyn Job>) -> bool {
    let name = job.name();

    match tokio::spawn(async move { job.run().await }).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            error!("Job {} failed: {}", name, e);
            false
        }
        Err(e) if e.is_panic() => {
            error!("Job {} panicked: {}", name, panic_message(e.into_panic()));
            false
        }
        Err(e) => {
            error!("Job {} was cancelled: {}", name, e);
            false
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
