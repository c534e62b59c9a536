use crate::error::Result;
use crate::jobs::Job;
use crate::service::CoreControl;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Consecutive crash observations tolerated before restarting
const CRASH_THRESHOLD: u32 = 1;

/// Restarts the core once a crash has been seen on two consecutive checks
///
/// A single observation can be a restart in progress, so it only arms the
/// counter. The counter is reset after every restart attempt, successful or
/// not, and whenever the core is seen healthy.
pub struct CrashWatchdogJob {
    core: Arc<dyn CoreControl>,
    crash_count: AtomicU32,
}

impl CrashWatchdogJob {
    pub fn new(core: Arc<dyn CoreControl>) -> Self {
        Self {
            core,
            crash_count: AtomicU32::new(0),
        }
    }

    pub fn crash_count(&self) -> u32 {
        self.crash_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Job for CrashWatchdogJob {
    fn name(&self) -> &'static str {
        "crash-watchdog"
    }

    async fn run(&self) -> Result<()> {
        if !self.core.did_crash().await {
            if self.crash_count.swap(0, Ordering::SeqCst) > 0 {
                debug!("Core is running normally again");
            }
            return Ok(());
        }

        let count = self.crash_count.fetch_add(1, Ordering::SeqCst) + 1;
        warn!("Core crash detected (count: {})", count);
        if count <= CRASH_THRESHOLD {
            return Ok(());
        }

        info!("Restarting core after repeated crash detection");
        let result = self.core.restart(false).await;
        self.crash_count.store(0, Ordering::SeqCst);

        match result {
            Ok(()) => info!("Core restarted successfully"),
            Err(e) => error!("Failed to restart core: {}", e),
        }
        Ok(())
    }
}
