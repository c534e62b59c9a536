use crate::error::Result;
use crate::jobs::Job;
use crate::service::CoreControl;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Applies a restart requested by another job, e.g. after a client hit
/// its traffic limit
pub struct PendingRestartJob {
    core: Arc<dyn CoreControl>,
}

impl PendingRestartJob {
    pub fn new(core: Arc<dyn CoreControl>) -> Self {
        Self { core }
    }
}

#[async_trait]
impl Job for PendingRestartJob {
    fn name(&self) -> &'static str {
        "pending-restart"
    }

    async fn run(&self) -> Result<()> {
        if !self.core.take_need_restart() {
            return Ok(());
        }

        info!("Applying pending core restart");
        self.core.restart(true).await
    }
}
