use crate::error::{Result, SupervisorError};
use crate::jobs::Job;
use crate::service::CoreControl;
use crate::traffic::{
    ReportSettings, TrafficAccumulator, TrafficDelta, TrafficReporter, TrafficSource,
};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Polls traffic from the running core and fans it out
///
/// Each cycle updates the online-client list, feeds the inbound and outbound
/// accumulators, optionally posts the delta to an external endpoint, and
/// requests a core restart when either accumulator asks for one.
pub struct TrafficJob {
    core: Arc<dyn CoreControl>,
    source: Arc<dyn TrafficSource>,
    inbound_accumulator: Arc<dyn TrafficAccumulator>,
    outbound_accumulator: Arc<dyn TrafficAccumulator>,
    settings: Arc<dyn ReportSettings>,
    reporter: TrafficReporter,
}

impl TrafficJob {
    pub fn new(
        core: Arc<dyn CoreControl>,
        source: Arc<dyn TrafficSource>,
        inbound_accumulator: Arc<dyn TrafficAccumulator>,
        outbound_accumulator: Arc<dyn TrafficAccumulator>,
        settings: Arc<dyn ReportSettings>,
        reporter: TrafficReporter,
    ) -> Self {
        Self {
            core,
            source,
            inbound_accumulator,
            outbound_accumulator,
            settings,
            reporter,
        }
    }

    async fn inform(&self, delta: &TrafficDelta) -> Result<()> {
        if !self.settings.report_enabled().await? {
            return Ok(());
        }
        let url = self.settings.report_url().await?;
        self.reporter.report(&url, delta).await
    }
}

/// An accumulator error counts as "no restart needed"
async fn accumulate(
    accumulator: &dyn TrafficAccumulator,
    kind: &str,
    delta: &TrafficDelta,
) -> bool {
    match accumulator.add_traffic(delta).await {
        Ok(need_restart) => need_restart,
        Err(e) => {
            warn!("Failed to add {} traffic: {}", kind, e);
            false
        }
    }
}

#[async_trait]
impl Job for TrafficJob {
    fn name(&self) -> &'static str {
        "traffic"
    }

    async fn run(&self) -> Result<()> {
        if !self.core.is_running().await {
            debug!("Core is not running, skipping traffic collection");
            return Ok(());
        }

        let api_port = self.core.api_port().await.ok_or_else(|| {
            SupervisorError::TrafficQueryError("core has no api inbound".to_string())
        })?;

        let delta = self.source.fetch(api_port).await?;
        debug!(
            "Collected traffic for {} inbounds and {} clients",
            delta.inbounds.len(),
            delta.clients.len()
        );

        self.core.set_online_clients(delta.online_clients()).await;

        let inbound_restart = accumulate(&*self.inbound_accumulator, "inbound", &delta).await;
        let outbound_restart = accumulate(&*self.outbound_accumulator, "outbound", &delta).await;

        if let Err(e) = self.inform(&delta).await {
            warn!("Failed to inform external API about traffic: {}", e);
        }

        if inbound_restart || outbound_restart {
            info!("Traffic accounting requested a core restart");
            self.core.set_need_restart();
        }

        Ok(())
    }
}
