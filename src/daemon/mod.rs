// Daemon module - Wires the core service, the jobs and the scheduler together

use crate::config::SupervisorConfig;
use crate::error::{Result, SupervisorError};
use crate::jobs::{
    CrashWatchdogJob, LogRotationJob, PendingRestartJob, Scheduler, TrafficJob,
};
use crate::logs::LogFileSet;
use crate::service::{CoreControl, CoreService, FileConfigProvider};
use crate::traffic::{ReportSettings, TrafficAccumulator, TrafficReporter, TrafficSource};
use std::future::Future;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

/// Collaborators the traffic job needs from its host
pub struct TrafficCollaborators {
    pub source: Arc<dyn TrafficSource>,
    pub inbound_accumulator: Arc<dyn TrafficAccumulator>,
    pub outbound_accumulator: Arc<dyn TrafficAccumulator>,
    /// Report target read on every cycle; `[traffic_report]` when unset
    pub settings: Option<Arc<dyn ReportSettings>>,
}

/// Main daemon struct that coordinates all components
pub struct Daemon {
    config: SupervisorConfig,
    service: Arc<CoreService>,
    traffic: Option<TrafficCollaborators>,
}

impl Daemon {
    pub fn new(config: SupervisorConfig) -> Result<Self> {
        let template = config.core_template.clone().ok_or_else(|| {
            SupervisorError::ConfigError("core_template must be set to run the core".to_string())
        })?;

        let provider = Arc::new(FileConfigProvider::new(template));
        let service = Arc::new(CoreService::new(config.layout(), provider));

        Ok(Self {
            config,
            service,
            traffic: None,
        })
    }

    /// Enable the traffic job
    pub fn with_traffic(mut self, collaborators: TrafficCollaborators) -> Self {
        self.traffic = Some(collaborators);
        self
    }

    pub fn service(&self) -> Arc<CoreService> {
        Arc::clone(&self.service)
    }

    /// Build the scheduler with every job this daemon runs
    pub fn scheduler(&self) -> Result<Scheduler> {
        let jobs = &self.config.jobs;
        let core: Arc<dyn CoreControl> = self.service.clone();

        let mut scheduler = Scheduler::new()
            .every(
                jobs.crash_check(),
                Arc::new(CrashWatchdogJob::new(Arc::clone(&core))),
            )
            .every(
                jobs.pending_restart(),
                Arc::new(PendingRestartJob::new(Arc::clone(&core))),
            )
            .every(
                jobs.log_rotation(),
                Arc::new(LogRotationJob::new(LogFileSet::ip_limit(&self.config.log_dir))),
            );

        if let Some(ref traffic) = self.traffic {
            let reporter = TrafficReporter::new(self.config.traffic_report.timeout())?;
            let job = TrafficJob::new(
                Arc::clone(&core),
                Arc::clone(&traffic.source),
                Arc::clone(&traffic.inbound_accumulator),
                Arc::clone(&traffic.outbound_accumulator),
                self.report_settings(traffic),
                reporter,
            );
            scheduler = scheduler.every(jobs.traffic(), Arc::new(job));
        }

        Ok(scheduler)
    }

    fn report_settings(&self, traffic: &TrafficCollaborators) -> Arc<dyn ReportSettings> {
        match traffic.settings {
            Some(ref settings) => Arc::clone(settings),
            None => Arc::new(self.config.traffic_report.clone()),
        }
    }

    /// Start the core, run the jobs until SIGINT or SIGTERM, then stop
    /// everything
    pub async fn run(self) -> Result<()> {
        self.run_until(shutdown_signal()).await
    }

    /// Like `run`, stopping when `shutdown` resolves
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        info!("Starting proxy supervisor");

        let scheduler = self.scheduler()?;

        // A failed first start is left to the crash watchdog
        if let Err(e) = self.service.restart(true).await {
            error!("Initial core start failed: {}", e);
        }

        let handle = scheduler.start();
        info!("Supervisor started successfully");

        shutdown.await;

        info!("Stopping supervisor...");
        handle.shutdown();
        self.service.shutdown().await;
        info!("Supervisor stopped");

        Ok(())
    }
}

/// Resolves on SIGTERM or SIGINT
pub async fn shutdown_signal() {
    let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(e) => {
            warn!("Failed to install SIGTERM handler: {}", e);
            if let Err(e) = signal::ctrl_c().await {
                error!("Failed to wait for SIGINT: {}", e);
            }
            return;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => info!("Received SIGTERM"),
        result = signal::ctrl_c() => match result {
            Ok(()) => info!("Received SIGINT"),
            Err(e) => error!("Failed to wait for SIGINT: {}", e),
        },
    }
}
