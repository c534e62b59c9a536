// Service module - Restart policy and shared flags around the process manager

use crate::config::CoreLayout;
use crate::error::{Result, SupervisorError};
use crate::process::{CoreConfig, OrphanScanner, ProcessManager, ProcessState};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// How long a stopping core gets before SIGKILL
pub const STOP_TIMEOUT: Duration = Duration::from_secs(10);

/// Produces the core configuration to run next
#[async_trait]
pub trait ConfigProvider: Send + Sync {
    async fn core_config(&self) -> Result<CoreConfig>;
}

/// Reads the core configuration from a JSON template on disk
pub struct FileConfigProvider {
    path: PathBuf,
}

impl FileConfigProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ConfigProvider for FileConfigProvider {
    async fn core_config(&self) -> Result<CoreConfig> {
        let contents = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            SupervisorError::ConfigError(format!(
                "Failed to read core template {}: {}",
                self.path.display(),
                e
            ))
        })?;

        CoreConfig::from_json(&contents).map_err(|e| {
            SupervisorError::InvalidConfig(format!("{}: {}", self.path.display(), e))
        })
    }
}

/// What the periodic jobs need from the supervised core
#[async_trait]
pub trait CoreControl: Send + Sync {
    async fn is_running(&self) -> bool;

    /// Not running, and nobody asked it to stop
    async fn did_crash(&self) -> bool;

    /// Start the core with a fresh configuration, replacing a running one
    ///
    /// Without `force`, a running core whose configuration is unchanged is
    /// left alone unless a restart is pending.
    ///
    /// Restarts are serialised, so other callers can wait for one in flight:
    /// at most `STOP_TIMEOUT` for the old core, then the version probe of the
    /// new one (`VERSION_TIMEOUT`).
    async fn restart(&self, force: bool) -> Result<()>;

    async fn api_port(&self) -> Option<u16>;

    async fn set_online_clients(&self, clients: Vec<String>);

    fn set_need_restart(&self);

    /// Read and clear the pending-restart flag
    fn take_need_restart(&self) -> bool;
}

/// Point-in-time view of the core
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreStatus {
    pub state: ProcessState,
    pub version: String,
    pub uptime: Duration,
    pub result: String,
    pub api_port: Option<u16>,
    pub online_clients: Vec<String>,
}

pub struct CoreService {
    manager: Arc<RwLock<ProcessManager>>,
    config_provider: Arc<dyn ConfigProvider>,
    orphans: Mutex<OrphanScanner>,
    need_restart: AtomicBool,
    manually_stopped: AtomicBool,
}

impl CoreService {
    pub fn new(layout: CoreLayout, config_provider: Arc<dyn ConfigProvider>) -> Self {
        let orphans = OrphanScanner::new(layout.binary_name.clone());

        Self {
            manager: Arc::new(RwLock::new(ProcessManager::new(layout))),
            config_provider,
            orphans: Mutex::new(orphans),
            need_restart: AtomicBool::new(false),
            manually_stopped: AtomicBool::new(false),
        }
    }

    pub fn manager(&self) -> Arc<RwLock<ProcessManager>> {
        Arc::clone(&self.manager)
    }

    /// Stop the core on request; the crash watchdog leaves it stopped
    pub async fn stop(&self) -> Result<()> {
        self.manually_stopped.store(true, Ordering::SeqCst);
        self.manager.read().await.stop()
    }

    /// Stop the core and wait for it to exit
    pub async fn shutdown(&self) {
        self.manually_stopped.store(true, Ordering::SeqCst);
        self.manager.read().await.shutdown(STOP_TIMEOUT).await;
    }

    pub fn is_manually_stopped(&self) -> bool {
        self.manually_stopped.load(Ordering::SeqCst)
    }

    pub fn is_need_restart(&self) -> bool {
        self.need_restart.load(Ordering::SeqCst)
    }

    pub async fn result(&self) -> String {
        self.manager.read().await.result()
    }

    pub async fn version(&self) -> String {
        self.manager.read().await.version().to_string()
    }

    pub async fn uptime(&self) -> Duration {
        self.manager.read().await.uptime()
    }

    pub async fn online_clients(&self) -> Vec<String> {
        self.manager.read().await.online_clients()
    }

    pub async fn status(&self) -> CoreStatus {
        let manager = self.manager.read().await;

        CoreStatus {
            state: manager.state(),
            version: manager.version().to_string(),
            uptime: manager.uptime(),
            result: manager.result(),
            api_port: manager.api_port(),
            online_clients: manager.online_clients(),
        }
    }

    fn terminate_orphans(&self, supervised: Option<u32>) {
        let mut scanner = self
            .orphans
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let signalled = scanner.terminate(supervised);
        if signalled > 0 {
            warn!("Terminated {} orphaned core process(es)", signalled);
        }
    }
}

#[async_trait]
impl CoreControl for CoreService {
    async fn is_running(&self) -> bool {
        self.manager.read().await.is_running()
    }

    async fn did_crash(&self) -> bool {
        !self.is_running().await && !self.is_manually_stopped()
    }

    async fn restart(&self, force: bool) -> Result<()> {
        // Held for the whole restart so only one start is ever in flight
        let mut manager = self.manager.write().await;
        self.manually_stopped.store(false, Ordering::SeqCst);

        let config = self.config_provider.core_config().await?;

        if manager.is_running() {
            if !force && manager.config() == Some(&config) && !self.is_need_restart() {
                debug!("Core configuration unchanged, not restarting");
                return Ok(());
            }
            info!("Restarting core (forced: {})", force);
            manager.shutdown(STOP_TIMEOUT).await;
        }

        if let Some(e) = manager.exit_error() {
            info!("Replacing exited core: {}", e);
        }

        let supervised = manager.process().map(|p| p.pid());
        self.terminate_orphans(supervised);

        manager.start(config).await
    }

    async fn api_port(&self) -> Option<u16> {
        self.manager.read().await.api_port()
    }

    async fn set_online_clients(&self, clients: Vec<String>) {
        self.manager.read().await.set_online_clients(clients);
    }

    fn set_need_restart(&self) {
        self.need_restart.store(true, Ordering::SeqCst);
    }

    fn take_need_restart(&self) -> bool {
        self.need_restart.swap(false, Ordering::SeqCst)
    }
}
