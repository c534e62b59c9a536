use crate::config::CoreLayout;
use crate::error::{Result, SupervisorError};
use crate::logs::LogCapture;
use crate::process::core_config::CoreConfig;
use crate::process::spawner::{query_version, spawn_core, UNKNOWN_VERSION};
use crate::process::types::{ExitRecord, ProcessState};
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::sync::RwLock;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{error, info, warn};

/// One launched core process
#[derive(Debug)]
pub struct Process {
    pid: u32,
    config: CoreConfig,
    version: String,
    api_port: Option<u16>,
    started_at: Instant,
    capture: LogCapture,
    /// `None` until the wait task publishes the exit
    exit: watch::Receiver<Option<ExitRecord>>,
    online_clients: RwLock<Vec<String>>,
}

impl Process {
    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn exit_record(&self) -> Option<ExitRecord> {
        self.exit.borrow().clone()
    }

    /// Liveness check that also rules out an unreaped child
    ///
    /// A recorded exit always wins. Otherwise signal 0 probes for the PID
    /// without affecting it.
    pub fn is_running(&self) -> bool {
        if self.exit.borrow().is_some() {
            return false;
        }
        signal::kill(Pid::from_raw(self.pid as i32), None).is_ok()
    }

    /// Wait up to `timeout` for the exit to be published
    pub async fn wait_for_exit(&self, timeout: Duration) -> Option<ExitRecord> {
        let mut exit = self.exit.clone();
        let waited = tokio::time::timeout(timeout, async move {
            // Bound first: the watch `Ref` must drop before `exit` does
            let record = exit.wait_for(Option::is_some).await.ok().and_then(|r| r.clone());
            record
        })
        .await;

        waited.ok().flatten()
    }
}

/// Owns the single supervised core process
///
/// Only `start` mutates the manager, so the shared owner serialises it
/// behind a write lock. The online-client list is the one field written
/// through a shared reference and has its own lock.
pub struct ProcessManager {
    layout: CoreLayout,
    process: Option<Process>,
    /// Why the last `start` failed, for `result()`
    start_error: Option<String>,
}

impl ProcessManager {
    pub fn new(layout: CoreLayout) -> Self {
        Self {
            layout,
            process: None,
            start_error: None,
        }
    }

    pub fn layout(&self) -> &CoreLayout {
        &self.layout
    }

    /// Write `config` and launch the core
    ///
    /// Returns as soon as the process is spawned; readiness is not awaited.
    /// The exit is observed by a background task and becomes visible through
    /// `is_running` and `result`.
    pub async fn start(&mut self, config: CoreConfig) -> Result<()> {
        if self.is_running() {
            return Err(SupervisorError::AlreadyRunning);
        }

        match self.launch(config).await {
            Ok(process) => {
                info!(
                    "Core started (PID: {}, version: {}, api port: {:?})",
                    process.pid, process.version, process.api_port
                );
                self.process = Some(process);
                self.start_error = None;
                Ok(())
            }
            Err(e) => {
                error!("Failure in running core process: {}", e);
                self.start_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    async fn launch(&self, config: CoreConfig) -> Result<Process> {
        let data = config
            .to_pretty_json()
            .map_err(|e| SupervisorError::ConfigSerializationFailed(e.to_string()))?;

        if let Err(e) = tokio::fs::create_dir_all(&self.layout.log_dir).await {
            warn!(
                "Failed to create log folder {}: {}",
                self.layout.log_dir.display(),
                e
            );
        }

        tokio::fs::write(&self.layout.config_path, &data)
            .await
            .map_err(|e| {
                SupervisorError::ConfigWriteFailed(format!(
                    "{}: {}",
                    self.layout.config_path.display(),
                    e
                ))
            })?;

        let mut spawned = spawn_core(&self.layout.binary_path, &self.layout.config_path)?;

        let capture = LogCapture::with_crash_dir(&self.layout.crash_dir);
        if let Some(stdout) = spawned.child.stdout.take() {
            tokio::spawn(capture.clone().pump(stdout));
        }
        if let Some(stderr) = spawned.child.stderr.take() {
            tokio::spawn(capture.clone().pump(stderr));
        }

        let (exit_tx, exit_rx) = watch::channel(None);
        let mut child = spawned.child;
        tokio::spawn(async move {
            let record = ExitRecord::from_wait(child.wait().await);
            match record.error {
                Some(ref e) => error!("Failure in running core: {}", e),
                None => info!("Core exited"),
            }
            exit_tx.send_replace(Some(record));
        });

        let version = query_version(&self.layout.binary_path).await;
        let api_port = config.api_port();

        Ok(Process {
            pid: spawned.pid,
            config,
            version,
            api_port,
            started_at: Instant::now(),
            capture,
            exit: exit_rx,
            online_clients: RwLock::new(Vec::new()),
        })
    }

    /// Ask the core to terminate (SIGTERM) without waiting for it
    pub fn stop(&self) -> Result<()> {
        let process = self
            .process
            .as_ref()
            .filter(|p| p.is_running())
            .ok_or(SupervisorError::NotRunning)?;

        info!("Stopping core (PID: {}) with SIGTERM", process.pid);
        signal::kill(Pid::from_raw(process.pid as i32), Signal::SIGTERM)
            .map_err(|e| SupervisorError::SignalError(format!("Failed to send SIGTERM: {}", e)))
    }

    /// Stop the core and wait for it, escalating to SIGKILL after `timeout`
    ///
    /// Must be called by the owner on every exit path; dropping the manager
    /// leaves the core running in its own process group.
    pub async fn shutdown(&self, timeout: Duration) {
        let Some(ref process) = self.process else {
            return;
        };
        if !process.is_running() {
            return;
        }

        if let Err(e) = self.stop() {
            warn!("Failed to stop core during shutdown: {}", e);
        }

        if process.wait_for_exit(timeout).await.is_some() {
            info!("Core stopped");
            return;
        }

        warn!("Core did not exit within {:?}, sending SIGKILL", timeout);
        if let Err(e) = signal::kill(Pid::from_raw(process.pid as i32), Signal::SIGKILL) {
            error!("Failed to send SIGKILL to core: {}", e);
        }
        let _ = process.wait_for_exit(Duration::from_secs(1)).await;
    }

    pub fn is_running(&self) -> bool {
        self.process.as_ref().map(Process::is_running).unwrap_or(false)
    }

    pub fn state(&self) -> ProcessState {
        if self.is_running() {
            ProcessState::Running
        } else {
            ProcessState::Stopped
        }
    }

    /// Last output line, else the exit error, else the last start failure
    pub fn result(&self) -> String {
        let Some(ref process) = self.process else {
            return self.start_error.clone().unwrap_or_default();
        };

        let last_line = process.capture.last_line();
        if !last_line.is_empty() {
            return last_line;
        }

        process
            .exit_record()
            .and_then(|record| record.error)
            .or_else(|| self.start_error.clone())
            .unwrap_or_default()
    }

    /// The exit error as a typed error, once the core has failed
    pub fn exit_error(&self) -> Option<SupervisorError> {
        self.process
            .as_ref()
            .and_then(Process::exit_record)
            .and_then(|record| record.error)
            .map(SupervisorError::ProcessExitedWithError)
    }

    /// Time since the last successful start
    pub fn uptime(&self) -> Duration {
        self.process
            .as_ref()
            .map(|p| p.started_at.elapsed())
            .unwrap_or_default()
    }

    pub fn version(&self) -> &str {
        self.process
            .as_ref()
            .map(|p| p.version.as_str())
            .unwrap_or(UNKNOWN_VERSION)
    }

    pub fn api_port(&self) -> Option<u16> {
        self.process.as_ref().and_then(|p| p.api_port)
    }

    pub fn config(&self) -> Option<&CoreConfig> {
        self.process.as_ref().map(Process::config)
    }

    pub fn process(&self) -> Option<&Process> {
        self.process.as_ref()
    }

    pub fn online_clients(&self) -> Vec<String> {
        match self.process {
            Some(ref process) => process
                .online_clients
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .clone(),
            None => Vec::new(),
        }
    }

    pub fn set_online_clients(&self, clients: Vec<String>) {
        if let Some(ref process) = self.process {
            *process
                .online_clients
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner()) = clients;
        }
    }
}
