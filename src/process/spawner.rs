use crate::error::{Result, SupervisorError};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};

/// Reported when the binary cannot tell its version
pub const UNKNOWN_VERSION: &str = "Unknown";

/// Upper bound on the `-version` probe run by every start
pub const VERSION_TIMEOUT: Duration = Duration::from_secs(5);

/// Metadata returned when spawning the core
#[derive(Debug)]
pub struct SpawnedCore {
    /// The child process handle
    pub child: Child,

    /// Process ID assigned by the OS
    pub pid: u32,
}

/// Launch `<binary> -c <config_path>`
///
/// The child is placed in its own process group so that signals aimed at
/// the supervisor (Ctrl-C, a service manager stopping it) do not reach the
/// core. Stdout and stderr are piped for capture.
pub fn spawn_core(binary: &Path, config_path: &Path) -> Result<SpawnedCore> {
    if !binary.exists() {
        return Err(SupervisorError::SpawnError(format!(
            "Binary does not exist: {}",
            binary.display()
        )));
    }

    let mut command = Command::new(binary);
    command
        .arg("-c")
        .arg(config_path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    #[cfg(unix)]
    command.process_group(0);

    let child = command.spawn().map_err(|e| {
        SupervisorError::SpawnError(format!("Failed to spawn {}: {}", binary.display(), e))
    })?;

    let pid = child.id().ok_or_else(|| {
        SupervisorError::SpawnError(format!("Failed to get PID for {}", binary.display()))
    })?;

    Ok(SpawnedCore { child, pid })
}

/// Ask the binary for its version (`<binary> -version`)
pub async fn query_version(binary: &Path) -> String {
    let output = Command::new(binary)
        .arg("-version")
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output();

    match tokio::time::timeout(VERSION_TIMEOUT, output).await {
        Ok(Ok(output)) => parse_version(&output.stdout),
        Ok(Err(e)) => {
            tracing::debug!("Failed to query core version: {}", e);
            UNKNOWN_VERSION.to_string()
        }
        Err(_) => {
            tracing::debug!("Core version query timed out");
            UNKNOWN_VERSION.to_string()
        }
    }
}

/// Second whitespace-separated token, e.g. `Xray 1.8.4 (Xray, ...)` → `1.8.4`
pub fn parse_version(output: &[u8]) -> String {
    String::from_utf8_lossy(output)
        .split_whitespace()
        .nth(1)
        .map(str::to_string)
        .unwrap_or_else(|| UNKNOWN_VERSION.to_string())
}
