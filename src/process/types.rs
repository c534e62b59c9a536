use serde::{Deserialize, Serialize};
use std::process::ExitStatus;

/// Externally visible lifecycle state of the core
///
/// A crash is not tracked as its own state; the watchdog infers it from a
/// core that is not running although nobody stopped it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessState {
    Stopped,
    Running,
}

impl std::fmt::Display for ProcessState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessState::Stopped => write!(f, "stopped"),
            ProcessState::Running => write!(f, "running"),
        }
    }
}

/// Terminal state of a core process, published once by its wait task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitRecord {
    pub status: Option<ExitStatus>,
    /// Set unless the process exited with status 0
    pub error: Option<String>,
}

impl ExitRecord {
    pub fn from_wait(result: std::io::Result<ExitStatus>) -> Self {
        match result {
            Ok(status) => Self {
                status: Some(status),
                error: describe_failure(&status),
            },
            Err(e) => Self {
                status: None,
                error: Some(format!("wait failed: {}", e)),
            },
        }
    }
}

fn describe_failure(status: &ExitStatus) -> Option<String> {
    if status.success() {
        return None;
    }

    if let Some(code) = status.code() {
        return Some(format!("exit status {}", code));
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signo) = status.signal() {
            return Some(match nix::sys::signal::Signal::try_from(signo) {
                Ok(signal) => format!("signal: {}", signal),
                Err(_) => format!("signal: {}", signo),
            });
        }
    }

    Some(status.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::process::ExitStatusExt;

    #[test]
    fn test_clean_exit_has_no_error() {
        let record = ExitRecord::from_wait(Ok(ExitStatus::from_raw(0)));
        assert!(record.status.is_some());
        assert_eq!(record.error, None);
    }

    #[test]
    fn test_exit_code_error() {
        // Raw wait status: exit code in the high byte
        let record = ExitRecord::from_wait(Ok(ExitStatus::from_raw(23 << 8)));
        assert_eq!(record.error.as_deref(), Some("exit status 23"));
    }

    #[test]
    fn test_signal_error() {
        let record = ExitRecord::from_wait(Ok(ExitStatus::from_raw(15)));
        assert_eq!(record.error.as_deref(), Some("signal: SIGTERM"));
    }

    #[test]
    fn test_wait_failure() {
        let record = ExitRecord::from_wait(Err(std::io::Error::other("boom")));
        assert_eq!(record.status, None);
        assert!(record.error.unwrap().contains("boom"));
    }

    #[test]
    fn test_state_display() {
        assert_eq!(ProcessState::Running.to_string(), "running");
        assert_eq!(ProcessState::Stopped.to_string(), "stopped");
    }
}
