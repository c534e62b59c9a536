use nix::sys::signal::{self, Signal};
use nix::unistd::Pid as NixPid;
use std::ffi::OsStr;
use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, System};
use tracing::{info, warn};

/// Finds core processes that are not supervised by this manager
///
/// A supervisor that exits without stopping the core leaves it running in
/// its own process group. The next supervisor must terminate it before
/// starting a new core, otherwise the control-API port is still taken.
pub struct OrphanScanner {
    system: System,
    binary_name: String,
}

impl OrphanScanner {
    pub fn new(binary_name: impl Into<String>) -> Self {
        Self {
            system: System::new(),
            binary_name: binary_name.into(),
        }
    }

    /// PIDs of running cores, excluding `supervised` and this process
    ///
    /// Only process leaders are reported, never their threads.
    pub fn find(&mut self, supervised: Option<u32>) -> Vec<u32> {
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::everything(),
        );

        let own_pid = std::process::id();
        let mut pids: Vec<u32> = self
            .system
            .processes()
            .iter()
            // Linux lists every thread as its own entry sharing the cmdline
            .filter(|(_, process)| process.thread_kind().is_none())
            .filter(|(pid, _)| {
                let pid = pid.as_u32();
                pid != own_pid && Some(pid) != supervised
            })
            .filter(|(_, process)| {
                let cmdline = process
                    .cmd()
                    .iter()
                    .map(|arg| lossy(arg))
                    .collect::<Vec<_>>()
                    .join(" ");
                is_core_cmdline(&cmdline, &self.binary_name)
            })
            .map(|(pid, _)| pid.as_u32())
            .collect();

        pids.sort_unstable();
        pids
    }

    /// Send SIGTERM to every orphaned core, returning how many were signalled
    pub fn terminate(&mut self, supervised: Option<u32>) -> usize {
        let mut signalled = 0;

        for pid in self.find(supervised) {
            info!("Terminating orphaned core process (PID: {})", pid);
            match signal::kill(NixPid::from_raw(pid as i32), Signal::SIGTERM) {
                Ok(()) => signalled += 1,
                Err(e) => warn!("Failed to terminate orphaned core {}: {}", pid, e),
            }
        }

        signalled
    }
}

fn lossy<S: AsRef<OsStr>>(arg: &S) -> String {
    arg.as_ref().to_string_lossy().into_owned()
}

/// `<...binary_name...> ... config.json`, in that order
pub fn is_core_cmdline(cmdline: &str, binary_name: &str) -> bool {
    match cmdline.find(binary_name) {
        Some(at) => cmdline[at + binary_name.len()..].contains("config.json"),
        None => false,
    }
}
