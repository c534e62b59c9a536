// Integration tests for orphaned core detection against multithreaded processes

use proxy_supervisor::process::OrphanScanner;
use std::process::Stdio;
use std::time::Duration;
use tempfile::TempDir;
use tokio::process::Command;

/// Thread count of `pid`, read from procfs
fn thread_count(pid: u32) -> usize {
    std::fs::read_dir(format!("/proc/{}/task", pid))
        .map(|tasks| tasks.count())
        .unwrap_or(0)
}

/// The supervisor binary runs a multi-threaded runtime, so a copy of it
/// launched with a `config.json` argument looks like a Go core to the scanner.
struct ThreadedCore {
    _dir: TempDir,
    binary_name: String,
    child: tokio::process::Child,
}

impl ThreadedCore {
    async fn spawn() -> Self {
        let dir = TempDir::new().unwrap();
        let unique = dir
            .path()
            .file_name()
            .unwrap()
            .to_string_lossy()
            .trim_start_matches('.')
            .to_string();
        let binary_name = format!("fake-core-threads-{}", unique);
        let binary_path = dir.path().join(&binary_name);
        std::fs::copy(env!("CARGO_BIN_EXE_proxy-supervisor"), &binary_path).unwrap();

        // Never starts a core of its own: the template does not exist
        let config_path = dir.path().join("config.json");
        let config = format!(
            "bin_dir = \"{dir}/bin\"\nlog_dir = \"{dir}/log\"\nbinary_name = \"absent-core-{unique}\"\ncore_template = \"{dir}/missing.json\"\n",
            dir = dir.path().display(),
            unique = unique,
        );
        std::fs::write(&config_path, config).unwrap();

        let child = Command::new(&binary_path)
            .arg("run")
            .arg("--config")
            .arg(&config_path)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .unwrap();

        let core = Self {
            _dir: dir,
            binary_name,
            child,
        };

        let pid = core.pid();
        for _ in 0..60 {
            if thread_count(pid) > 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert!(thread_count(pid) > 1, "expected a multithreaded process");

        core
    }

    fn pid(&self) -> u32 {
        self.child.id().unwrap()
    }
}

#[tokio::test]
async fn test_threads_of_supervised_core_are_not_orphans() {
    let core = ThreadedCore::spawn().await;
    let mut scanner = OrphanScanner::new(core.binary_name.clone());

    assert!(scanner.find(Some(core.pid())).is_empty());
}

#[tokio::test]
async fn test_multithreaded_orphan_is_reported_once() {
    let mut core = ThreadedCore::spawn().await;
    let pid = core.pid();
    let mut scanner = OrphanScanner::new(core.binary_name.clone());

    assert_eq!(scanner.find(None), vec![pid]);

    assert_eq!(scanner.terminate(None), 1);
    // Exits whether or not its SIGTERM handler is installed yet
    tokio::time::timeout(Duration::from_secs(15), core.child.wait())
        .await
        .unwrap()
        .unwrap();
}
