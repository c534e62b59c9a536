//! Copy-and-truncate rotation for the IP-limit log chain.
//!
//! The supervised core and its helpers keep these files open for appending,
//! so a primary file is never renamed or recreated: its bytes are copied into
//! the `.prev` snapshot and the file is truncated in place.

use crate::error::{Result, SupervisorError};
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tracing::{debug, error, info};

pub const IP_LIMIT_LOG: &str = "3xipl.log";
pub const IP_LIMIT_BANNED_LOG: &str = "3xipl-banned.log";
pub const IP_LIMIT_BANNED_PREV_LOG: &str = "3xipl-banned.prev.log";
pub const ACCESS_PERSISTENT_LOG: &str = "3xipl-ap.log";
pub const ACCESS_PERSISTENT_PREV_LOG: &str = "3xipl-ap.prev.log";

/// A primary log file and, optionally, the snapshot it is rotated into
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFileEntry {
    pub primary: PathBuf,
    pub previous: Option<PathBuf>,
}

/// Fixed set of log files handled by one rotation pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFileSet {
    entries: Vec<LogFileEntry>,
}

/// Outcome of one rotation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RotationReport {
    pub succeeded: usize,
    pub failed: usize,
}

impl LogFileSet {
    pub fn new(entries: Vec<LogFileEntry>) -> Self {
        Self { entries }
    }

    /// The IP-limit chain under `log_dir`
    ///
    /// `3xipl.log` is only truncated; the banned and access-persistent logs
    /// keep one previous snapshot each.
    pub fn ip_limit(log_dir: &Path) -> Self {
        Self::new(vec![
            LogFileEntry {
                primary: log_dir.join(IP_LIMIT_LOG),
                previous: None,
            },
            LogFileEntry {
                primary: log_dir.join(IP_LIMIT_BANNED_LOG),
                previous: Some(log_dir.join(IP_LIMIT_BANNED_PREV_LOG)),
            },
            LogFileEntry {
                primary: log_dir.join(ACCESS_PERSISTENT_LOG),
                previous: Some(log_dir.join(ACCESS_PERSISTENT_PREV_LOG)),
            },
        ])
    }

    pub fn entries(&self) -> &[LogFileEntry] {
        &self.entries
    }

    /// Every path touched by a rotation, primaries first
    pub fn all_paths(&self) -> impl Iterator<Item = &Path> {
        self.entries
            .iter()
            .map(|e| e.primary.as_path())
            .chain(self.entries.iter().filter_map(|e| e.previous.as_deref()))
    }

    /// Rotate every file in the set
    ///
    /// Each file succeeds or fails on its own; failures are logged and
    /// counted and never stop the remaining files from being processed.
    pub async fn rotate(&self) -> RotationReport {
        for path in self.all_paths() {
            if let Err(e) = ensure_file_exists(path).await {
                error!("Failed to ensure log file exists: {} - {}", path.display(), e);
            }
        }

        let mut report = RotationReport::default();

        for entry in &self.entries {
            if let Some(ref previous) = entry.previous {
                match snapshot(&entry.primary, previous).await {
                    Ok(bytes) => debug!(
                        "Copied {} bytes from {} to {}",
                        bytes,
                        entry.primary.display(),
                        previous.display()
                    ),
                    Err(e) => {
                        error!("{}", e);
                        report.failed += 1;
                        if matches!(e, SupervisorError::LogFileUnavailable(_)) {
                            continue;
                        }
                    }
                }
            }

            match truncate(&entry.primary).await {
                Ok(()) => {
                    debug!("Truncated log file: {}", entry.primary.display());
                    report.succeeded += 1;
                }
                Err(e) => {
                    error!("Failed to truncate log file: {} - {}", entry.primary.display(), e);
                    report.failed += 1;
                }
            }
        }

        report
    }
}

/// Create the parent directory and the file itself if missing
pub async fn ensure_file_exists(path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).await?;
    }

    OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(path)
        .await?;

    Ok(())
}

/// Copy `primary` over `previous`
///
/// Failing to open either side is reported as `LogFileUnavailable`, in which
/// case the primary is left untouched. A failed copy is reported as `Io`.
async fn snapshot(primary: &Path, previous: &Path) -> Result<u64> {
    let mut prev_file = OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(previous)
        .await
        .map_err(|e| {
            SupervisorError::LogFileUnavailable(format!(
                "Failed to open previous log file for writing: {} - {}",
                previous.display(),
                e
            ))
        })?;

    let mut current = OpenOptions::new()
        .read(true)
        .open(primary)
        .await
        .map_err(|e| {
            SupervisorError::LogFileUnavailable(format!(
                "Failed to open current log file for reading: {} - {}",
                primary.display(),
                e
            ))
        })?;

    let copied = tokio::io::copy(&mut current, &mut prev_file).await.map_err(|e| {
        SupervisorError::Io(std::io::Error::new(
            e.kind(),
            format!(
                "Failed to copy log file {} to {}: {}",
                primary.display(),
                previous.display(),
                e
            ),
        ))
    })?;

    Ok(copied)
}

/// Truncate in place, keeping the inode any writer holds open
async fn truncate(path: &Path) -> Result<()> {
    let file = OpenOptions::new().write(true).open(path).await?;
    file.set_len(0).await?;
    Ok(())
}

/// Log and return the report of one rotation pass
pub async fn rotate_logs(files: &LogFileSet) -> RotationReport {
    info!("Starting log rotation and cleanup");
    let report = files.rotate().await;
    info!(
        "Completed log rotation (success: {}, failed: {})",
        report.succeeded, report.failed
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_ip_limit_layout() {
        let set = LogFileSet::ip_limit(Path::new("/var/log"));
        let entries = set.entries();

        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].primary, PathBuf::from("/var/log/3xipl.log"));
        assert_eq!(entries[0].previous, None);
        assert_eq!(entries[1].primary, PathBuf::from("/var/log/3xipl-banned.log"));
        assert_eq!(
            entries[1].previous,
            Some(PathBuf::from("/var/log/3xipl-banned.prev.log"))
        );
        assert_eq!(entries[2].primary, PathBuf::from("/var/log/3xipl-ap.log"));
        assert_eq!(
            entries[2].previous,
            Some(PathBuf::from("/var/log/3xipl-ap.prev.log"))
        );
        assert_eq!(set.all_paths().count(), 5);
    }

    #[tokio::test]
    async fn test_ensure_file_exists_creates_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested/dir/file.log");

        ensure_file_exists(&path).await.unwrap();
        assert!(path.is_file());
    }

    #[tokio::test]
    async fn test_ensure_file_exists_keeps_content() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("file.log");
        std::fs::write(&path, b"keep me").unwrap();

        ensure_file_exists(&path).await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"keep me");
    }

    #[tokio::test]
    async fn test_truncate_keeps_open_descriptor_valid() {
        use std::io::Write;

        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("held.log");
        let mut writer = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .unwrap();
        writer.write_all(b"before\n").unwrap();

        truncate(&path).await.unwrap();
        writer.write_all(b"after\n").unwrap();

        // Appends land at the new end of the same inode
        assert_eq!(std::fs::read(&path).unwrap(), b"after\n");
    }
}
