use crate::error::Result;
use crate::jobs::Job;
use crate::logs::{rotate_logs, LogFileSet, RotationReport};
use async_trait::async_trait;
use std::sync::Mutex;

/// Rotates the IP-limit log chain
pub struct LogRotationJob {
    files: LogFileSet,
    last_report: Mutex<Option<RotationReport>>,
}

impl LogRotationJob {
    pub fn new(files: LogFileSet) -> Self {
        Self {
            files,
            last_report: Mutex::new(None),
        }
    }

    pub fn last_report(&self) -> Option<RotationReport> {
        *self
            .last_report
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Job for LogRotationJob {
    fn name(&self) -> &'static str {
        "log-rotation"
    }

    async fn run(&self) -> Result<()> {
        let report = rotate_logs(&self.files).await;
        *self
            .last_report
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(report);
        Ok(())
    }
}
