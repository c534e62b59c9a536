use chrono::Local;
use regex::Regex;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, OnceLock};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing::{debug, error, info, warn};

/// Messages the core emits at high volume during normal operation
const NOISY_MESSAGES: &[&str] = &["tls handshake error", "connection ends"];

fn line_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\d{4}/\d{2}/\d{2} \d{2}:\d{2}:\d{2}(?:\.\d+)?) \[([^\]]+)\] (.+)$")
            .expect("static pattern")
    })
}

fn crash_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(panic|exception|stack trace|fatal error)").expect("static pattern"))
}

/// Output sink for the core's stdout/stderr
///
/// Remembers the most recent non-empty line for quick failure diagnosis and
/// forwards every line to `tracing` under the `core` target. Clones share
/// the same state, so the capture can be written from the pump tasks while
/// being read by status queries.
#[derive(Debug, Clone, Default)]
pub struct LogCapture {
    last_line: Arc<Mutex<String>>,
    crash_dir: Option<PathBuf>,
}

impl LogCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture that also drops crash reports into `crash_dir`
    pub fn with_crash_dir(crash_dir: impl Into<PathBuf>) -> Self {
        Self {
            last_line: Arc::default(),
            crash_dir: Some(crash_dir.into()),
        }
    }

    /// Record a chunk of output
    pub fn write(&self, data: &[u8]) {
        let message = String::from_utf8_lossy(data);

        if crash_regex().is_match(&message) {
            debug!("Core crash detected:\n{}", message);
            self.write_crash_report(data);
        }

        let mut latest = None;
        for line in message.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            forward_line(line);
            latest = Some(line);
        }

        if let Some(line) = latest {
            *self.lock() = line.to_string();
        }
    }

    /// Most recent non-empty line written so far
    pub fn last_line(&self) -> String {
        self.lock().clone()
    }

    /// Copy everything from `reader` into the capture until EOF
    pub async fn pump<R>(self, reader: R)
    where
        R: AsyncRead + Unpin,
    {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => self.write(&buf),
                Err(e) => {
                    debug!("Core output stream closed: {}", e);
                    break;
                }
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, String> {
        self.last_line.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_crash_report(&self, data: &[u8]) {
        let Some(ref dir) = self.crash_dir else {
            return;
        };

        let path = dir.join(format!(
            "core_crash_{}.log",
            Local::now().format("%Y%m%d_%H%M%S")
        ));
        match std::fs::write(&path, data) {
            Ok(()) => info!("Core crash report written to {}", path.display()),
            Err(e) => warn!("Failed to write core crash report {}: {}", path.display(), e),
        }
    }
}

/// Route one line of core output to the matching tracing level
fn forward_line(line: &str) {
    let Some(caps) = line_regex().captures(line) else {
        debug!(target: "core", "{}", line);
        return;
    };

    let level = &caps[2];
    let body = &caps[3];
    let lower = body.to_lowercase();

    if NOISY_MESSAGES.iter().any(|noise| lower.contains(noise)) {
        debug!(target: "core", "{}", body);
    } else if lower.contains("failed") {
        error!(target: "core", "{}", body);
    } else {
        match level {
            "Info" => info!(target: "core", "{}", body),
            "Warning" => warn!(target: "core", "{}", body),
            "Error" => error!(target: "core", "{}", body),
            _ => debug!(target: "core", "{}", body),
        }
    }
}
