use crate::error::{Result, SupervisorError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding `bin_dir`
pub const BIN_DIR_ENV: &str = "SUPERVISOR_BIN_DIR";

/// Environment variable overriding `log_dir`
pub const LOG_DIR_ENV: &str = "SUPERVISOR_LOG_DIR";

/// Supervisor configuration with all settings for managing the core
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupervisorConfig {
    /// Directory holding the core binary, its generated config and crash reports
    #[serde(default = "default_bin_dir")]
    pub bin_dir: PathBuf,

    /// Directory holding the rotated log files
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// Core binary file name (defaults to `xray-linux-<arch>`)
    #[serde(default)]
    pub binary_name: Option<String>,

    /// Path to the core JSON configuration fed to the binary on every start
    #[serde(default)]
    pub core_template: Option<PathBuf>,

    /// Job cadences
    #[serde(default)]
    pub jobs: JobsConfig,

    /// External traffic report sink
    #[serde(default)]
    pub traffic_report: TrafficReportConfig,
}

/// How often each periodic job runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobsConfig {
    #[serde(default = "default_crash_check")]
    pub crash_check_secs: u64,

    #[serde(default = "default_traffic")]
    pub traffic_secs: u64,

    #[serde(default = "default_pending_restart")]
    pub pending_restart_secs: u64,

    #[serde(default = "default_log_rotation")]
    pub log_rotation_secs: u64,
}

/// External traffic-report sink settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficReportConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub url: String,

    /// Request timeout (in seconds)
    #[serde(default = "default_report_timeout")]
    pub timeout_secs: u64,
}

// Default value functions for serde
fn default_bin_dir() -> PathBuf {
    PathBuf::from("bin")
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("/var/log")
}

fn default_crash_check() -> u64 {
    1
}

fn default_traffic() -> u64 {
    10
}

fn default_pending_restart() -> u64 {
    30
}

fn default_log_rotation() -> u64 {
    24 * 60 * 60
}

fn default_report_timeout() -> u64 {
    10
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            crash_check_secs: default_crash_check(),
            traffic_secs: default_traffic(),
            pending_restart_secs: default_pending_restart(),
            log_rotation_secs: default_log_rotation(),
        }
    }
}

impl JobsConfig {
    pub fn crash_check(&self) -> Duration {
        Duration::from_secs(self.crash_check_secs)
    }

    pub fn traffic(&self) -> Duration {
        Duration::from_secs(self.traffic_secs)
    }

    pub fn pending_restart(&self) -> Duration {
        Duration::from_secs(self.pending_restart_secs)
    }

    pub fn log_rotation(&self) -> Duration {
        Duration::from_secs(self.log_rotation_secs)
    }
}

impl Default for TrafficReportConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: String::new(),
            timeout_secs: default_report_timeout(),
        }
    }
}

impl TrafficReportConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            bin_dir: default_bin_dir(),
            log_dir: default_log_dir(),
            binary_name: None,
            core_template: None,
            jobs: JobsConfig::default(),
            traffic_report: TrafficReportConfig::default(),
        }
    }
}

impl SupervisorConfig {
    /// Load the supervisor configuration from a TOML file
    ///
    /// `$VAR` / `${VAR}` references in path fields are expanded, then the
    /// `SUPERVISOR_BIN_DIR` / `SUPERVISOR_LOG_DIR` overrides are applied.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| SupervisorError::ConfigError(format!("Failed to read config file: {}", e)))?;

        let mut config = Self::parse_toml(&contents)?;
        config.expand_env_vars();
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    /// Parse TOML configuration
    pub fn parse_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents)
            .map_err(|e| SupervisorError::InvalidConfig(format!("Failed to parse TOML: {}", e)))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.bin_dir.as_os_str().is_empty() {
            return Err(SupervisorError::ConfigValidationError(
                "bin_dir must not be empty".to_string(),
            ));
        }

        if self.log_dir.as_os_str().is_empty() {
            return Err(SupervisorError::ConfigValidationError(
                "log_dir must not be empty".to_string(),
            ));
        }

        if let Some(ref name) = self.binary_name {
            if name.is_empty() || name.contains('/') {
                return Err(SupervisorError::ConfigValidationError(format!(
                    "Invalid binary_name: '{}'",
                    name
                )));
            }
        }

        let cadences = [
            ("crash_check_secs", self.jobs.crash_check_secs),
            ("traffic_secs", self.jobs.traffic_secs),
            ("pending_restart_secs", self.jobs.pending_restart_secs),
            ("log_rotation_secs", self.jobs.log_rotation_secs),
        ];
        for (field, value) in cadences {
            if value == 0 {
                return Err(SupervisorError::ConfigValidationError(format!(
                    "jobs.{} must be at least 1",
                    field
                )));
            }
        }

        if self.traffic_report.timeout_secs == 0 {
            return Err(SupervisorError::ConfigValidationError(
                "traffic_report.timeout_secs must be at least 1".to_string(),
            ));
        }

        if self.traffic_report.enabled && self.traffic_report.url.trim().is_empty() {
            return Err(SupervisorError::ConfigValidationError(
                "traffic_report.url is required when the report is enabled".to_string(),
            ));
        }

        Ok(())
    }

    /// Apply directory overrides looked up by environment variable name
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(BIN_DIR_ENV).filter(|v| !v.is_empty()) {
            self.bin_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup(LOG_DIR_ENV).filter(|v| !v.is_empty()) {
            self.log_dir = PathBuf::from(dir);
        }
    }

    /// Expand environment variables in path fields
    fn expand_env_vars(&mut self) {
        self.bin_dir = expand_env_in_path(&self.bin_dir);
        self.log_dir = expand_env_in_path(&self.log_dir);
        if let Some(ref template) = self.core_template {
            self.core_template = Some(expand_env_in_path(template));
        }
    }

    /// Paths derived from this configuration
    pub fn layout(&self) -> CoreLayout {
        let binary_name = self
            .binary_name
            .clone()
            .unwrap_or_else(default_binary_name);

        CoreLayout {
            binary_path: self.bin_dir.join(&binary_name),
            binary_name,
            config_path: self.bin_dir.join("config.json"),
            log_dir: self.log_dir.clone(),
            crash_dir: self.bin_dir.clone(),
        }
    }
}

/// Filesystem locations used by the process manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreLayout {
    pub binary_name: String,
    pub binary_path: PathBuf,
    /// Where the generated core configuration is written before launch
    pub config_path: PathBuf,
    pub log_dir: PathBuf,
    /// Where crash reports are dropped
    pub crash_dir: PathBuf,
}

/// `xray-linux-<goarch>`, using Go's architecture names
pub fn default_binary_name() -> String {
    format!("xray-linux-{}", go_arch(std::env::consts::ARCH))
}

fn go_arch(arch: &str) -> &str {
    match arch {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        "x86" => "386",
        "powerpc64" => "ppc64",
        other => other,
    }
}

/// Expand environment variables in a string
fn expand_env_in_string(s: &str) -> String {
    let mut result = s.to_string();

    // Handle $VAR and ${VAR} syntax
    for (key, value) in std::env::vars() {
        result = result.replace(&format!("${{{}}}", key), &value);
        result = result.replace(&format!("${}", key), &value);
    }

    result
}

fn expand_env_in_path(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();
    PathBuf::from(expand_env_in_string(&path_str))
}
