// Shared helpers for integration tests

#![allow(dead_code)]

use proxy_supervisor::config::SupervisorConfig;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

pub const API_TEMPLATE: &str =
    r#"{"log":{"loglevel":"warning"},"inbounds":[{"tag":"api","listen":"127.0.0.1","port":62789}]}"#;

/// A shell script standing in for the core binary, plus a matching config
///
/// Every environment gets its own binary name so orphan scans in one test
/// never match cores started by another.
pub struct FakeCoreEnv {
    pub dir: TempDir,
    pub config: SupervisorConfig,
}

impl FakeCoreEnv {
    pub fn new(body: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let bin_dir = dir.path().join("bin");
        std::fs::create_dir_all(&bin_dir).unwrap();

        let unique = dir
            .path()
            .file_name()
            .unwrap()
            .to_string_lossy()
            .trim_start_matches('.')
            .to_string();
        let binary_name = format!("fake-core-{}", unique);

        let script = format!(
            "#!/bin/sh\nif [ \"$1\" = \"-version\" ]; then\n  echo \"Xray 9.9.9 (fake core)\"\n  exit 0\nfi\n{}\n",
            body
        );
        let binary_path = bin_dir.join(&binary_name);
        std::fs::write(&binary_path, script).unwrap();
        std::fs::set_permissions(&binary_path, std::fs::Permissions::from_mode(0o755)).unwrap();

        let template = dir.path().join("template.json");
        std::fs::write(&template, API_TEMPLATE).unwrap();

        let config = SupervisorConfig {
            bin_dir,
            log_dir: dir.path().join("log"),
            binary_name: Some(binary_name),
            core_template: Some(template),
            ..Default::default()
        };

        Self { dir, config }
    }

    pub fn template_path(&self) -> PathBuf {
        self.config.core_template.clone().unwrap()
    }

    pub fn write_template(&self, contents: &str) {
        std::fs::write(self.template_path(), contents).unwrap();
    }
}

/// Poll `check` every 50ms for up to 3s
pub async fn eventually<F, Fut>(check: F) -> bool
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..60 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}
