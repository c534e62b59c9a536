// Output formatting and display for CLI

use crate::config::{CoreLayout, SupervisorConfig};
use crate::logs::RotationReport;
use colored::*;
use std::path::Path;
use std::time::Duration;
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};

#[derive(Tabled)]
struct PathRow {
    #[tabled(rename = "Item")]
    item: String,
    #[tabled(rename = "Path")]
    path: String,
    #[tabled(rename = "Status")]
    status: String,
}

#[derive(Tabled)]
struct JobRow {
    #[tabled(rename = "Job")]
    job: String,
    #[tabled(rename = "Every")]
    every: String,
}

/// Print an error message to stderr
pub fn print_error(error: &str) {
    eprintln!("{} {}", "✗ Error:".red().bold(), error);
}

/// Print a success message
pub fn print_success_msg(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print the outcome of a rotation pass
pub fn print_rotation_report(report: &RotationReport) {
    if report.failed == 0 {
        print_success_msg(&format!("Rotated {} log file(s)", report.succeeded));
    } else {
        print_error(&format!(
            "Rotated {} log file(s), {} failed",
            report.succeeded, report.failed
        ));
    }
}

/// Print the effective paths and job cadences
pub fn print_layout(config: &SupervisorConfig, layout: &CoreLayout, version: Option<&str>) {
    let mut rows = vec![
        path_row("Core binary", &layout.binary_path, true),
        path_row("Core config", &layout.config_path, false),
        path_row("Log directory", &layout.log_dir, false),
        path_row("Crash reports", &layout.crash_dir, false),
    ];
    match config.core_template {
        Some(ref template) => rows.insert(1, path_row("Core template", template, true)),
        None => rows.insert(
            1,
            PathRow {
                item: "Core template".to_string(),
                path: "-".to_string(),
                status: "not set".red().bold().to_string(),
            },
        ),
    }

    let mut table = Table::new(rows);
    table
        .with(Style::rounded())
        .with(Modify::new(Rows::first()).with(Alignment::center()));
    println!("\n{}\n", table);

    if let Some(version) = version {
        println!("  {:<15} {}", "Core version:".bold(), version.cyan());
    }

    let jobs = &config.jobs;
    let mut job_rows = vec![
        job_row("crash-watchdog", jobs.crash_check()),
        job_row("traffic", jobs.traffic()),
        job_row("pending-restart", jobs.pending_restart()),
        job_row("log-rotation", jobs.log_rotation()),
    ];
    if !config.traffic_report.enabled {
        job_rows[1].job = format!("traffic {}", "(report off)".dimmed());
    }

    let mut table = Table::new(job_rows);
    table.with(Style::rounded());
    println!("\n{}\n", table);
}

/// `required` paths are shown in red when missing, the rest in yellow
fn path_row(item: &str, path: &Path, required: bool) -> PathRow {
    let status = if path.exists() {
        "ok".green().to_string()
    } else if required {
        "missing".red().bold().to_string()
    } else {
        "will be created".yellow().to_string()
    };

    PathRow {
        item: item.to_string(),
        path: path.display().to_string(),
        status,
    }
}

fn job_row(job: &str, every: Duration) -> JobRow {
    JobRow {
        job: job.to_string(),
        every: format_duration(&every),
    }
}

/// Format a duration in human-readable format
fn format_duration(duration: &Duration) -> String {
    let secs = duration.as_secs();

    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        let mins = secs / 60;
        let secs = secs % 60;
        if secs > 0 {
            format!("{}m {}s", mins, secs)
        } else {
            format!("{}m", mins)
        }
    } else if secs < 86400 {
        let hours = secs / 3600;
        let mins = (secs % 3600) / 60;
        if mins > 0 {
            format!("{}h {}m", hours, mins)
        } else {
            format!("{}h", hours)
        }
    } else {
        let days = secs / 86400;
        let hours = (secs % 86400) / 3600;
        if hours > 0 {
            format!("{}d {}h", days, hours)
        } else {
            format!("{}d", days)
        }
    }
}
