//! Shared output helpers for CLI commands

use hopper_pipeline::{Disposition, RunReport};
use owo_colors::OwoColorize;
use std::path::Path;
use std::time::Duration;

/// Format file size in human-readable format
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Format a short duration ("850ms", "2.4s", "3m 05s")
pub fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis < 1000 {
        format!("{}ms", millis)
    } else if millis < 60_000 {
        format!("{:.1}s", duration.as_secs_f64())
    } else {
        let secs = duration.as_secs();
        format!("{}m {:02}s", secs / 60, secs % 60)
    }
}

fn size_of(path: &Path) -> String {
    std::fs::metadata(path)
        .map(|m| format_size(m.len()))
        .unwrap_or_else(|_| "?".to_string())
}

/// Print a run report for a human
pub fn display_report(report: &RunReport) {
    let source = report.run.source_path().display();

    match &report.result {
        Ok(Disposition::Archived(archive)) => {
            println!("{} {}", "✓".green(), source);
            println!("  {}: {} ({})", "archive".dimmed(), archive.display(), size_of(archive));
        }
        Ok(Disposition::Unsupported { staged_at }) => {
            println!("{} {} {}", "•".yellow(), source, "(unsupported type)".yellow());
            println!("  {}: {}", "left in".dimmed(), staged_at.display());
        }
        Err(e) => {
            println!("{} {}", "✗".red(), source);
            println!("  {}: {}", "stage".dimmed(), report.stage());
            println!("  {}: {}", "error".dimmed(), e.red());
        }
    }

    if let Some(backup) = report.run.backup_path() {
        println!("  {}: {}", "backup".dimmed(), backup.display());
    }
    println!("  {}: {}", "took".dimmed(), format_duration(report.elapsed));
}
