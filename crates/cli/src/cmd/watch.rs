//! Watch a directory until interrupted

use crate::daemon::{self, WatchSummary};
use anyhow::Result;
use hopper_core::HopperConfig;
use owo_colors::OwoColorize;
use tracing::info;

pub async fn run(config: HopperConfig) -> Result<()> {
    let summary = daemon::run(config, daemon::shutdown_signal()).await?;

    info!(
        notified = summary.intake.notified,
        coalesced = summary.intake.coalesced,
        deferred = summary.intake.deferred,
        evicted = summary.intake.evicted,
        "Intake totals"
    );
    print_summary(&summary);
    Ok(())
}

fn print_summary(summary: &WatchSummary) {
    let dispatch = &summary.dispatch;

    println!("{}", "Watch stopped".bold());
    println!("  {}: {}", "archived".cyan(), dispatch.archived);
    println!("  {}: {}", "unsupported".cyan(), dispatch.unsupported);
    if dispatch.failed > 0 {
        println!("  {}: {}", "failed".cyan(), dispatch.failed.red());
    } else {
        println!("  {}: 0", "failed".cyan());
    }

    let not_processed = summary.intake.evicted + dispatch.abandoned;
    if not_processed > 0 {
        println!(
            "  {}",
            format!("{} file(s) were seen but not processed", not_processed).yellow()
        );
    }
}
