//! Run one file through the pipeline immediately

use crate::util;
use anyhow::{Context, Result};
use hopper_core::{HopperConfig, Layout, TransformerRegistry};
use hopper_pipeline::StagePipeline;
use std::path::Path;

pub async fn run(config: HopperConfig, file: &Path) -> Result<()> {
    config.validate()?;

    let file = file
        .canonicalize()
        .with_context(|| format!("Cannot process {}", file.display()))?;

    let layout = match &config.pipeline.work_root {
        Some(root) => Layout::new(root),
        None => {
            let dir = file
                .parent()
                .with_context(|| format!("{} has no parent directory", file.display()))?;
            Layout::for_watched_dir(dir)?
        }
    };
    let pipeline = StagePipeline::new(layout, TransformerRegistry::from_config(&config.pipeline));

    let report = tokio::task::spawn_blocking(move || pipeline.process(&file))
        .await
        .context("Pipeline run panicked")?;

    report.log();
    util::display_report(&report);

    if let Err(e) = report.result {
        return Err(anyhow::Error::new(e).context("Processing failed"));
    }
    Ok(())
}
