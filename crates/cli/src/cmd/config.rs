//! Show the effective configuration

use crate::settings;
use anyhow::Result;
use hopper_core::HopperConfig;
use owo_colors::OwoColorize;
use std::path::Path;

pub fn run(config: &HopperConfig, explicit: Option<&Path>, example: bool) -> Result<()> {
    if example {
        print!("{}", HopperConfig::example());
        return Ok(());
    }

    match settings::config_source(explicit) {
        Some(path) => println!("{} {}", "# Loaded from".dimmed(), path.display().dimmed()),
        None => match settings::default_config_path() {
            Some(path) => println!(
                "{} {}",
                "# Built-in defaults; no file at".dimmed(),
                path.display().dimmed()
            ),
            None => println!("{}", "# Built-in defaults".dimmed()),
        },
    }

    print!("{}", config.to_toml_string()?);

    if let Err(e) = config.validate() {
        println!();
        println!("{} {}", "warning:".yellow().bold(), e);
    } else if config.watch.directory.is_none() {
        println!();
        println!(
            "{} watch.directory is not set; pass it to `hopper watch <DIR>`",
            "note:".cyan().bold()
        );
    }
    Ok(())
}
