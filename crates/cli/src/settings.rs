//! Configuration resolution: defaults, then config file, then CLI flags

use crate::WatchArgs;
use anyhow::{Context, Result};
use hopper_core::HopperConfig;
use std::path::{Path, PathBuf};

/// `<config dir>/hopper/config.toml`, e.g. `~/.config/hopper/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("hopper").join("config.toml"))
}

/// The config file that `load` reads, if any
pub fn config_source(explicit: Option<&Path>) -> Option<PathBuf> {
    match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => default_config_path().filter(|p| p.is_file()),
    }
}

/// Load the configuration file
///
/// An explicit path must exist; the default location is optional.
pub fn load(explicit: Option<&Path>) -> Result<HopperConfig> {
    let Some(path) = config_source(explicit) else {
        return Ok(HopperConfig::default());
    };

    HopperConfig::load(&path)
        .with_context(|| format!("Failed to load config from {}", path.display()))
}

/// Apply `hopper watch` flags on top of the loaded configuration
pub fn apply_watch_args(config: &mut HopperConfig, args: &WatchArgs) {
    if let Some(dir) = &args.directory {
        config.watch.directory = Some(dir.clone());
    }
    if let Some(ms) = args.quiet_ms {
        config.watch.quiet_period_ms = ms;
    }
    if let Some(ms) = args.drain_ms {
        config.watch.drain_interval_ms = ms;
    }
    if args.no_scan {
        config.watch.scan_existing = false;
    }
    if let Some(secs) = args.rescan_secs {
        config.watch.rescan_interval_secs = secs;
    }
    if let Some(root) = &args.work_root {
        config.pipeline.work_root = Some(root.clone());
    }
    if let Some(jobs) = args.jobs {
        config.pipeline.max_concurrent_runs = jobs;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_explicit_config_must_exist() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("nope.toml");

        let err = load(Some(&missing)).unwrap_err();
        assert!(format!("{:#}", err).contains("nope.toml"));
    }

    #[test]
    fn test_flags_override_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[watch]\ndirectory = \"/from/file\"\nquiet_period_ms = 4000\nscan_existing = true\n",
        )
        .unwrap();

        let mut config = load(Some(&path)).unwrap();
        let args = WatchArgs {
            directory: Some(PathBuf::from("/from/flag")),
            drain_ms: Some(500),
            no_scan: true,
            jobs: Some(2),
            ..WatchArgs::default()
        };
        apply_watch_args(&mut config, &args);

        assert_eq!(config.watch.directory, Some(PathBuf::from("/from/flag")));
        assert_eq!(config.watch.quiet_period_ms, 4000);
        assert_eq!(config.watch.drain_interval_ms, 500);
        assert!(!config.watch.scan_existing);
        assert_eq!(config.pipeline.max_concurrent_runs, 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_no_flags_keep_file_values() {
        let mut config = HopperConfig::default();
        config.watch.rescan_interval_secs = 30;

        apply_watch_args(&mut config, &WatchArgs::default());

        assert_eq!(config, {
            let mut expected = HopperConfig::default();
            expected.watch.rescan_interval_secs = 30;
            expected
        });
    }
}
