//! Hopper configuration
//!
//! Loaded from TOML with every field optional; missing fields fall back to
//! the defaults below. CLI flags are applied on top by the caller and the
//! result is checked with [`HopperConfig::validate`] before use.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HopperConfig {
    pub watch: WatchConfig,
    pub pipeline: PipelineConfig,
    pub logging: LoggingConfig,
}

/// Intake settings: what to watch and how long a file must settle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Directory to watch (required, non-recursive)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,

    /// Quiet period before a path is handed to the pipeline (default: 2000ms)
    pub quiet_period_ms: u64,

    /// Interval of the settle check (default: 1000ms, must be < quiet period)
    pub drain_interval_ms: u64,

    /// Queue files already present in the directory at startup (default: true)
    pub scan_existing: bool,

    /// Re-notify present files every N seconds (default: 0 = disabled)
    pub rescan_interval_secs: u64,

    /// Maximum number of pending paths before the oldest is evicted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_pending: Option<usize>,

    /// Additional gitignore-style patterns that are never processed
    pub ignore_patterns: Vec<String>,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            directory: None,
            quiet_period_ms: 2_000,
            drain_interval_ms: 1_000,
            scan_existing: true,
            rescan_interval_secs: 0,
            max_pending: None,
            ignore_patterns: vec![],
        }
    }
}

impl WatchConfig {
    pub fn quiet_period(&self) -> Duration {
        Duration::from_millis(self.quiet_period_ms)
    }

    pub fn drain_interval(&self) -> Duration {
        Duration::from_millis(self.drain_interval_ms)
    }

    /// Periodic rescan interval, `None` when disabled
    pub fn rescan_interval(&self) -> Option<Duration> {
        (self.rescan_interval_secs > 0).then(|| Duration::from_secs(self.rescan_interval_secs))
    }
}

/// Built-in transformer implementations selectable from config
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransformerKind {
    /// UTF-8 text, upper-cased
    Uppercase,
    /// Byte-identical copy
    Passthrough,
}

/// Stage pipeline settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Root holding backup/, processing/ and complete/
    /// (default: parent of the watched directory)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub work_root: Option<PathBuf>,

    /// Maximum pipeline runs executing at once (default: 4)
    pub max_concurrent_runs: usize,

    /// Extension (without the dot, case-sensitive) -> transformer
    pub transformers: BTreeMap<String, TransformerKind>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let mut transformers = BTreeMap::new();
        transformers.insert("txt".to_string(), TransformerKind::Uppercase);

        Self {
            work_root: None,
            max_concurrent_runs: 4,
            transformers,
        }
    }
}

/// Log output settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// One of trace, debug, info, warn, error (default: info)
    pub level: String,

    /// Write daily rolling log files here in addition to stderr
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
        }
    }
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

impl HopperConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        toml::from_str(&contents).map_err(|source| Error::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Render configuration as TOML
    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// The watched directory, which has no default
    pub fn watched_directory(&self) -> Result<&Path> {
        self.watch
            .directory
            .as_deref()
            .ok_or_else(|| Error::Config("watch.directory is required".to_string()))
    }

    /// Check ranges and cross-field constraints
    pub fn validate(&self) -> Result<()> {
        let watch = &self.watch;

        if watch.quiet_period_ms == 0 {
            return Err(Error::Config("watch.quiet_period_ms must be > 0".to_string()));
        }
        if watch.drain_interval_ms == 0 {
            return Err(Error::Config("watch.drain_interval_ms must be > 0".to_string()));
        }
        if watch.drain_interval_ms >= watch.quiet_period_ms {
            return Err(Error::Config(format!(
                "watch.drain_interval_ms ({}) must be less than watch.quiet_period_ms ({})",
                watch.drain_interval_ms, watch.quiet_period_ms
            )));
        }
        // A rescan refreshes every present file; faster than the quiet
        // period it would keep them pending forever
        if watch.rescan_interval_secs > 0
            && watch.rescan_interval_secs.saturating_mul(1000) <= watch.quiet_period_ms
        {
            return Err(Error::Config(format!(
                "watch.rescan_interval_secs ({}) must exceed the quiet period ({}ms)",
                watch.rescan_interval_secs, watch.quiet_period_ms
            )));
        }
        if watch.max_pending == Some(0) {
            return Err(Error::Config("watch.max_pending must be > 0 when set".to_string()));
        }

        if self.pipeline.max_concurrent_runs == 0 {
            return Err(Error::Config(
                "pipeline.max_concurrent_runs must be > 0".to_string(),
            ));
        }
        for ext in self.pipeline.transformers.keys() {
            let bare = ext.strip_prefix('.').unwrap_or(ext);
            if bare.is_empty() || bare.contains(['.', '/', '\\']) {
                return Err(Error::Config(format!(
                    "pipeline.transformers: invalid extension '{}'",
                    ext
                )));
            }
        }

        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(Error::Config(format!(
                "logging.level must be one of {}, got '{}'",
                LOG_LEVELS.join(", "),
                self.logging.level
            )));
        }

        Ok(())
    }

    /// Annotated example configuration
    pub fn example() -> &'static str {
        EXAMPLE_CONFIG
    }
}

const EXAMPLE_CONFIG: &str = r#"# Hopper configuration

[watch]
# Directory to watch for incoming files (not recursive)
directory = "/srv/hopper/inbox"
# A file must be quiet this long before it is processed
quiet_period_ms = 2000
# How often pending files are checked (must be < quiet_period_ms)
drain_interval_ms = 1000
# Queue files already in the directory at startup
scan_existing = true
# Re-queue files still present every N seconds (0 = off)
rescan_interval_secs = 0
# Never process files matching these gitignore-style patterns
ignore_patterns = ["*.lock"]

[pipeline]
# backup/, processing/ and complete/ live here (default: parent of watch.directory)
# work_root = "/srv/hopper"
max_concurrent_runs = 4

[pipeline.transformers]
# extension = "uppercase" | "passthrough"
txt = "uppercase"

[logging]
level = "info"
# directory = "/var/log/hopper"
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = HopperConfig::default();

        assert_eq!(config.watch.quiet_period(), Duration::from_secs(2));
        assert_eq!(config.watch.drain_interval(), Duration::from_secs(1));
        assert!(config.watch.scan_existing);
        assert!(config.watch.rescan_interval().is_none());
        assert_eq!(
            config.pipeline.transformers.get("txt"),
            Some(&TransformerKind::Uppercase)
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_directory() {
        let config = HopperConfig::default();
        assert!(config.watched_directory().is_err());
    }

    #[test]
    fn test_partial_file_keeps_defaults() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("config.toml");
        fs::write(
            &path,
            "[watch]\ndirectory = \"/tmp/inbox\"\nquiet_period_ms = 5000\n\n[pipeline.transformers]\ncsv = \"passthrough\"\n",
        )?;

        let config = HopperConfig::load(&path)?;

        assert_eq!(config.watched_directory()?, Path::new("/tmp/inbox"));
        assert_eq!(config.watch.quiet_period_ms, 5000);
        assert_eq!(config.watch.drain_interval_ms, 1000);
        assert_eq!(config.pipeline.max_concurrent_runs, 4);
        // An explicit table replaces the default registry
        assert_eq!(config.pipeline.transformers.len(), 1);
        assert_eq!(
            config.pipeline.transformers.get("csv"),
            Some(&TransformerKind::Passthrough)
        );
        Ok(())
    }

    #[test]
    fn test_parse_error_names_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.toml");
        fs::write(&path, "[watch\n").unwrap();

        let err = HopperConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("broken.toml"));
    }

    #[test]
    fn test_drain_must_be_shorter_than_quiet_period() {
        let mut config = HopperConfig::default();
        config.watch.quiet_period_ms = 1000;
        config.watch.drain_interval_ms = 1000;

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("drain_interval_ms"));

        config.watch.drain_interval_ms = 999;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = HopperConfig::default();
        config.pipeline.max_concurrent_runs = 0;
        assert!(config.validate().is_err());

        let mut config = HopperConfig::default();
        config.watch.max_pending = Some(0);
        assert!(config.validate().is_err());

        let mut config = HopperConfig::default();
        config
            .pipeline
            .transformers
            .insert("tar.gz".to_string(), TransformerKind::Passthrough);
        assert!(config.validate().is_err());

        let mut config = HopperConfig::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());

        let mut config = HopperConfig::default();
        config.watch.rescan_interval_secs = 2;
        assert!(config.validate().is_err());
        config.watch.rescan_interval_secs = 3;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_example_is_valid() {
        let config: HopperConfig = toml::from_str(HopperConfig::example()).unwrap();
        assert!(config.validate().is_ok());
        assert!(config.watched_directory().is_ok());
    }

    #[test]
    fn test_render_round_trips() -> Result<()> {
        let mut config = HopperConfig::default();
        config.watch.directory = Some(PathBuf::from("/data/in"));

        let rendered = config.to_toml_string()?;
        let parsed: HopperConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed, config);
        Ok(())
    }
}
