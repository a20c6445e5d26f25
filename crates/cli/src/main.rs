//! Hopper CLI - hopper command

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

mod cmd;
mod daemon;
mod locks;
mod logging;
mod settings;
mod util;

/// Hopper - watch a drop folder and archive settled files
#[derive(Parser)]
#[command(name = "hopper")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (default: <config dir>/hopper/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count, conflicts_with = "quiet")]
    verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch a directory and process files once they settle
    Watch(WatchArgs),
    /// Run a single file through the pipeline now
    Process {
        /// File to process
        file: PathBuf,

        /// Root for backup/, processing/ and complete/ (default: parent of the file's directory)
        #[arg(long, value_name = "DIR")]
        work_root: Option<PathBuf>,
    },
    /// Show the effective configuration
    Config {
        /// Print an annotated example instead
        #[arg(long)]
        example: bool,
    },
}

#[derive(Args, Debug, Default)]
pub struct WatchArgs {
    /// Directory to watch (overrides watch.directory)
    pub directory: Option<PathBuf>,

    /// Quiet period in milliseconds
    #[arg(long, value_name = "MS")]
    pub quiet_ms: Option<u64>,

    /// Settle check interval in milliseconds
    #[arg(long, value_name = "MS")]
    pub drain_ms: Option<u64>,

    /// Do not queue files already present at startup
    #[arg(long)]
    pub no_scan: bool,

    /// Re-queue files still present every N seconds
    #[arg(long, value_name = "SECS")]
    pub rescan_secs: Option<u64>,

    /// Root for backup/, processing/ and complete/
    #[arg(long, value_name = "DIR")]
    pub work_root: Option<PathBuf>,

    /// Maximum concurrent pipeline runs
    #[arg(long, value_name = "N")]
    pub jobs: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = settings::load(cli.config.as_deref())?;
    match &cli.command {
        Commands::Watch(args) => settings::apply_watch_args(&mut config, args),
        Commands::Process {
            work_root: Some(root),
            ..
        } => config.pipeline.work_root = Some(root.clone()),
        _ => {}
    }

    let level = logging::level_for(&config.logging, cli.verbose, cli.quiet);
    let _log_guard = logging::init(level, config.logging.directory.as_deref())?;
    if let Some(path) = settings::config_source(cli.config.as_deref()) {
        tracing::debug!("Loaded config from {}", path.display());
    }

    match cli.command {
        Commands::Watch(_) => cmd::watch::run(config).await,
        Commands::Process { file, .. } => cmd::process::run(config, &file).await,
        Commands::Config { example } => cmd::config::run(&config, cli.config.as_deref(), example),
    }
}
