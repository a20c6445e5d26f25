//! Helpers for running the `hopper` binary
//!
//! Wraps `std::process::Command` so tests can build an invocation, run it
//! with an isolated config directory, and assert on the outcome.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

/// `hopper` invocation builder
pub struct HopperCommand {
    binary_path: PathBuf,
    working_dir: PathBuf,
    args: Vec<String>,
    env: HashMap<String, String>,
}

impl HopperCommand {
    /// New command run from `working_dir`
    ///
    /// `XDG_CONFIG_HOME` and `HOME` point inside `working_dir` so a user
    /// config file never leaks into a test.
    pub fn new(working_dir: impl AsRef<Path>) -> Self {
        let working_dir = working_dir.as_ref().to_path_buf();
        let isolated = working_dir.join(".test-config");

        let mut env = HashMap::new();
        env.insert("XDG_CONFIG_HOME".to_string(), isolated.display().to_string());
        env.insert("HOME".to_string(), isolated.display().to_string());
        env.insert("NO_COLOR".to_string(), "1".to_string());

        Self {
            binary_path: find_hopper_binary(),
            working_dir,
            args: Vec::new(),
            env,
        }
    }

    pub fn args(&mut self, args: &[&str]) -> &mut Self {
        self.args.extend(args.iter().map(|s| s.to_string()));
        self
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.binary_path);
        command
            .args(&self.args)
            .current_dir(&self.working_dir)
            .envs(&self.env);
        command
    }

    /// Run to completion
    pub fn execute(&self) -> Result<CommandResult> {
        let output = self
            .command()
            .output()
            .with_context(|| format!("Failed to execute {}", self.binary_path.display()))?;

        Ok(CommandResult {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code().unwrap_or(-1),
        })
    }

    /// Start in the background (for `hopper watch`)
    pub fn spawn(&self) -> Result<Child> {
        self.command()
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .context("Failed to spawn hopper")
    }

    pub fn assert_success(&self) -> Result<CommandResult> {
        let result = self.execute()?;
        if !result.success() {
            anyhow::bail!(
                "Command failed (exit code: {}):\nArgs: {:?}\nStdout: {}\nStderr: {}",
                result.exit_code,
                self.args,
                result.stdout,
                result.stderr
            );
        }
        Ok(result)
    }

    pub fn assert_failure(&self) -> Result<CommandResult> {
        let result = self.execute()?;
        if result.success() {
            anyhow::bail!(
                "Command should have failed but succeeded:\nArgs: {:?}\nStdout: {}",
                self.args,
                result.stdout
            );
        }
        Ok(result)
    }
}

/// Command execution result
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    pub fn contains_stdout(&self, text: &str) -> bool {
        self.stdout.contains(text)
    }

    pub fn contains_stderr(&self, text: &str) -> bool {
        self.stderr.contains(text)
    }
}

/// Locate the `hopper` binary built for this test run
fn find_hopper_binary() -> PathBuf {
    if let Some(path) = option_env!("CARGO_BIN_EXE_hopper") {
        return PathBuf::from(path);
    }

    // target/<profile>/deps/<test binary>
    let mut path = std::env::current_exe().expect("Failed to get current exe path");
    path.pop();
    path.pop();
    path.join("hopper")
}

/// Build a `HopperCommand` from a directory and arguments
///
/// ```ignore
/// hopper!(dir, "process", "inbox/a.txt").assert_success()?;
/// ```
#[macro_export]
macro_rules! hopper {
    ($dir:expr, $($arg:expr),*) => {{
        let mut cmd = $crate::common::cli::HopperCommand::new($dir);
        cmd.args(&[$($arg),*]);
        cmd
    }};
}
