//! Single-watcher lock for a work root

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Exclusive lock on `<state dir>/watch.lock`
///
/// Held for the lifetime of `hopper watch`, so two watchers never move files
/// through the same backup/processing/complete directories.
pub struct WatchLock {
    path: PathBuf,
    // Keeps the flock held
    _file: File,
}

/// Lock file content
#[derive(Debug, Serialize, Deserialize)]
struct LockContent {
    pid: u32,
    started_at: u64,
    watched: PathBuf,
}

impl WatchLock {
    /// Acquire the lock or fail if another process holds it
    ///
    /// The kernel releases a flock when its holder exits, so a lock file left
    /// behind by a dead process is simply locked again.
    pub fn acquire(state_dir: &Path, watched: &Path) -> Result<Self> {
        let lock_path = state_dir.join("watch.lock");

        std::fs::create_dir_all(state_dir)
            .with_context(|| format!("Failed to create {}", state_dir.display()))?;

        // A holder that exits removes the file; retry if we locked a removed inode
        for _ in 0..3 {
            let mut file = OpenOptions::new()
                .create(true)
                .read(true)
                .write(true)
                .truncate(false)
                .open(&lock_path)
                .context("Failed to open lock file")?;

            if !try_flock_exclusive(&file)? {
                match Self::read_lock_content(&mut file) {
                    Ok(content) => anyhow::bail!(
                        "Another hopper (pid {}) is already watching {}",
                        content.pid,
                        content.watched.display()
                    ),
                    Err(_) => anyhow::bail!(
                        "Another hopper is already watching (lock {} is held)",
                        lock_path.display()
                    ),
                }
            }

            if !still_linked(&file, &lock_path) {
                continue;
            }

            Self::write_lock_content(&mut file, watched)?;

            return Ok(Self {
                path: lock_path,
                _file: file,
            });
        }

        anyhow::bail!("Watch lock {} keeps being replaced", lock_path.display())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_lock_content(file: &mut File, watched: &Path) -> Result<()> {
        let content = LockContent {
            pid: std::process::id(),
            started_at: current_timestamp_ms(),
            watched: watched.to_path_buf(),
        };

        let serialized =
            serde_json::to_string(&content).context("Failed to serialize lock content")?;

        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(serialized.as_bytes())?;
        file.sync_all()?;
        Ok(())
    }

    fn read_lock_content(file: &mut File) -> Result<LockContent> {
        file.seek(SeekFrom::Start(0))?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;
        serde_json::from_str(&contents).context("Failed to deserialize lock content")
    }
}

impl Drop for WatchLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Try to take an exclusive flock without blocking
#[cfg(unix)]
fn try_flock_exclusive(file: &File) -> Result<bool> {
    use nix::fcntl::{flock, FlockArg};
    use std::os::unix::io::AsRawFd;

    match flock(file.as_raw_fd(), FlockArg::LockExclusiveNonblock) {
        Ok(()) => Ok(true),
        Err(nix::errno::Errno::EWOULDBLOCK) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[cfg(not(unix))]
fn try_flock_exclusive(_file: &File) -> Result<bool> {
    Ok(true)
}

/// Whether `path` still names the inode `file` has open
#[cfg(unix)]
fn still_linked(file: &File, path: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;

    match (file.metadata(), std::fs::metadata(path)) {
        (Ok(held), Ok(current)) => held.dev() == current.dev() && held.ino() == current.ino(),
        _ => false,
    }
}

#[cfg(not(unix))]
fn still_linked(_file: &File, _path: &Path) -> bool {
    true
}

fn current_timestamp_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
