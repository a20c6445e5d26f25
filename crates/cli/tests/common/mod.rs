//! Common utilities for integration tests

pub mod cli;

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Scratch work root with an `inbox/` directory
pub struct TestRoot {
    _temp_dir: TempDir,
    pub root: PathBuf,
    pub inbox: PathBuf,
}

impl TestRoot {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("create temp dir");
        let root = temp_dir.path().canonicalize().expect("canonicalize temp dir");
        let inbox = root.join("inbox");
        fs::create_dir(&inbox).expect("create inbox");
        Self {
            _temp_dir: temp_dir,
            root,
            inbox,
        }
    }

    /// Write a file into the inbox
    pub fn drop_file(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.inbox.join(name);
        fs::write(&path, contents).expect("write inbox file");
        path
    }

    /// Visible files in a stage directory, sorted
    pub fn stage_files(&self, stage: &str) -> Vec<PathBuf> {
        list_visible(&self.root.join(stage))
    }
}

pub fn list_visible(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = match fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .map(|n| !n.to_string_lossy().starts_with('.'))
                    .unwrap_or(false)
            })
            .collect(),
        Err(_) => Vec::new(),
    };
    files.sort();
    files
}
