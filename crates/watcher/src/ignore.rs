//! Ignore rules for the watched directory
//!
//! Two sources, checked in order:
//! 1. Built-in patterns for editor temp files and partial downloads
//!    (always active, these files are never complete inputs)
//! 2. Gitignore-style patterns from `watch.ignore_patterns`

use crate::Result;
use ::ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::path::{Path, PathBuf};

/// Ignore rule matcher for one watched directory
pub struct IgnoreRules {
    /// Watched directory, patterns are relative to it
    root: PathBuf,

    /// Compiled configured patterns (None when there are none)
    patterns: Option<Gitignore>,

    /// Number of configured patterns
    pattern_count: usize,
}

impl IgnoreRules {
    /// Compile rules for `root` with additional patterns
    pub fn new(root: &Path, patterns: &[String]) -> Result<Self> {
        let compiled = if patterns.is_empty() {
            None
        } else {
            let mut builder = GitignoreBuilder::new(root);
            for pattern in patterns {
                builder.add_line(None, pattern)?;
            }
            Some(builder.build()?)
        };

        Ok(Self {
            root: root.to_path_buf(),
            patterns: compiled,
            pattern_count: patterns.len(),
        })
    }

    /// Built-in rules only
    pub fn builtin(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            patterns: None,
            pattern_count: 0,
        }
    }

    /// Check if a file should never be processed
    pub fn should_ignore(&self, path: &Path) -> bool {
        let filename = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name,
            // Non UTF-8 names still go through the configured patterns
            None => return self.matches_patterns(path),
        };

        if is_temp_file(filename) {
            return true;
        }

        self.matches_patterns(path)
    }

    fn matches_patterns(&self, path: &Path) -> bool {
        let Some(ref patterns) = self.patterns else {
            return false;
        };

        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        patterns.matched(relative, false).is_ignore()
    }

    /// Number of configured (non built-in) patterns
    pub fn pattern_count(&self) -> usize {
        self.pattern_count
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Editor temp files, OS metadata and in-flight downloads
fn is_temp_file(filename: &str) -> bool {
    // Vim swap files
    if filename.ends_with(".swp")
        || filename.ends_with(".swo")
        || filename.ends_with(".swx")
    {
        return true;
    }

    // Vim/Emacs backup files
    if filename.ends_with('~') {
        return true;
    }

    // Emacs auto-save (#*#) and lock files (.#*)
    if (filename.starts_with('#') && filename.ends_with('#')) || filename.starts_with(".#") {
        return true;
    }

    // MacOS/Windows system files
    if filename == ".DS_Store"
        || filename.starts_with("._")
        || filename == "Thumbs.db"
        || filename == "desktop.ini"
    {
        return true;
    }

    // Partial downloads and copy-in-progress files
    filename.ends_with(".part")
        || filename.ends_with(".crdownload")
        || filename.ends_with(".partial")
        || filename.ends_with(".tmp")
}
