//! On-disk stage layout and output helpers

use crate::{Error, Result, TransformError};
use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use ulid::Ulid;

/// Stage directories shared by all pipeline runs
///
/// Lives next to the watched directory unless a work root is configured:
/// ```text
/// <root>/
///   inbox/            (watched)
///   backup/           latest safety copy per file name
///   processing/       in-progress files, empty when idle
///   complete/         transformed output, <stem>-<ulid><ext>
///   .hopper/
///     watch.lock
/// ```
/// Runs are partitioned by file name, so two different names never touch
/// the same path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    root: PathBuf,
    backup_dir: PathBuf,
    processing_dir: PathBuf,
    complete_dir: PathBuf,
}

impl Layout {
    /// Layout rooted at `root`
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            backup_dir: root.join("backup"),
            processing_dir: root.join("processing"),
            complete_dir: root.join("complete"),
        }
    }

    /// Layout rooted at the parent of the watched directory
    pub fn for_watched_dir(watched: &Path) -> Result<Self> {
        let parent = watched
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or_else(|| Error::InvalidPath {
                path: watched.to_path_buf(),
                reason: "watched directory has no parent to hold stage directories",
            })?;
        Ok(Self::new(parent))
    }

    /// Layout for a configuration, honouring `pipeline.work_root`
    pub fn from_config(config: &crate::HopperConfig) -> Result<Self> {
        match &config.pipeline.work_root {
            Some(root) => Ok(Self::new(root)),
            None => Self::for_watched_dir(config.watched_directory()?),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    pub fn processing_dir(&self) -> &Path {
        &self.processing_dir
    }

    pub fn complete_dir(&self) -> &Path {
        &self.complete_dir
    }

    /// Private state directory (lock files)
    pub fn state_dir(&self) -> PathBuf {
        self.root.join(".hopper")
    }

    /// Backup location for a file name
    pub fn backup_path(&self, file_name: &std::ffi::OsStr) -> PathBuf {
        self.backup_dir.join(file_name)
    }

    /// In-progress location for a file name
    pub fn processing_path(&self, file_name: &std::ffi::OsStr) -> PathBuf {
        self.processing_dir.join(file_name)
    }

    /// Fresh, collision-free archive location for a source path
    pub fn archive_path(&self, source: &Path) -> Result<PathBuf> {
        let name = archive_file_name(source).ok_or_else(|| Error::InvalidPath {
            path: source.to_path_buf(),
            reason: "path has no file name",
        })?;
        Ok(self.complete_dir.join(name))
    }

    /// Files left behind in processing/, e.g. by an interrupted run
    pub fn leftover_in_processing(&self) -> Result<Vec<PathBuf>> {
        let mut leftovers = Vec::new();
        let entries = match std::fs::read_dir(&self.processing_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(leftovers),
            Err(e) => return Err(e.into()),
        };

        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                leftovers.push(entry.path());
            }
        }
        leftovers.sort();
        Ok(leftovers)
    }
}

/// Archive file name `<stem>-<ulid><.ext>` for a source path
///
/// The ULID carries 80 random bits, so names stay unique even when the
/// same stem is archived several times within one millisecond.
pub fn archive_file_name(source: &Path) -> Option<OsString> {
    let stem = source.file_stem()?;

    let mut name = OsString::with_capacity(stem.len() + 32);
    name.push(stem);
    name.push("-");
    name.push(Ulid::new().to_string());
    if let Some(ext) = source.extension() {
        name.push(".");
        name.push(ext);
    }
    Some(name)
}

/// Write `data` to `output` all at once or not at all
///
/// Data goes to a temp file next to the output, is fsynced, then persisted
/// without clobbering. On any error the temp file is removed and `output`
/// is left absent.
pub fn write_output_atomic(output: &Path, data: &[u8]) -> std::result::Result<(), TransformError> {
    let parent = match output.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;

    tmp.persist_noclobber(output).map_err(|e| {
        if e.error.kind() == std::io::ErrorKind::AlreadyExists {
            TransformError::OutputExists(output.to_path_buf())
        } else {
            TransformError::Io(e.error)
        }
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_layout_next_to_watched_dir() -> Result<()> {
        let layout = Layout::for_watched_dir(Path::new("/srv/hopper/inbox"))?;

        assert_eq!(layout.root(), Path::new("/srv/hopper"));
        assert_eq!(layout.backup_dir(), Path::new("/srv/hopper/backup"));
        assert_eq!(layout.processing_dir(), Path::new("/srv/hopper/processing"));
        assert_eq!(layout.complete_dir(), Path::new("/srv/hopper/complete"));
        Ok(())
    }

    #[test]
    fn test_root_has_no_parent() {
        assert!(Layout::for_watched_dir(Path::new("/")).is_err());
        assert!(Layout::for_watched_dir(Path::new("inbox")).is_err());
    }

    #[test]
    fn test_archive_name_shape() {
        let name = archive_file_name(Path::new("/in/report.txt")).unwrap();
        let name = name.to_str().unwrap();

        assert!(name.starts_with("report-"));
        assert!(name.ends_with(".txt"));
        // report- + 26 char ULID + .txt
        assert_eq!(name.len(), "report-".len() + 26 + ".txt".len());
    }

    #[test]
    fn test_archive_name_without_extension() {
        let name = archive_file_name(Path::new("/in/Makefile")).unwrap();
        let name = name.to_str().unwrap();

        assert!(name.starts_with("Makefile-"));
        assert!(!name.contains('.'));
    }

    #[test]
    fn test_archive_names_unique() {
        let names: HashSet<_> = (0..1000)
            .map(|_| archive_file_name(Path::new("a.txt")).unwrap())
            .collect();
        assert_eq!(names.len(), 1000);
    }

    #[test]
    fn test_write_output_atomic() {
        let temp_dir = TempDir::new().unwrap();
        let output = temp_dir.path().join("out.txt");

        write_output_atomic(&output, b"HELLO").unwrap();

        assert_eq!(fs::read(&output).unwrap(), b"HELLO");
        // Only the output remains, no temp files
        assert_eq!(fs::read_dir(temp_dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_write_output_atomic_no_clobber() {
        let temp_dir = TempDir::new().unwrap();
        let output = temp_dir.path().join("out.txt");
        fs::write(&output, b"first").unwrap();

        let err = write_output_atomic(&output, b"second").unwrap_err();

        assert!(matches!(err, TransformError::OutputExists(_)));
        assert_eq!(fs::read(&output).unwrap(), b"first");
        assert_eq!(fs::read_dir(temp_dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_leftover_in_processing() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let layout = Layout::new(temp_dir.path());

        // Missing directory is not an error
        assert!(layout.leftover_in_processing()?.is_empty());

        fs::create_dir_all(layout.processing_dir())?;
        fs::write(layout.processing_path("b.bin".as_ref()), b"b")?;
        fs::write(layout.processing_path("a.txt".as_ref()), b"a")?;
        fs::create_dir(layout.processing_dir().join("nested"))?;

        let leftovers = layout.leftover_in_processing()?;
        assert_eq!(
            leftovers,
            vec![
                layout.processing_path("a.txt".as_ref()),
                layout.processing_path("b.bin".as_ref()),
            ]
        );
        Ok(())
    }
}
