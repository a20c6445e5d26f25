//! Backup, staging, transform and archival of a single file

use crate::report::{Disposition, RunError, RunReport, Step};
use crate::run::PipelineRun;
use hopper_core::{HopperConfig, Layout, TransformerRegistry};
use std::fs;
use std::io;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Moves files through the stage directories of one layout
///
/// Stateless between runs: everything a run touches is derived from its own
/// file name, so `process` may be called concurrently for different names.
#[derive(Debug, Clone)]
pub struct StagePipeline {
    layout: Layout,
    registry: TransformerRegistry,
}

impl StagePipeline {
    pub fn new(layout: Layout, registry: TransformerRegistry) -> Self {
        Self { layout, registry }
    }

    /// Pipeline for a validated configuration
    pub fn from_config(config: &HopperConfig) -> hopper_core::Result<Self> {
        Ok(Self::new(
            Layout::from_config(config)?,
            TransformerRegistry::from_config(&config.pipeline),
        ))
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn registry(&self) -> &TransformerRegistry {
        &self.registry
    }

    /// Run `source` through every stage
    ///
    /// Blocking; never panics on filesystem errors. The returned report
    /// holds the final run state and outcome.
    pub fn process(&self, source: &Path) -> RunReport {
        let started = Instant::now();
        let mut run = PipelineRun::discover(source.to_path_buf());

        info!("Begin processing of {}", source.display());

        let result = self.advance(&mut run);
        if result.is_err() {
            run.fail();
        }

        RunReport {
            run,
            result,
            elapsed: started.elapsed(),
        }
    }

    fn advance(&self, run: &mut PipelineRun) -> Result<Disposition, RunError> {
        let source = run.source_path().to_path_buf();

        // 1. Existence check, before any directory is created
        if !source.is_file() {
            return Err(RunError::SourceMissing(source));
        }
        let file_name = run
            .file_name()
            .map(|n| n.to_os_string())
            .ok_or_else(|| RunError::SourceMissing(source.clone()))?;

        // 2. Backup copy, overwriting the previous one for this name
        let backup = self.layout.backup_path(&file_name);
        fs::create_dir_all(self.layout.backup_dir())
            .map_err(|e| io_error(Step::Backup, self.layout.backup_dir(), e))?;
        fs::copy(&source, &backup).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound if !source.exists() => RunError::SourceMissing(source.clone()),
            _ => io_error(Step::Backup, &backup, e),
        })?;
        debug!(path = %source.display(), backup = %backup.display(), "Backed up");
        run.backed_up(backup);

        // 3. Stage into processing/
        let staged = self.layout.processing_path(&file_name);
        fs::create_dir_all(self.layout.processing_dir())
            .map_err(|e| io_error(Step::Stage, self.layout.processing_dir(), e))?;
        if fs::symlink_metadata(&staged).is_ok() {
            return Err(RunError::NameCollision(staged));
        }
        move_file(&source, &staged).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound if !source.exists() => RunError::SourceMissing(source.clone()),
            _ => io_error(Step::Stage, &staged, e),
        })?;
        run.staged(staged.clone());

        // 4. Transformer lookup
        let Some(transformer) = self.registry.get(run.extension()) else {
            warn!(
                path = %staged.display(),
                extension = run.extension(),
                "Unsupported type, no transformer registered"
            );
            return Ok(Disposition::Unsupported { staged_at: staged });
        };

        // 5. Transform into a fresh archive name
        fs::create_dir_all(self.layout.complete_dir())
            .map_err(|e| io_error(Step::Transform, self.layout.complete_dir(), e))?;
        let archive = self.layout.archive_path(&source)?;
        transformer
            .transform(&staged, &archive)
            .map_err(|source| RunError::Transform {
                transformer: transformer.name(),
                path: staged.clone(),
                source,
            })?;
        run.transformed();

        // 6. Cleanup; the archive is now canonical
        if let Err(e) = fs::remove_file(&staged) {
            warn!(
                archive = %archive.display(),
                "Output archived but in-progress copy could not be removed"
            );
            return Err(io_error(Step::Cleanup, &staged, e));
        }
        run.archived(archive.clone());

        Ok(Disposition::Archived(archive))
    }
}

fn io_error(step: Step, path: &Path, source: io::Error) -> RunError {
    RunError::Io {
        step,
        path: path.to_path_buf(),
        source,
    }
}

/// Rename, falling back to copy + remove across filesystems
fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(e),
        Err(e) => {
            debug!("Rename failed ({}), copying {} instead", e, from.display());
            copy_then_remove(from, to, |path| fs::remove_file(path))
        }
    }
}

/// Copy `from` to `to`, then remove `from`
///
/// If `from` cannot be removed the copy is deleted again, so the file ends up
/// in exactly one place.
fn copy_then_remove(
    from: &Path,
    to: &Path,
    remove: impl FnOnce(&Path) -> io::Result<()>,
) -> io::Result<()> {
    fs::copy(from, to)?;
    if let Err(e) = remove(from) {
        let _ = fs::remove_file(to);
        return Err(e);
    }
    Ok(())
}
