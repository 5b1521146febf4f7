//! Pre-mutation snapshots.
//!
//! Every file of a container is copied to `<stem>_backup_<YYYYMMDD_HHMMSS>.<ext>`
//! next to the original (or under a backup directory mirroring the tree).
//! Copies are durable and never overwrite anything; a taken name gets `-2`,
//! `-3`, ... appended to the stem.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tracing::{debug, info, warn};

use crate::backend::{FileSetOps, component_target, file_set_stem};
use crate::errors::{LayerRenameError, Result};
use crate::fs_ops::durable_copy;
use crate::model::{BackendKind, Container};

/// Where backups go.
#[derive(Debug, Clone, Default)]
pub struct BackupOptions {
    /// Run root; used to mirror relative paths under `backup_dir`.
    pub root: PathBuf,
    /// `None` puts backups next to the originals.
    pub backup_dir: Option<PathBuf>,
}

/// A completed snapshot of one container.
#[derive(Debug, Clone)]
pub struct BackupRecord {
    pub container: PathBuf,
    /// Backup of the primary file; restoring starts here.
    pub location: PathBuf,
    /// Every copied file, primary first.
    pub files: Vec<PathBuf>,
    pub created_at: DateTime<Local>,
}

/// Files that make up `container` on disk, primary first.
pub fn backup_sources(container: &Container, files: &dyn FileSetOps) -> Result<Vec<PathBuf>> {
    match container.kind() {
        BackendKind::SqlMultiLayer => {
            let mut out = vec![container.path.clone()];
            let mut wal = container.path.clone().into_os_string();
            wal.push("-wal");
            let wal = PathBuf::from(wal);
            if wal.is_file() {
                out.push(wal);
            }
            Ok(out)
        }
        BackendKind::FileSetSingleLayer => files
            .component_paths(container)
            .map_err(|e| LayerRenameError::backup(&container.path, e)),
    }
}

fn backup_dir_for(container: &Container, options: &BackupOptions) -> PathBuf {
    let parent = container.parent_dir();
    match &options.backup_dir {
        Some(dir) => match parent.strip_prefix(&options.root) {
            Ok(rel) => dir.join(rel),
            Err(_) => dir.clone(),
        },
        None => parent.to_path_buf(),
    }
}

/// Destination of every source for a backup stem, or `None` if one is unmappable.
fn targets_for(sources: &[PathBuf], stem: &str, backup_stem: &str, dir: &Path) -> Option<Vec<PathBuf>> {
    sources
        .iter()
        .map(|src| {
            let target = component_target(src, stem, backup_stem)?;
            Some(dir.join(target.file_name()?))
        })
        .collect()
}

/// Snapshot `container` before it is mutated.
pub fn backup(container: &Container, files: &dyn FileSetOps, options: &BackupOptions) -> Result<BackupRecord> {
    let sources = backup_sources(container, files)?;
    let stem = file_set_stem(&container.path)
        .ok_or_else(|| LayerRenameError::backup(&container.path, "file name is not valid UTF-8"))?;
    let dir = backup_dir_for(container, options);
    let created_at = Local::now();
    let base = format!("{stem}_backup_{}", created_at.format("%Y%m%d_%H%M%S"));

    let mut n = 1u32;
    let targets = loop {
        let backup_stem = if n == 1 { base.clone() } else { format!("{base}-{n}") };
        let targets = targets_for(&sources, &stem, &backup_stem, &dir).ok_or_else(|| {
            LayerRenameError::backup(&container.path, "component file names do not share the layer name")
        })?;
        if !targets.iter().any(|t| t.exists()) {
            break targets;
        }
        n += 1;
        if n > 1000 {
            return Err(LayerRenameError::backup(&container.path, "no free backup name"));
        }
    };

    let mut copied: Vec<PathBuf> = Vec::with_capacity(targets.len());
    for (src, dst) in sources.iter().zip(&targets) {
        match durable_copy(src, dst) {
            Ok(bytes) => {
                debug!(src = %src.display(), dst = %dst.display(), bytes, "backed up");
                copied.push(dst.clone());
            }
            Err(e) => {
                for done in &copied {
                    let _ = fs::remove_file(done);
                }
                return Err(LayerRenameError::backup(&container.path, e));
            }
        }
    }

    let record = BackupRecord {
        container: container.path.clone(),
        location: targets[0].clone(),
        files: copied,
        created_at,
    };
    info!(container = %record.container.display(), backup = %record.location.display(), files = record.files.len(), "backup created");
    Ok(record)
}

/// Remove a backup that is no longer needed.
pub fn discard(record: &BackupRecord) -> Result<()> {
    let mut first_err = None;
    for f in &record.files {
        if let Err(e) = fs::remove_file(f) {
            warn!(path = %f.display(), error = %e, "could not remove backup file");
            first_err.get_or_insert(e);
        }
    }
    match first_err {
        Some(e) => Err(LayerRenameError::backup(&record.container, e)),
        None => {
            debug!(container = %record.container.display(), "backup discarded");
            Ok(())
        }
    }
}
