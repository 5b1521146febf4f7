//! Container discovery.
//!
//! Walks the root (symlinks are not followed), classifies entries by extension
//! and lists each container's layers. The result is sorted by path so that
//! repeated runs over an unchanged tree see the same sequence.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::backend;
use crate::errors::{LayerRenameError, Result};
use crate::model::{BackendKind, Container, Layer, Mutability, VectorFormat};
use crate::platform;

/// Lock file created in the root while a run applies changes.
pub const LOCK_FILE_NAME: &str = ".layer_rename.lock";

/// A container that was found but could not be listed.
#[derive(Debug)]
pub struct SkippedContainer {
    pub path: PathBuf,
    pub error: LayerRenameError,
}

/// Everything discovery found, in lexicographic path order.
#[derive(Debug, Default)]
pub struct Discovery {
    pub containers: Vec<Container>,
    /// Layers of all containers, grouped by container, ordinal order within each.
    pub layers: Vec<Layer>,
    pub skipped: Vec<SkippedContainer>,
}

impl Discovery {
    pub fn layers_of(&self, container: usize) -> impl Iterator<Item = &Layer> {
        self.layers.iter().filter(move |l| l.container == container)
    }
}

/// Whether `stem` looks like `<name>_backup_YYYYMMDD_HHMMSS` with an optional `-n`.
pub fn is_backup_artifact(stem: &str) -> bool {
    let base = match stem.rsplit_once('-') {
        Some((head, n)) if !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()) => head,
        _ => stem,
    };
    let Some((_, stamp)) = base.rsplit_once("_backup_") else {
        return false;
    };
    let b = stamp.as_bytes();
    b.len() == 15
        && b[8] == b'_'
        && b[..8].iter().all(u8::is_ascii_digit)
        && b[9..].iter().all(u8::is_ascii_digit)
}

fn is_internal_artifact(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    if name == LOCK_FILE_NAME || name.starts_with(".layer_rename.") {
        return true;
    }
    path.file_stem()
        .and_then(|s| s.to_str())
        .is_some_and(is_backup_artifact)
}

fn mutability_of(path: &Path, kind: BackendKind) -> Mutability {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    // SQLite needs the directory writable too, for its journal.
    let writable = match kind {
        BackendKind::SqlMultiLayer => platform::is_writable(path) && platform::is_writable(dir),
        BackendKind::FileSetSingleLayer => platform::is_writable(dir),
    };
    if writable {
        Mutability::Writable
    } else {
        Mutability::ReadOnly
    }
}

/// Collect candidate container paths under `root` for the enabled formats,
/// plus the directories and entries the walk could not read.
fn walk(root: &Path, formats: &[VectorFormat]) -> (Vec<(PathBuf, VectorFormat)>, Vec<SkippedContainer>) {
    let mut found = Vec::new();
    let mut unreadable = Vec::new();
    let mut it = WalkDir::new(root).follow_links(false).into_iter();
    while let Some(next) = it.next() {
        let entry = match next {
            Ok(e) => e,
            Err(e) => {
                let path = e.path().unwrap_or(root).to_path_buf();
                warn!(path = %path.display(), error = %e, "skipping unreadable directory entry");
                unreadable.push(SkippedContainer {
                    error: LayerRenameError::container_read(&path, &e),
                    path,
                });
                continue;
            }
        };
        if entry.depth() == 0 {
            continue;
        }
        let path = entry.path();
        let ft = entry.file_type();
        let Some(format) = VectorFormat::from_path(path) else {
            continue;
        };
        if format.is_directory() != ft.is_dir() || !(ft.is_dir() || ft.is_file()) {
            continue;
        }
        if ft.is_dir() {
            // A geodatabase is one container; its internals are not.
            it.skip_current_dir();
        }
        if !formats.contains(&format) || is_internal_artifact(path) {
            continue;
        }
        found.push((path.to_path_buf(), format));
    }
    found.sort();
    (found, unreadable)
}

/// Discover containers and their layers below `root`.
///
/// Fails only when the root itself cannot be read; containers that cannot be
/// listed end up in [`Discovery::skipped`].
pub fn discover(root: &Path, formats: &[VectorFormat]) -> Result<Discovery> {
    fs::read_dir(root).map_err(|e| LayerRenameError::Discovery {
        path: root.to_path_buf(),
        reason: e.to_string(),
    })?;

    let (found, unreadable) = walk(root, formats);
    let mut out = Discovery {
        skipped: unreadable,
        ..Discovery::default()
    };
    for (path, format) in found {
        let mutability = mutability_of(&path, format.backend());
        let container = Container {
            path,
            format,
            mutability,
        };
        match backend::list_layers(&container) {
            Ok(names) => {
                let idx = out.containers.len();
                debug!(
                    container = %container.path.display(),
                    format = %format,
                    layers = names.len(),
                    read_only = !container.is_writable(),
                    "discovered container"
                );
                out.layers.extend(names.into_iter().enumerate().map(|(ordinal, name)| Layer {
                    container: idx,
                    name,
                    ordinal,
                }));
                out.containers.push(container);
            }
            Err(error) => {
                warn!(container = %container.path.display(), code = error.code(), error = %error, "skipping container");
                out.skipped.push(SkippedContainer {
                    path: container.path,
                    error,
                });
            }
        }
    }
    out.skipped.sort_by(|a, b| a.path.cmp(&b.path));
    info!(
        root = %root.display(),
        containers = out.containers.len(),
        layers = out.layers.len(),
        skipped = out.skipped.len(),
        "discovery complete"
    );
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn recognises_backup_names() {
        assert!(is_backup_artifact("roads_backup_20240131_235959"));
        assert!(is_backup_artifact("roads_backup_20240131_235959-2"));
        assert!(!is_backup_artifact("roads_backup"));
        assert!(!is_backup_artifact("roads_backup_2024_0131"));
        assert!(!is_backup_artifact("roads-2"));
    }

    #[test]
    fn file_sets_sorted_and_filtered() {
        let td = tempdir().unwrap();
        let root = td.path();
        fs::create_dir(root.join("sub")).unwrap();
        fs::write(root.join("sub/b.geojson"), b"{}").unwrap();
        fs::write(root.join("a.shp"), b"").unwrap();
        fs::write(root.join("a.dbf"), b"").unwrap();
        fs::write(root.join("a_backup_20240101_000000.shp"), b"").unwrap();
        fs::write(root.join("notes.txt"), b"").unwrap();

        let d = discover(root, &VectorFormat::ALL).unwrap();
        let names: Vec<_> = d.layers.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, ["a", "b"]);
        assert_eq!(d.containers[0].format, VectorFormat::Shapefile);

        let only_json = discover(root, &[VectorFormat::GeoJson]).unwrap();
        assert_eq!(only_json.containers.len(), 1);
    }

    #[test]
    fn geodatabase_reported_and_not_descended() {
        let td = tempdir().unwrap();
        let gdb = td.path().join("city.gdb");
        fs::create_dir(&gdb).unwrap();
        fs::write(gdb.join("a00000001.gdbtable.json"), b"{}").unwrap();
        let d = discover(td.path(), &VectorFormat::ALL).unwrap();
        assert!(d.containers.is_empty());
        assert_eq!(d.skipped.len(), 1);
        assert!(matches!(d.skipped[0].error, LayerRenameError::ContainerRead { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_directory_is_reported() {
        use std::os::unix::fs::PermissionsExt;

        if unsafe { libc::geteuid() } == 0 {
            // root reads any directory
            return;
        }
        let td = tempdir().unwrap();
        let sealed = td.path().join("sealed");
        fs::create_dir(&sealed).unwrap();
        fs::write(sealed.join("hidden.geojson"), b"{}").unwrap();
        fs::write(td.path().join("open.geojson"), b"{}").unwrap();
        fs::set_permissions(&sealed, fs::Permissions::from_mode(0o000)).unwrap();

        let d = discover(td.path(), &VectorFormat::ALL);
        fs::set_permissions(&sealed, fs::Permissions::from_mode(0o755)).unwrap();
        let d = d.unwrap();

        assert_eq!(d.containers.len(), 1);
        assert_eq!(d.skipped.len(), 1);
        assert_eq!(d.skipped[0].path, sealed);
        assert!(matches!(d.skipped[0].error, LayerRenameError::ContainerRead { .. }));
    }

    #[test]
    fn missing_root_is_fatal() {
        let err = discover(Path::new("/definitely/not/here"), &VectorFormat::ALL).unwrap_err();
        assert!(err.is_fatal());
    }
}
