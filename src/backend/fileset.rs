//! File-set containers: one layer whose name is the shared base name of a
//! primary file and its sidecars (`roads.shp`, `roads.dbf`, `roads.prj`, ...).

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::FileSetOps;
use crate::fs_ops::{io_error_with_help_io, move_no_clobber};
use crate::model::Container;

/// Layer name of a file-set container: its file name minus the primary extension.
pub fn file_set_stem(path: &Path) -> Option<String> {
    path.file_stem()?.to_str().map(str::to_string)
}

/// The part of `file_name` after `stem.`, when `file_name` belongs to `stem`.
fn component_suffix<'a>(file_name: &'a str, stem: &str) -> Option<&'a str> {
    file_name.strip_prefix(stem)?.strip_prefix('.')
}

/// Path a component moves to when its layer is renamed to `new_stem`.
/// Extension spelling (`.SHP` vs `.shp`) is preserved.
pub fn component_target(component: &Path, old_stem: &str, new_stem: &str) -> Option<PathBuf> {
    let name = component.file_name()?.to_str()?;
    let suffix = component_suffix(name, old_stem)?;
    let parent = component.parent()?;
    Some(parent.join(format!("{new_stem}.{suffix}")))
}

/// Real filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFileSet;

impl FileSetOps for RealFileSet {
    fn component_paths(&self, container: &Container) -> io::Result<Vec<PathBuf>> {
        let stem = file_set_stem(&container.path).ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "file name is not valid UTF-8")
        })?;
        let primary_ext = container
            .path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        let known = container.format.component_extensions(&primary_ext);
        let dir = container.parent_dir();

        let mut out = vec![container.path.clone()];
        let entries = fs::read_dir(dir).map_err(io_error_with_help_io("list directory", dir))?;
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            if path == container.path || !entry.file_type()?.is_file() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some(suffix) = component_suffix(name, &stem) else {
                continue;
            };
            if known.contains(&suffix.to_ascii_lowercase().as_str()) {
                out.push(path);
            }
        }
        // Primary stays first; the rest in a stable order.
        out[1..].sort();
        Ok(out)
    }

    fn rename_path(&self, from: &Path, to: &Path) -> io::Result<()> {
        move_no_clobber(from, to)
    }
}
