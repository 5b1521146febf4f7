//! Storage backends.
//!
//! Two capabilities exist: SQL containers that rename tables inside one
//! transaction, and file sets whose layer name is the shared base name of
//! sibling files. Callers dispatch on [`BackendKind`] and reach storage only
//! through the traits below, so tests can substitute either side.

pub mod fileset;
pub mod sqlite;

use std::io;
use std::path::{Path, PathBuf};

use crate::errors::{LayerRenameError, Result};
use crate::model::{BackendKind, Container, VectorFormat};

pub use fileset::{RealFileSet, component_target, file_set_stem};
pub use sqlite::SqliteStore;

/// A transactional multi-layer store.
///
/// `rename_layer` is only valid between `begin` and `commit`/`rollback`.
pub trait SqlLayerStore {
    fn list_layers(&self) -> Result<Vec<String>>;
    fn begin(&mut self) -> Result<()>;
    fn rename_layer(&mut self, old: &str, new: &str) -> Result<()>;
    fn commit(&mut self) -> Result<()>;
    fn rollback(&mut self) -> Result<()>;
}

/// Filesystem operations needed to rename a file-set layer.
pub trait FileSetOps: Send + Sync {
    /// Every existing file belonging to the container's layer, primary first.
    fn component_paths(&self, container: &Container) -> io::Result<Vec<PathBuf>>;
    /// Move `from` to `to`, failing if `to` already exists.
    fn rename_path(&self, from: &Path, to: &Path) -> io::Result<()>;
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

/// Open an SQL container for writing.
pub fn open_sql_store(container: &Container) -> Result<Box<dyn SqlLayerStore>> {
    Ok(Box::new(SqliteStore::open_write(&container.path, container.format)?))
}

/// Enumerate the layers of one container in stable order.
pub fn list_layers(container: &Container) -> Result<Vec<String>> {
    if container.format == VectorFormat::FileGeodatabase {
        return Err(LayerRenameError::container_read(
            &container.path,
            "File Geodatabase layers cannot be enumerated without a GDAL driver",
        ));
    }
    match container.kind() {
        BackendKind::SqlMultiLayer => {
            SqliteStore::open_read(&container.path, container.format)?.list_layers()
        }
        BackendKind::FileSetSingleLayer => {
            let stem = file_set_stem(&container.path).ok_or_else(|| {
                LayerRenameError::container_read(&container.path, "file name is not valid UTF-8")
            })?;
            Ok(vec![stem])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Mutability;

    #[test]
    fn file_geodatabase_is_unreadable() {
        let c = Container {
            path: "/data/city.gdb".into(),
            format: VectorFormat::FileGeodatabase,
            mutability: Mutability::Writable,
        };
        let err = list_layers(&c).unwrap_err();
        assert!(err.to_string().contains("cannot be enumerated"));
    }

    #[test]
    fn file_set_layer_is_the_stem() {
        let c = Container {
            path: "/data/roads.v2.shp".into(),
            format: VectorFormat::Shapefile,
            mutability: Mutability::Writable,
        };
        assert_eq!(list_layers(&c).unwrap(), ["roads.v2"]);
    }
}
