//! Advisory run lock.
//! One applying run per root: `.layer_rename.lock` is created in the root and
//! held with an exclusive `fs2` lock until the guard drops.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::trace;

use crate::discovery::LOCK_FILE_NAME;
use crate::errors::{LayerRenameError, Result};

/// Held for the duration of an applying run; releases on drop.
#[derive(Debug)]
pub struct RunLock {
    file: File,
    path: PathBuf,
}

impl RunLock {
    /// Take the lock without waiting; `Locked` if another run holds it.
    pub fn acquire(root: &Path) -> Result<Self> {
        let path = root.join(LOCK_FILE_NAME);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| LayerRenameError::Discovery {
                path: path.clone(),
                reason: format!("cannot create run lock: {e}"),
            })?;
        match file.try_lock_exclusive() {
            Ok(()) => {
                trace!(path = %path.display(), "run lock acquired");
                Ok(Self { file, path })
            }
            Err(e) if e.raw_os_error() == fs2::lock_contended_error().raw_os_error() => {
                Err(LayerRenameError::Locked(root.to_path_buf()))
            }
            Err(e) => Err(LayerRenameError::Discovery {
                path,
                reason: format!("cannot lock: {e}"),
            }),
        }
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
        let _ = std::fs::remove_file(&self.path);
        trace!(path = %self.path.display(), "run lock released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn second_acquire_is_refused_until_release() {
        let td = tempdir().unwrap();
        let first = RunLock::acquire(td.path()).unwrap();
        let err = RunLock::acquire(td.path()).unwrap_err();
        assert!(matches!(err, LayerRenameError::Locked(_)));
        assert!(err.is_fatal());
        drop(first);
        assert!(!td.path().join(LOCK_FILE_NAME).exists());
        let _again = RunLock::acquire(td.path()).unwrap();
    }
}
