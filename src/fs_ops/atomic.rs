//! Rename without clobbering.
//! - Refuses to replace an existing destination (`AlreadyExists`).
//! - Fsyncs the destination directory afterwards (Unix, best-effort).
//!
//! The existence check and the rename are two syscalls; the run lock keeps
//! other layer_rename processes out of the window. Foreign writers are not
//! guarded against.

use std::fs;
use std::io;
use std::path::Path;

use tracing::trace;

use super::helpers::io_error_with_help_io;
use super::util::fsync_dir;

pub fn move_no_clobber(src: &Path, dst: &Path) -> io::Result<()> {
    if fs::symlink_metadata(dst).is_ok() {
        return Err(io_error_with_help_io("rename onto", dst)(io::Error::from(
            io::ErrorKind::AlreadyExists,
        )));
    }
    fs::rename(src, dst).map_err(io_error_with_help_io("rename", src))?;
    trace!(from = %src.display(), to = %dst.display(), "renamed");

    #[cfg(unix)]
    if let Some(parent) = dst.parent() {
        // A failed fsync does not undo a completed rename.
        let _ = fsync_dir(parent);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn refuses_existing_target() {
        let td = tempdir().unwrap();
        let a = td.path().join("a.dbf");
        let b = td.path().join("b.dbf");
        fs::write(&a, b"a").unwrap();
        fs::write(&b, b"b").unwrap();
        let err = move_no_clobber(&a, &b).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert_eq!(fs::read(&b).unwrap(), b"b");
        assert!(a.exists());
    }

    #[test]
    fn moves_into_free_target() {
        let td = tempdir().unwrap();
        let a = td.path().join("a.dbf");
        let b = td.path().join("b.dbf");
        fs::write(&a, b"a").unwrap();
        move_no_clobber(&a, &b).unwrap();
        assert!(!a.exists());
        assert_eq!(fs::read(&b).unwrap(), b"a");
    }
}
