//! Durable copy used for backups:
//! - copies into a hidden temp file in the destination directory (`create_new`)
//! - fsyncs the temp file, carries over the modification time
//! - renames temp -> dest without clobbering, then fsyncs the directory

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;

use filetime::FileTime;
use tracing::{trace, warn};

use super::atomic::move_no_clobber;
use super::helpers::io_error_with_help_io;
use super::util::unique_temp_path;

const BUF_SIZE: usize = 1024 * 1024;

/// Copy `src` to `dest`, which must not exist yet. Returns bytes copied.
pub fn durable_copy(src: &Path, dest: &Path) -> io::Result<u64> {
    let dest_dir = dest.parent().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("destination has no parent: {}", dest.display()),
        )
    })?;
    fs::create_dir_all(dest_dir).map_err(io_error_with_help_io("create directory", dest_dir))?;

    let tmp = unique_temp_path(dest_dir, "copy");
    let bytes = match copy_to_new(src, &tmp) {
        Ok(n) => n,
        Err(e) => {
            let _ = fs::remove_file(&tmp);
            return Err(e);
        }
    };
    if let Err(e) = move_no_clobber(&tmp, dest) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    trace!(src = %src.display(), dest = %dest.display(), bytes, "durable copy done");
    Ok(bytes)
}

fn copy_to_new(src: &Path, tmp: &Path) -> io::Result<u64> {
    let src_f = File::open(src).map_err(io_error_with_help_io("open", src))?;
    let meta = src_f.metadata()?;
    let dst_f = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(tmp)
        .map_err(io_error_with_help_io("create", tmp))?;

    let mut reader = BufReader::with_capacity(BUF_SIZE, src_f);
    let mut writer = BufWriter::with_capacity(BUF_SIZE, dst_f);
    let bytes = io::copy(&mut reader, &mut writer).map_err(io_error_with_help_io("copy to", tmp))?;
    writer.flush()?;
    let dst_f = writer.into_inner().map_err(|e| e.into_error())?;
    dst_f.sync_all().map_err(io_error_with_help_io("fsync", tmp))?;
    drop(dst_f);

    let mtime = FileTime::from_last_modification_time(&meta);
    if let Err(e) = filetime::set_file_mtime(tmp, mtime) {
        warn!(path = %tmp.display(), error = %e, "could not preserve modification time");
    }
    Ok(bytes)
}
