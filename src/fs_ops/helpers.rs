//! Turn bare `io::Error`s into messages that say what was attempted, on which
//! path, and (when the OS code is recognised) what the operator can do about it.
//!
//!   fs::rename(a, b).map_err(io_error_with_help_io("rename", a))?;

use anyhow::anyhow;
use std::io;
use std::path::Path;

#[cfg(unix)]
fn hint_for_os_code(code: i32) -> Option<&'static str> {
    let hint = match code {
        libc::EACCES | libc::EPERM => "permission denied; check ownership and write permissions",
        libc::EROFS => "read-only filesystem",
        libc::EEXIST => "target already exists",
        libc::ENOENT => "path not found",
        libc::EBUSY | libc::ETXTBSY => "file is busy; another program may hold it open",
        libc::EXDEV => "source and target are on different filesystems",
        libc::ENOSPC => "no space left on device",
        libc::ENAMETOOLONG => "file name too long",
        libc::EMFILE | libc::ENFILE => "too many open files",
        _ => return None,
    };
    Some(hint)
}

#[cfg(windows)]
fn hint_for_os_code(code: i32) -> Option<&'static str> {
    let hint = match code {
        5 => "access denied; check permissions",
        19 => "media is write protected",
        32 | 33 => "file is in use by another program",
        80 | 183 => "target already exists",
        2 | 3 => "path not found",
        17 => "source and target are on different drives",
        112 => "disk is full",
        206 => "file name too long",
        _ => return None,
    };
    Some(hint)
}

fn hint_for_kind(kind: io::ErrorKind) -> Option<&'static str> {
    match kind {
        io::ErrorKind::PermissionDenied => Some("permission denied"),
        io::ErrorKind::NotFound => Some("path not found"),
        io::ErrorKind::AlreadyExists => Some("target already exists"),
        _ => None,
    }
}

fn build_message(op: &str, path: &Path, e: &io::Error) -> String {
    let mut msg = format!("{op} '{}': {e}", path.display());
    let hint = e
        .raw_os_error()
        .and_then(hint_for_os_code)
        .or_else(|| hint_for_kind(e.kind()));
    if let Some(hint) = hint {
        msg.push_str(" (");
        msg.push_str(hint);
        msg.push(')');
    }
    msg
}

/// `.map_err` adapter for anyhow code paths.
pub fn io_error_with_help<'a>(
    op: &'a str,
    path: &'a Path,
) -> impl FnOnce(io::Error) -> anyhow::Error + 'a {
    move |e: io::Error| anyhow!(build_message(op, path, &e))
}

/// `.map_err` adapter that keeps the `ErrorKind`.
pub fn io_error_with_help_io<'a>(
    op: &'a str,
    path: &'a Path,
) -> impl FnOnce(io::Error) -> io::Error + 'a {
    move |e: io::Error| io::Error::new(e.kind(), build_message(op, path, &e))
}
