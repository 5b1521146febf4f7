use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

static SEQ: AtomicU64 = AtomicU64::new(0);

/// Hidden, unique sibling path in `dir`: `.layer_rename.<tag>.<pid>.<nanos>.<seq>.tmp`.
pub(crate) fn unique_temp_path(dir: &Path, tag: &str) -> PathBuf {
    let pid = std::process::id();
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let seq = SEQ.fetch_add(1, Ordering::Relaxed);
    dir.join(format!(".layer_rename.{tag}.{pid}.{nanos}.{seq}.tmp"))
}

#[cfg(unix)]
pub(crate) fn fsync_dir(dir: &Path) -> io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(windows)]
pub(crate) fn fsync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}
