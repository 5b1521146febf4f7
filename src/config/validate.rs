//! Config and root validation.

use anyhow::{Context, Result, bail};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error};

use super::types::Config;
use crate::fs_ops::io_error_with_help;

impl Config {
    /// Reject settings that cannot work before anything touches the tree.
    pub fn validate(&self) -> Result<()> {
        if self.formats.is_empty() {
            bail!("no container formats enabled");
        }
        if self.jobs == 0 {
            bail!("jobs must be at least 1");
        }
        if let Some(dir) = &self.backup_dir
            && dir.exists()
            && !dir.is_dir()
        {
            bail!("backup_dir exists but isn't a directory: {}", dir.display());
        }
        Ok(())
    }
}

/// Root must exist, be a readable directory. Returns the canonical form
/// (without the `\\?\` prefix on Windows).
pub fn validate_root(root: &Path) -> Result<PathBuf> {
    if !root.exists() {
        error!("root does not exist: {}", root.display());
        bail!("root does not exist: {}", root.display());
    }
    if !root.is_dir() {
        bail!("root is not a directory: {}", root.display());
    }
    fs::read_dir(root).map_err(io_error_with_help("read root", root))?;
    let canonical = dunce::canonicalize(root)
        .with_context(|| format!("canonicalize root '{}'", root.display()))?;
    debug!(root = %canonical.display(), "root validated");
    Ok(canonical)
}
