//! Default config location and symlink checks.

use dirs::config_dir;
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Environment variable that points at an explicit config file.
pub const CONFIG_ENV: &str = "LAYER_RENAME_CONFIG";

/// Platform default: `<config_dir>/layer_rename/config.xml`.
pub fn default_config_path() -> Option<PathBuf> {
    match config_dir() {
        Some(base) => Some(base.join("layer_rename").join("config.xml")),
        None => env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join(".config")
                .join("layer_rename")
                .join("config.xml")
        }),
    }
}

/// Config file to use: `LAYER_RENAME_CONFIG` if set, else the platform default.
/// The flag is true when the path came from the environment.
pub fn resolve_config_path() -> Option<(PathBuf, bool)> {
    match env::var_os(CONFIG_ENV) {
        Some(p) if !p.is_empty() => Some((PathBuf::from(p), true)),
        _ => default_config_path().map(|p| (p, false)),
    }
}

/// True if any existing ancestor of `path` is a symlink.
pub fn path_has_symlink_ancestor(path: &Path) -> io::Result<bool> {
    let mut p = path.parent();
    while let Some(anc) = p {
        if anc.exists() && fs::symlink_metadata(anc)?.file_type().is_symlink() {
            return Ok(true);
        }
        p = anc.parent();
    }
    Ok(false)
}
