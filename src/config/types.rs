//! Core configuration types.
//! - Config holds runtime settings with defaults matching a cautious run.
//! - LogLevel is the program-level verbosity.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::backup::BackupOptions;
use crate::engine::ExecuteOptions;
use crate::model::VectorFormat;
use crate::naming::{FileSetNames, Sanitizer};
use crate::plan::{NamespaceScope, PlanOptions};

/// Program-defined verbosity levels exposed to users/config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    /// Only errors
    Quiet,
    /// Warnings and the run summary (default)
    #[default]
    Normal,
    /// Per-container progress
    Info,
    /// Everything, including SQL and file moves
    Debug,
}

impl LogLevel {
    /// Parse common names (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "quiet" | "error" | "none" => Some(LogLevel::Quiet),
            "normal" | "warn" => Some(LogLevel::Normal),
            "info" | "verbose" => Some(LogLevel::Info),
            "debug" | "trace" => Some(LogLevel::Debug),
            _ => None,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogLevel::Quiet => "quiet",
            LogLevel::Normal => "normal",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        })
    }
}

impl FromStr for LogLevel {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("invalid log level: '{s}'"))
    }
}

/// Runtime configuration for one run.
#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: LogLevel,
    /// Optional log file in addition to stderr
    pub log_file: Option<PathBuf>,
    /// Only plan and preview; never mutate
    pub dry_run: bool,
    /// Snapshot containers before mutating them
    pub backup: bool,
    /// Put backups here (mirroring the tree) instead of next to the originals
    pub backup_dir: Option<PathBuf>,
    /// Keep backups even for containers that rolled back cleanly
    pub keep_backups: bool,
    pub namespace_scope: NamespaceScope,
    pub file_set_names: FileSetNames,
    /// Parallel container groups during apply
    pub jobs: usize,
    /// Enabled container formats
    pub formats: Vec<VectorFormat>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Normal,
            log_file: None,
            dry_run: true,
            backup: true,
            backup_dir: None,
            keep_backups: false,
            namespace_scope: NamespaceScope::PerRun,
            file_set_names: FileSetNames::Strict,
            jobs: 1,
            formats: VectorFormat::ALL.to_vec(),
        }
    }
}

impl Config {
    pub fn plan_options(&self) -> PlanOptions {
        PlanOptions {
            formats: self.formats.clone(),
            scope: self.namespace_scope,
            sanitizer: Sanitizer::new(self.file_set_names),
        }
    }

    pub fn execute_options(&self, root: &Path) -> ExecuteOptions {
        ExecuteOptions {
            backup: self.backup,
            backup_location: BackupOptions {
                root: root.to_path_buf(),
                backup_dir: self.backup_dir.clone(),
            },
            keep_backups: self.keep_backups,
            jobs: self.jobs.max(1),
        }
    }
}
