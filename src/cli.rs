//! CLI definition and parsing.
//! Defines Args and provides parse() for command-line handling.
//!
//! Notes:
//! - The default is a dry run; `--apply` is required to change anything.
//! - --debug is a shorthand for --log-level debug.

use anyhow::{Result, bail};
use clap::{Parser, ValueEnum, ValueHint};
use std::path::PathBuf;

use layer_rename::config::{Config, LogLevel};
use layer_rename::model::parse_format_list;
use layer_rename::naming::{FileSetNames, RenameOperation};
use layer_rename::plan::NamespaceScope;

/// Which rename operation to apply to every layer.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpArg {
    Replace,
    TrimBegin,
    TrimEnd,
    AddPrefix,
    AddSuffix,
    Clean,
    Lowercase,
    Uppercase,
    TitleCase,
}

/// CLI wrapper for the layer_rename library.
/// CLI flags override config values (which are loaded from XML if present).
#[derive(Parser, Debug, Clone)]
#[command(
    author,
    version,
    about = "Batch rename layers in GeoPackage, SpatiaLite and file-based vector data"
)]
pub struct Args {
    /// Directory to scan recursively for vector containers.
    #[arg(value_name = "ROOT", value_hint = ValueHint::DirPath, required_unless_present = "print_config")]
    pub root: Option<PathBuf>,

    /// Rename operation.
    #[arg(long, value_enum, required_unless_present = "print_config")]
    pub op: Option<OpArg>,

    /// Text to find (replace).
    #[arg(long)]
    pub find: Option<String>,

    /// Replacement text (replace); empty deletes matches.
    #[arg(long = "replace", value_name = "TEXT")]
    pub replace_with: Option<String>,

    /// Number of characters (trim-begin, trim-end).
    #[arg(long)]
    pub count: Option<usize>,

    /// Text to add (add-prefix, add-suffix).
    #[arg(long)]
    pub text: Option<String>,

    /// Comma list of enabled formats: gpkg,spatialite,shapefile,geojson,kml,gpx,gml,mapinfo,gdb
    #[arg(long, value_name = "LIST")]
    pub formats: Option<String>,

    /// Perform the renames. Without this flag only the preview is printed.
    #[arg(long, help = "Apply the plan (default is a dry run)")]
    pub apply: bool,

    #[arg(long, help = "Do not back up containers before changing them")]
    pub no_backup: bool,

    #[arg(long, value_hint = ValueHint::DirPath, help = "Write backups under this directory")]
    pub backup_dir: Option<PathBuf>,

    #[arg(long, help = "Keep backups even for containers that rolled back cleanly")]
    pub keep_backups: bool,

    /// Where final names must be unique: per-run or per-container.
    #[arg(long = "namespace", value_name = "SCOPE")]
    pub namespace: Option<NamespaceScope>,

    #[arg(long, help = "Allow any portable file name for file-based layers")]
    pub permissive_file_names: bool,

    /// Storage groups processed in parallel.
    #[arg(long, value_name = "N")]
    pub jobs: Option<usize>,

    /// Enable debug logging (equivalent to `--log-level debug`).
    #[arg(
        short = 'd',
        long,
        help = "Enable debug logging (shorthand for --log-level debug)"
    )]
    pub debug: bool,

    /// Set log level. One of: quiet, normal, info, debug.
    #[arg(long, help = "Set log level: quiet, normal, info, debug")]
    pub log_level: Option<String>,

    #[arg(long, value_hint = ValueHint::FilePath, help = "Also write logs to this file")]
    pub log_file: Option<PathBuf>,

    /// Emit logs in structured JSON (includes timestamp, level, and structured fields).
    #[arg(long, help = "Emit logs in structured JSON")]
    pub json: bool,

    /// Print where layer_rename will look for the config file, then exit.
    #[arg(long, help = "Print the config file location and exit")]
    pub print_config: bool,
}

impl Args {
    /// Build the operation from `--op` and its parameters.
    pub fn to_operation(&self) -> Result<RenameOperation> {
        let Some(op) = self.op else {
            bail!("--op is required");
        };
        let text = |flag: &str| -> Result<String> {
            match &self.text {
                Some(t) => Ok(t.clone()),
                None => bail!("--op {flag} needs --text"),
            }
        };
        let count = |flag: &str| -> Result<usize> {
            match self.count {
                Some(n) => Ok(n),
                None => bail!("--op {flag} needs --count"),
            }
        };
        let operation = match op {
            OpArg::Replace => {
                let Some(find) = self.find.clone() else {
                    bail!("--op replace needs --find");
                };
                RenameOperation::Replace {
                    find,
                    replace: self.replace_with.clone().unwrap_or_default(),
                }
            }
            OpArg::TrimBegin => RenameOperation::TrimBegin(count("trim-begin")?),
            OpArg::TrimEnd => RenameOperation::TrimEnd(count("trim-end")?),
            OpArg::AddPrefix => RenameOperation::AddPrefix(text("add-prefix")?),
            OpArg::AddSuffix => RenameOperation::AddSuffix(text("add-suffix")?),
            OpArg::Clean => RenameOperation::Clean,
            OpArg::Lowercase => RenameOperation::Lowercase,
            OpArg::Uppercase => RenameOperation::Uppercase,
            OpArg::TitleCase => RenameOperation::TitleCase,
        };
        operation.validate()?;
        Ok(operation)
    }

    /// Effective log level derived from flags.
    /// Precedence: --debug > --log-level value > None (use config default).
    pub fn effective_log_level(&self) -> Result<Option<LogLevel>> {
        if self.debug {
            return Ok(Some(LogLevel::Debug));
        }
        match self.log_level.as_deref() {
            Some(s) => match LogLevel::parse(s) {
                Some(l) => Ok(Some(l)),
                None => bail!("invalid --log-level '{s}'"),
            },
            None => Ok(None),
        }
    }

    /// Apply CLI overrides to a loaded Config (in-place). No-ops for unset flags.
    pub fn apply_overrides(&self, cfg: &mut Config) -> Result<()> {
        if let Some(level) = self.effective_log_level()? {
            cfg.log_level = level;
        }
        if let Some(lf) = &self.log_file {
            cfg.log_file = Some(lf.clone());
        }
        cfg.dry_run = !self.apply;
        if self.no_backup {
            cfg.backup = false;
        }
        if let Some(dir) = &self.backup_dir {
            cfg.backup_dir = Some(dir.clone());
        }
        if self.keep_backups {
            cfg.keep_backups = true;
        }
        if let Some(scope) = self.namespace {
            cfg.namespace_scope = scope;
        }
        if self.permissive_file_names {
            cfg.file_set_names = FileSetNames::Permissive;
        }
        if let Some(j) = self.jobs {
            cfg.jobs = j;
        }
        if let Some(list) = &self.formats {
            cfg.formats = parse_format_list(list).map_err(|e| anyhow::anyhow!("--formats: {e}"))?;
        }
        Ok(())
    }
}

pub fn parse() -> Args {
    Args::parse()
}
