//! XML configuration support.
//! - Loads settings from config.xml (quick_xml + serde).
//! - Creates a commented template at the default location if missing
//!   (never when LAYER_RENAME_CONFIG points elsewhere).
//!
//! Unknown elements are rejected so that typos surface instead of silently
//! falling back to defaults.

use anyhow::{Context, Result, anyhow, bail};
use quick_xml::de::from_str as from_xml_str;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::paths::{path_has_symlink_ancestor, resolve_config_path};
use super::types::{Config, LogLevel};
use crate::model::parse_format_list;
use crate::naming::FileSetNames;
use crate::plan::NamespaceScope;
use crate::platform::write_config_secure_new_0600;

/// Mirror of config.xml. Every field is optional; text is trimmed on use.
#[derive(Debug, Default, Deserialize)]
#[serde(rename = "config")]
#[serde(deny_unknown_fields)]
struct XmlConfig {
    log_level: Option<String>,
    log_file: Option<String>,
    backup: Option<String>,
    backup_dir: Option<String>,
    keep_backups: Option<String>,
    namespace_scope: Option<String>,
    file_set_names: Option<String>,
    jobs: Option<String>,
    formats: Option<String>,
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|t| !t.is_empty())
}

fn parse_bool(field: &str, s: &str) -> Result<bool> {
    match s.to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        other => bail!("{field}: expected true/false, got '{other}'"),
    }
}

fn xml_to_config(parsed: XmlConfig) -> Result<Config> {
    let mut cfg = Config::default();
    if let Some(s) = non_empty(parsed.log_level.as_deref()) {
        cfg.log_level = s.parse::<LogLevel>().map_err(|e| anyhow!(e))?;
    }
    cfg.log_file = non_empty(parsed.log_file.as_deref()).map(PathBuf::from);
    if let Some(s) = non_empty(parsed.backup.as_deref()) {
        cfg.backup = parse_bool("backup", s)?;
    }
    cfg.backup_dir = non_empty(parsed.backup_dir.as_deref()).map(PathBuf::from);
    if let Some(s) = non_empty(parsed.keep_backups.as_deref()) {
        cfg.keep_backups = parse_bool("keep_backups", s)?;
    }
    if let Some(s) = non_empty(parsed.namespace_scope.as_deref()) {
        cfg.namespace_scope = s.parse::<NamespaceScope>().map_err(|e| anyhow!(e))?;
    }
    if let Some(s) = non_empty(parsed.file_set_names.as_deref()) {
        cfg.file_set_names = match s.to_ascii_lowercase().as_str() {
            "strict" => FileSetNames::Strict,
            "permissive" => FileSetNames::Permissive,
            other => bail!("file_set_names: expected strict or permissive, got '{other}'"),
        };
    }
    if let Some(s) = non_empty(parsed.jobs.as_deref()) {
        cfg.jobs = s
            .parse::<usize>()
            .with_context(|| format!("jobs: not a number: '{s}'"))?;
    }
    if let Some(s) = non_empty(parsed.formats.as_deref()) {
        cfg.formats = parse_format_list(s).map_err(|e| anyhow!("formats: {e}"))?;
    }
    Ok(cfg)
}

/// Load a Config from a specific XML file.
pub fn load_config_from_xml_path(path: &Path) -> Result<Config> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("read config xml '{}'", path.display()))?;
    let parsed: XmlConfig = from_xml_str(&contents)
        .with_context(|| format!("parse config xml '{}'", path.display()))?;
    xml_to_config(parsed).with_context(|| format!("invalid value in '{}'", path.display()))
}

/// Load the effective file config.
///
/// Returns defaults when the default file does not exist (after trying to
/// create the template there). A missing file named by LAYER_RENAME_CONFIG is
/// an error. The second value is the file that was read, if any.
pub fn load_config() -> Result<(Config, Option<PathBuf>)> {
    let Some((path, from_env)) = resolve_config_path() else {
        debug!("no config directory available; using defaults");
        return Ok((Config::default(), None));
    };
    if !path.exists() {
        if from_env {
            bail!("config file from LAYER_RENAME_CONFIG does not exist: {}", path.display());
        }
        if let Err(e) = create_template_config(&path) {
            debug!(path = %path.display(), error = %e, "could not create template config");
        }
        return Ok((Config::default(), None));
    }
    let cfg = load_config_from_xml_path(&path)?;
    debug!(path = %path.display(), "loaded config");
    Ok((cfg, Some(path)))
}

/// Commented template whose values equal the built-in defaults.
pub fn template_contents() -> String {
    let d = Config::default();
    format!(
        "<!--\n  layer_rename configuration (XML)\n\n    log_level        -> quiet | normal | info | debug\n    log_file         -> optional log file (stderr is always used)\n    backup           -> true/false: copy each container before changing it\n    backup_dir       -> optional directory for backups (mirrors the scanned tree)\n    keep_backups     -> true/false: keep backups even after a clean rollback\n    namespace_scope  -> per-run | per-container: where final names must be unique\n    file_set_names   -> strict | permissive: identifier rules for file-based layers\n    jobs             -> number of storage groups processed in parallel\n    formats          -> comma list of enabled formats\n\n  CLI flags override these values.\n-->\n<config>\n  <log_level>{}</log_level>\n  <log_file></log_file>\n  <backup>{}</backup>\n  <backup_dir></backup_dir>\n  <keep_backups>{}</keep_backups>\n  <namespace_scope>{}</namespace_scope>\n  <file_set_names>strict</file_set_names>\n  <jobs>{}</jobs>\n  <formats>{}</formats>\n</config>\n",
        d.log_level,
        d.backup,
        d.keep_backups,
        d.namespace_scope,
        d.jobs,
        d.formats
            .iter()
            .map(|f| f.as_str())
            .collect::<Vec<_>>()
            .join(","),
    )
}

/// Write the template to `path`, refusing symlinked ancestors.
pub fn create_template_config(path: &Path) -> Result<()> {
    if path_has_symlink_ancestor(path)? {
        bail!(
            "Refusing to create config: ancestor of {} is a symlink",
            path.display()
        );
    }
    write_config_secure_new_0600(path, template_contents().as_bytes())?;
    info!("Created template config at {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::VectorFormat;
    use tempfile::tempdir;

    #[test]
    fn template_parses_back_to_defaults() {
        let td = tempdir().unwrap();
        let p = td.path().join("config.xml");
        create_template_config(&p).unwrap();
        let cfg = load_config_from_xml_path(&p).unwrap();
        let d = Config::default();
        assert_eq!(cfg.log_level, d.log_level);
        assert_eq!(cfg.backup, d.backup);
        assert_eq!(cfg.log_file, None);
        assert_eq!(cfg.backup_dir, None);
        assert_eq!(cfg.formats, d.formats);
    }

    #[test]
    fn values_are_mapped() {
        let td = tempdir().unwrap();
        let p = td.path().join("config.xml");
        fs::write(
            &p,
            "<config><backup>false</backup><namespace_scope>per-container</namespace_scope>\
             <file_set_names>permissive</file_set_names><jobs> 4 </jobs><formats>gpkg,shp</formats></config>",
        )
        .unwrap();
        let cfg = load_config_from_xml_path(&p).unwrap();
        assert!(!cfg.backup);
        assert_eq!(cfg.namespace_scope, NamespaceScope::PerContainer);
        assert_eq!(cfg.file_set_names, FileSetNames::Permissive);
        assert_eq!(cfg.jobs, 4);
        assert_eq!(cfg.formats, vec![VectorFormat::GeoPackage, VectorFormat::Shapefile]);
    }

    #[test]
    fn unknown_field_is_rejected() {
        let td = tempdir().unwrap();
        let p = td.path().join("config.xml");
        fs::write(&p, "<config><dry_runn>true</dry_runn></config>").unwrap();
        let err = load_config_from_xml_path(&p).unwrap_err();
        assert!(format!("{err:#}").contains("unknown field"), "{err:#}");
    }

    #[test]
    fn bad_value_is_rejected() {
        let td = tempdir().unwrap();
        let p = td.path().join("config.xml");
        fs::write(&p, "<config><backup>maybe</backup></config>").unwrap();
        assert!(load_config_from_xml_path(&p).is_err());
    }
}
