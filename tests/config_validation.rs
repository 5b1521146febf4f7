use assert_fs::TempDir;
use layer_rename::config::{Config, LogLevel, load_config_from_xml_path, validate_root};
use layer_rename::model::VectorFormat;
use layer_rename::plan::NamespaceScope;
use std::fs;

fn write_config(td: &TempDir, body: &str) -> std::path::PathBuf {
    let path = td.path().join("config.xml");
    fs::write(&path, format!("<config>{body}</config>")).unwrap();
    path
}

#[test]
fn xml_values_flow_into_run_options() {
    let td = TempDir::new().unwrap();
    let root = dunce::canonicalize(td.path()).unwrap();
    let backups = root.join("backups");
    let path = write_config(
        &td,
        &format!(
            "<log_level>info</log_level>\
             <backup_dir>{}</backup_dir>\
             <keep_backups>yes</keep_backups>\
             <namespace_scope>per-container</namespace_scope>\
             <jobs>3</jobs>\
             <formats>gpkg, shapefile</formats>",
            backups.display()
        ),
    );

    let cfg = load_config_from_xml_path(&path).unwrap();
    cfg.validate().unwrap();
    assert_eq!(cfg.log_level, LogLevel::Info);
    assert!(cfg.dry_run, "the file never turns on apply");

    let plan = cfg.plan_options();
    assert_eq!(plan.scope, NamespaceScope::PerContainer);
    assert_eq!(plan.formats, [VectorFormat::GeoPackage, VectorFormat::Shapefile]);

    let exec = cfg.execute_options(&root);
    assert_eq!(exec.jobs, 3);
    assert!(exec.keep_backups);
    assert_eq!(exec.backup_location.backup_dir.as_deref(), Some(backups.as_path()));
    assert_eq!(exec.backup_location.root, root);
}

#[test]
fn blank_elements_keep_defaults() {
    let td = TempDir::new().unwrap();
    let path = write_config(&td, "<log_file>  </log_file><jobs></jobs><formats/>");
    let cfg = load_config_from_xml_path(&path).unwrap();
    let d = Config::default();
    assert_eq!(cfg.log_file, None);
    assert_eq!(cfg.jobs, d.jobs);
    assert_eq!(cfg.formats, d.formats);
}

#[test]
fn zero_jobs_is_rejected() {
    let td = TempDir::new().unwrap();
    let path = write_config(&td, "<jobs>0</jobs>");
    let cfg = load_config_from_xml_path(&path).unwrap();
    let err = cfg.validate().unwrap_err();
    assert!(format!("{err}").contains("jobs must be at least 1"));
}

#[test]
fn backup_dir_that_is_a_file_is_rejected() {
    let td = TempDir::new().unwrap();
    let file = td.path().join("not_a_dir");
    fs::write(&file, b"x").unwrap();
    let path = write_config(&td, &format!("<backup_dir>{}</backup_dir>", file.display()));
    let err = load_config_from_xml_path(&path).unwrap().validate().unwrap_err();
    assert!(format!("{err}").contains("isn't a directory"));
}

#[test]
fn unknown_format_names_the_field() {
    let td = TempDir::new().unwrap();
    let path = write_config(&td, "<formats>gpkg,dxf</formats>");
    let err = load_config_from_xml_path(&path).unwrap_err();
    assert!(format!("{err:#}").contains("formats"), "{err:#}");
}

#[test]
fn root_is_canonicalized() {
    let td = TempDir::new().unwrap();
    let nested = td.path().join("a").join("b");
    fs::create_dir_all(&nested).unwrap();
    let dotted = td.path().join("a").join(".").join("b");
    let canon = validate_root(&dotted).unwrap();
    assert_eq!(canon, dunce::canonicalize(&nested).unwrap());
}
