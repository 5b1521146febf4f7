mod common;

use std::fs;

use layer_rename::engine::{Engine, ExecuteOptions};
use layer_rename::naming::RenameOperation;
use layer_rename::plan::{PlanOptions, build_plan, render_preview};
use layer_rename::report::{ContainerOutcome, EntryResult, render_summary};
use rusqlite::Connection;
use tempfile::tempdir;

use common::{exec_options, gpkg_layers, make_gpkg, make_shapefile};

#[test]
fn unreadable_container_does_not_stop_the_others() {
    let td = tempdir().unwrap();
    fs::write(td.path().join("broken.gpkg"), b"this is not a database at all").unwrap();
    let good = td.path().join("good.gpkg");
    make_gpkg(&good, &["tmp_roads"]);
    let op = RenameOperation::Replace {
        find: "tmp_".into(),
        replace: String::new(),
    };

    let plan = build_plan(td.path(), &op, &PlanOptions::default()).unwrap();
    assert_eq!(plan.skipped().len(), 1);
    assert!(plan.skipped()[0].path.ends_with("broken.gpkg"));

    let report = Engine::new(exec_options(td.path())).execute(&plan).unwrap();
    assert_eq!(gpkg_layers(&good), ["roads"]);
    assert_eq!(report.unreadable.len(), 1);
    assert_eq!(report.counts().layers_renamed, 1);
}

#[test]
fn failure_in_one_database_leaves_the_next_applied() {
    let td = tempdir().unwrap();
    let first = td.path().join("a.gpkg");
    let second = td.path().join("b.gpkg");
    make_gpkg(&first, &["x", "y"]);
    make_gpkg(&second, &["z"]);
    Connection::open(&first)
        .unwrap()
        .execute_batch("CREATE TABLE y_v2 (id INTEGER);")
        .unwrap();

    let plan = build_plan(td.path(), &RenameOperation::AddSuffix("_v2".into()), &PlanOptions::default()).unwrap();
    let report = Engine::new(ExecuteOptions {
        backup: false,
        ..exec_options(td.path())
    })
    .execute(&plan)
    .unwrap();

    assert_eq!(report.containers[0].outcome, ContainerOutcome::Failed);
    assert_eq!(report.containers[1].outcome, ContainerOutcome::Applied);
    assert_eq!(gpkg_layers(&first), ["x", "y"]);
    assert_eq!(gpkg_layers(&second), ["z_v2"]);

    let summary = render_summary(&report);
    assert!(summary.contains("layers renamed: 1"), "{summary}");
    assert!(summary.contains("failed: 2"), "{summary}");
}

#[cfg(unix)]
#[test]
fn read_only_directory_is_reported_not_touched() {
    use std::os::unix::fs::PermissionsExt;

    if unsafe { libc::geteuid() } == 0 {
        // root ignores directory permissions
        return;
    }
    let td = tempdir().unwrap();
    let locked = td.path().join("locked");
    fs::create_dir(&locked).unwrap();
    make_shapefile(&locked, "tmp_wells");
    make_shapefile(td.path(), "tmp_pipes");
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o555)).unwrap();

    let op = RenameOperation::Replace {
        find: "tmp_".into(),
        replace: String::new(),
    };
    let plan = build_plan(td.path(), &op, &PlanOptions::default()).unwrap();
    let report = Engine::new(exec_options(td.path())).execute(&plan).unwrap();
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

    let ro = report
        .containers
        .iter()
        .find(|c| c.container.starts_with(&locked))
        .unwrap();
    assert_eq!(ro.outcome, ContainerOutcome::Skipped);
    assert_eq!(ro.entries[0].result, EntryResult::Skipped("read-only".into()));
    assert!(locked.join("tmp_wells.shp").exists());
    assert!(td.path().join("pipes.shp").exists());
    assert!(!report.has_failures());
}

#[test]
fn dry_run_changes_nothing() {
    let td = tempdir().unwrap();
    let db = td.path().join("a.gpkg");
    make_gpkg(&db, &["Roads"]);
    make_shapefile(td.path(), "Wells");
    let bytes_before = fs::read(&db).unwrap();

    let plan = build_plan(td.path(), &RenameOperation::Lowercase, &PlanOptions::default()).unwrap();
    let preview = render_preview(&plan);
    assert!(preview.contains("RENAME PLAN - Layer Name Changes"));
    assert!(preview.contains("Total layers to rename: 2"), "{preview}");

    assert_eq!(fs::read(&db).unwrap(), bytes_before);
    assert!(td.path().join("Wells.shp").exists());
    assert_eq!(common::file_names(td.path()).len(), 5);
}
