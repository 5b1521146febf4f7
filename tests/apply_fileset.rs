mod common;

use std::fs;

use layer_rename::engine::{Engine, ExecuteOptions};
use layer_rename::naming::RenameOperation;
use layer_rename::plan::{PlanOptions, build_plan};
use layer_rename::report::{BackupStatus, ContainerOutcome, EntryResult};
use tempfile::tempdir;

use common::{backup_files, exec_options, file_names, make_shapefile};

fn no_backup(root: &std::path::Path) -> ExecuteOptions {
    ExecuteOptions {
        backup: false,
        ..exec_options(root)
    }
}

#[test]
fn every_component_follows_the_layer_name() {
    let td = tempdir().unwrap();
    make_shapefile(td.path(), "temp_roads");
    fs::write(td.path().join("temp_roads.shp.xml"), "meta").unwrap();
    fs::write(td.path().join("temp_roads_notes.txt"), "unrelated").unwrap();

    let op = RenameOperation::Replace {
        find: "temp_".into(),
        replace: String::new(),
    };
    let plan = build_plan(td.path(), &op, &PlanOptions::default()).unwrap();
    let report = Engine::new(no_backup(td.path())).execute(&plan).unwrap();
    assert!(!report.has_failures());
    assert_eq!(report.containers[0].outcome, ContainerOutcome::Applied);

    assert_eq!(
        file_names(td.path()),
        [
            "roads.dbf",
            "roads.prj",
            "roads.shp",
            "roads.shp.xml",
            "roads.shx",
            "temp_roads_notes.txt",
        ]
    );
    assert_eq!(fs::read_to_string(td.path().join("roads.dbf")).unwrap(), "temp_roads.dbf");
}

#[test]
fn occupied_target_is_retried_after_the_rest_of_the_directory() {
    let td = tempdir().unwrap();
    make_shapefile(td.path(), "a");
    make_shapefile(td.path(), "b");
    // a -> b (taken on disk until b moves), b -> b_1.
    let op = RenameOperation::Replace {
        find: "a".into(),
        replace: "b".into(),
    };
    let plan = build_plan(td.path(), &op, &PlanOptions::default()).unwrap();
    let finals: Vec<_> = plan.entries().iter().map(|e| e.final_name.as_str()).collect();
    assert_eq!(finals, ["b", "b_1"]);

    let report = Engine::new(no_backup(td.path())).execute(&plan).unwrap();
    assert!(!report.has_failures(), "{report:?}");
    assert_eq!(fs::read_to_string(td.path().join("b.shp")).unwrap(), "a.shp");
    assert_eq!(fs::read_to_string(td.path().join("b_1.shx")).unwrap(), "b.shx");
    assert!(!td.path().join("a.shp").exists());
    // Report order follows the plan, not the execution order.
    assert!(report.containers[0].container.ends_with("a.shp"));
}

#[test]
fn rename_chain_in_one_directory_resolves_back_to_front() {
    let td = tempdir().unwrap();
    for stem in ["a", "ax", "axx"] {
        make_shapefile(td.path(), stem);
    }
    let plan = build_plan(td.path(), &RenameOperation::AddSuffix("x".into()), &PlanOptions::default()).unwrap();
    let finals: Vec<_> = plan.entries().iter().map(|e| e.final_name.as_str()).collect();
    assert_eq!(finals, ["ax", "axx", "axxx"]);

    let report = Engine::new(no_backup(td.path())).execute(&plan).unwrap();
    assert!(!report.has_failures(), "{report:?}");
    assert!(report.containers.iter().all(|c| c.outcome == ContainerOutcome::Applied));
    assert!(!td.path().join("a.shp").exists());
    assert_eq!(fs::read_to_string(td.path().join("ax.shp")).unwrap(), "a.shp");
    assert_eq!(fs::read_to_string(td.path().join("axx.dbf")).unwrap(), "ax.dbf");
    assert_eq!(fs::read_to_string(td.path().join("axxx.prj")).unwrap(), "axx.prj");
}

#[test]
fn single_file_siblings_with_one_stem_stay_separate() {
    let td = tempdir().unwrap();
    fs::write(td.path().join("roads.geojson"), "geojson").unwrap();
    fs::write(td.path().join("roads.json"), "json").unwrap();
    let plan = build_plan(td.path(), &RenameOperation::AddSuffix("_x".into()), &PlanOptions::default()).unwrap();
    let finals: Vec<_> = plan.entries().iter().map(|e| e.final_name.as_str()).collect();
    assert_eq!(finals, ["roads_x", "roads_x_1"]);

    let report = Engine::new(no_backup(td.path())).execute(&plan).unwrap();
    assert!(!report.has_failures(), "{report:?}");
    assert_eq!(file_names(td.path()), ["roads_x.geojson", "roads_x_1.json"]);
    assert_eq!(fs::read_to_string(td.path().join("roads_x.geojson")).unwrap(), "geojson");
    assert_eq!(fs::read_to_string(td.path().join("roads_x_1.json")).unwrap(), "json");
}

#[test]
fn foreign_file_in_the_way_fails_and_restores() {
    let td = tempdir().unwrap();
    make_shapefile(td.path(), "roads");
    fs::write(td.path().join("streets.dbf"), "stray").unwrap();
    let before = file_names(td.path());

    let op = RenameOperation::Replace {
        find: "roads".into(),
        replace: "streets".into(),
    };
    let plan = build_plan(td.path(), &op, &PlanOptions::default()).unwrap();
    let report = Engine::new(exec_options(td.path())).execute(&plan).unwrap();

    let c = &report.containers[0];
    assert_eq!(c.outcome, ContainerOutcome::Failed);
    assert!(matches!(c.entries[0].result, EntryResult::Failed(_)));
    assert_eq!(c.backup, BackupStatus::Discarded);
    assert_eq!(file_names(td.path()), before);
    assert_eq!(fs::read_to_string(td.path().join("streets.dbf")).unwrap(), "stray");
}

#[test]
fn backup_copies_every_component() {
    let td = tempdir().unwrap();
    make_shapefile(td.path(), "parcels");
    let plan = build_plan(td.path(), &RenameOperation::Uppercase, &PlanOptions::default()).unwrap();
    let report = Engine::new(exec_options(td.path())).execute(&plan).unwrap();
    assert!(!report.has_failures());

    let backups = backup_files(td.path());
    assert_eq!(backups.len(), 4, "{backups:?}");
    assert!(backups.iter().all(|n| n.starts_with("parcels_backup_")));
    assert!(td.path().join("PARCELS.shp").exists());
}

#[test]
fn permissive_names_keep_spaces() {
    let td = tempdir().unwrap();
    make_shapefile(td.path(), "old roads");
    let opts = PlanOptions {
        sanitizer: layer_rename::naming::Sanitizer::new(layer_rename::naming::FileSetNames::Permissive),
        ..PlanOptions::default()
    };
    let op = RenameOperation::AddSuffix(" v2".into());
    let plan = build_plan(td.path(), &op, &opts).unwrap();
    assert_eq!(plan.entries()[0].final_name, "old roads v2");
    Engine::new(no_backup(td.path())).execute(&plan).unwrap();
    assert!(td.path().join("old roads v2.shp").exists());

    let strict = build_plan(td.path(), &op, &PlanOptions::default()).unwrap();
    assert_eq!(strict.entries()[0].final_name, "old_roads_v2_v2");
}
