#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use layer_rename::engine::ExecuteOptions;
use layer_rename::backup::BackupOptions;
use rusqlite::Connection;

/// Minimal GeoPackage: catalog tables plus one feature table per layer.
pub fn make_gpkg(path: &Path, layers: &[&str]) {
    let conn = Connection::open(path).unwrap();
    conn.execute_batch(
        "CREATE TABLE gpkg_contents (table_name TEXT NOT NULL PRIMARY KEY, data_type TEXT NOT NULL,
             identifier TEXT UNIQUE, description TEXT DEFAULT '', srs_id INTEGER);
         CREATE TABLE gpkg_geometry_columns (table_name TEXT NOT NULL, column_name TEXT NOT NULL,
             geometry_type_name TEXT NOT NULL DEFAULT 'GEOMETRY', srs_id INTEGER DEFAULT 4326,
             z TINYINT DEFAULT 0, m TINYINT DEFAULT 0,
             CONSTRAINT pk_geom_cols PRIMARY KEY (table_name, column_name),
             CONSTRAINT fk_gc_tn FOREIGN KEY (table_name) REFERENCES gpkg_contents(table_name));",
    )
    .unwrap();
    for l in layers {
        add_gpkg_layer(&conn, l);
    }
}

pub fn add_gpkg_layer(conn: &Connection, name: &str) {
    conn.execute_batch(&format!(
        "CREATE TABLE \"{name}\" (fid INTEGER PRIMARY KEY, geom BLOB, label TEXT);
         INSERT INTO \"{name}\" (label) VALUES ('{name}-row');"
    ))
    .unwrap();
    conn.execute(
        "INSERT INTO gpkg_contents (table_name, data_type, identifier) VALUES (?1, 'features', ?1)",
        [name],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO gpkg_geometry_columns (table_name, column_name) VALUES (?1, 'geom')",
        [name],
    )
    .unwrap();
}

/// SpatiaLite-shaped database: system tables plus plain layer tables.
pub fn make_spatialite(path: &Path, layers: &[&str]) {
    let conn = Connection::open(path).unwrap();
    conn.execute_batch(
        "CREATE TABLE spatial_ref_sys (srid INTEGER PRIMARY KEY, auth_name TEXT);
         CREATE TABLE geometry_columns (f_table_name TEXT, f_geometry_column TEXT, srid INTEGER);",
    )
    .unwrap();
    for l in layers {
        conn.execute_batch(&format!("CREATE TABLE \"{l}\" (id INTEGER PRIMARY KEY, geometry BLOB);"))
            .unwrap();
        conn.execute(
            "INSERT INTO geometry_columns VALUES (lower(?1), 'geometry', 4326)",
            [l],
        )
        .unwrap();
    }
}

/// Registered layer names in catalog order.
pub fn gpkg_layers(path: &Path) -> Vec<String> {
    let conn = Connection::open(path).unwrap();
    let mut stmt = conn
        .prepare("SELECT table_name FROM gpkg_contents ORDER BY rowid")
        .unwrap();
    stmt.query_map([], |r| r.get::<_, String>(0))
        .unwrap()
        .map(Result::unwrap)
        .collect()
}

/// Every table in the database, sorted.
pub fn sqlite_tables(path: &Path) -> Vec<String> {
    let conn = Connection::open(path).unwrap();
    let mut stmt = conn
        .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
        .unwrap();
    stmt.query_map([], |r| r.get::<_, String>(0))
        .unwrap()
        .map(Result::unwrap)
        .collect()
}

/// Shapefile set with the usual sidecars; each file holds its own name.
pub fn make_shapefile(dir: &Path, stem: &str) -> PathBuf {
    for ext in ["shp", "shx", "dbf", "prj"] {
        fs::write(dir.join(format!("{stem}.{ext}")), format!("{stem}.{ext}")).unwrap();
    }
    dir.join(format!("{stem}.shp"))
}

/// File names in `dir`, sorted.
pub fn file_names(dir: &Path) -> Vec<String> {
    let mut v: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    v.sort();
    v
}

pub fn backup_files(dir: &Path) -> Vec<String> {
    file_names(dir)
        .into_iter()
        .filter(|n| n.contains("_backup_"))
        .collect()
}

pub fn exec_options(root: &Path) -> ExecuteOptions {
    ExecuteOptions {
        backup_location: BackupOptions {
            root: root.to_path_buf(),
            backup_dir: None,
        },
        ..ExecuteOptions::default()
    }
}
