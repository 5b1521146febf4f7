//! SQLite-backed containers (GeoPackage and SpatiaLite).
//!
//! Layer listing reads the format's own registry. Renames run inside one
//! explicit transaction per container: `ALTER TABLE ... RENAME` plus updates to
//! every catalog table that stores the layer name.
//!
//! Notes:
//! - Foreign key checks are deferred to COMMIT so catalog rows can be updated
//!   in any order; a dangling reference makes COMMIT fail and the caller rolls back.
//! - Spatial triggers call functions (`ST_IsEmpty`, ...) that plain SQLite does
//!   not know. SQLite re-parses triggers during a rename, so inert stand-ins are
//!   registered on write connections. They never run: a rename touches no rows.

use std::path::{Path, PathBuf};

use rusqlite::functions::FunctionFlags;
use rusqlite::types::Value;
use rusqlite::{Connection, OpenFlags, params};
use tracing::{debug, trace};

use super::SqlLayerStore;
use crate::errors::{LayerRenameError, Result};
use crate::model::VectorFormat;

/// GeoPackage catalog tables with a `table_name` column.
const GPKG_CATALOG_TABLES: &[&str] = &[
    "gpkg_geometry_columns",
    "gpkg_extensions",
    "gpkg_data_columns",
    "gpkg_metadata_reference",
    "gpkg_tile_matrix",
    "gpkg_tile_matrix_set",
];

/// SpatiaLite catalog tables with an `f_table_name` column.
const SPATIALITE_CATALOG_TABLES: &[&str] = &[
    "geometry_columns",
    "geometry_columns_auth",
    "geometry_columns_statistics",
    "geometry_columns_field_infos",
    "geometry_columns_time",
];

/// Table name prefixes that belong to SpatiaLite/SQLite internals, not user layers.
const SPATIALITE_SYSTEM_PREFIXES: &[&str] = &[
    "sqlite_",
    "spatial_",
    "geometry_columns",
    "views_",
    "virts_",
];

/// Other SpatiaLite metadata tables, matched by exact (case-insensitive) name.
const SPATIALITE_SYSTEM_TABLES: &[&str] = &[
    "spatialite_history",
    "sql_statements_log",
    "spatialindex",
    "elementarygeometries",
    "knn",
    "knn2",
    "data_licenses",
    "raster_coverages",
    "raster_coverages_keyword",
    "raster_coverages_srid",
    "vector_coverages",
    "vector_coverages_keyword",
    "vector_coverages_srid",
    "wms_getcapabilities",
    "wms_getmap",
    "wms_ref_sys",
    "wms_settings",
    "topologies",
    "networks",
    "stored_procedures",
    "stored_variables",
    "rl2map_configurations",
    "se_external_graphics",
    "se_fonts",
    "se_group_styles",
    "se_raster_styled_layers",
    "se_raster_styles",
    "se_styled_group_refs",
    "se_styled_groups",
    "se_vector_styled_layers",
    "se_vector_styles",
    "iso_metadata",
    "iso_metadata_reference",
];

/// Shadow tables SQLite keeps next to an R*Tree virtual table.
const RTREE_SHADOW_SUFFIXES: &[&str] = &["_node", "_parent", "_rowid"];

/// Spatial SQL functions referenced by GeoPackage/SpatiaLite triggers.
const SPATIAL_TRIGGER_FUNCTIONS: &[&str] = &[
    "ST_IsEmpty",
    "ST_MinX",
    "ST_MaxX",
    "ST_MinY",
    "ST_MaxY",
    "ST_GeometryType",
    "ST_SRID",
    "GPKG_IsAssignable",
    "GeometryConstraints",
    "RTreeAlign",
    "UpdateLayerStatistics",
    "GeometryType",
    "Srid",
    "IsValid",
    "MbrMinX",
    "MbrMaxX",
    "MbrMinY",
    "MbrMaxY",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flavor {
    GeoPackage,
    SpatiaLite,
}

/// Open SQLite container.
pub struct SqliteStore {
    conn: Connection,
    path: PathBuf,
    flavor: Flavor,
    in_tx: bool,
}

/// Quote an identifier for SQL text (`"a""b"`).
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

impl SqliteStore {
    /// Open read-only for discovery.
    pub fn open_read(path: &Path, format: VectorFormat) -> Result<Self> {
        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        Self::open_with(path, format, flags)
    }

    /// Open read-write for renaming. Never creates a missing file.
    pub fn open_write(path: &Path, format: VectorFormat) -> Result<Self> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let store = Self::open_with(path, format, flags)?;
        store.register_trigger_functions()?;
        Ok(store)
    }

    fn open_with(path: &Path, format: VectorFormat, flags: OpenFlags) -> Result<Self> {
        let flavor = match format {
            VectorFormat::GeoPackage => Flavor::GeoPackage,
            VectorFormat::SpatiaLite => Flavor::SpatiaLite,
            other => {
                return Err(LayerRenameError::container_read(
                    path,
                    format!("{other} is not an SQLite format"),
                ));
            }
        };
        let conn = Connection::open_with_flags(path, flags)
            .map_err(|e| LayerRenameError::container_read(path, e))?;
        // Forces the header read so non-database files fail here, not mid-plan.
        conn.query_row("SELECT count(*) FROM sqlite_master", [], |r| r.get::<_, i64>(0))
            .map_err(|e| LayerRenameError::container_read(path, e))?;
        let store = Self {
            conn,
            path: path.to_path_buf(),
            flavor,
            in_tx: false,
        };
        if flavor == Flavor::GeoPackage && !store.table_exists("gpkg_contents")? {
            return Err(LayerRenameError::container_read(
                path,
                "missing gpkg_contents; not a GeoPackage",
            ));
        }
        Ok(store)
    }

    fn register_trigger_functions(&self) -> Result<()> {
        for name in SPATIAL_TRIGGER_FUNCTIONS {
            self.conn
                .create_scalar_function(
                    *name,
                    -1,
                    FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
                    |_ctx| Ok(Value::Null),
                )
                .map_err(|e| LayerRenameError::container_read(&self.path, e))?;
        }
        Ok(())
    }

    fn table_exists(&self, name: &str) -> Result<bool> {
        let n: i64 = self
            .conn
            .query_row(
                "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = ?1 COLLATE NOCASE",
                params![name],
                |r| r.get(0),
            )
            .map_err(|e| LayerRenameError::container_read(&self.path, e))?;
        Ok(n > 0)
    }

    fn query_names(&self, sql: &str) -> rusqlite::Result<Vec<String>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map([], |r| r.get::<_, String>(0))?;
        rows.collect()
    }

    fn rename_err(&self, old: &str, new: &str, e: impl ToString) -> LayerRenameError {
        LayerRenameError::rename(&self.path, old, new, e)
    }

    fn exec(&self, old: &str, new: &str, sql: &str, args: impl rusqlite::Params) -> Result<usize> {
        trace!(sql, "sqlite exec");
        self.conn
            .execute(sql, args)
            .map_err(|e| self.rename_err(old, new, e))
    }

    fn rename_geopackage_catalog(&self, old: &str, new: &str) -> Result<()> {
        self.exec(
            old,
            new,
            "UPDATE gpkg_contents SET table_name = ?1, \
             identifier = CASE WHEN identifier = ?2 THEN ?1 ELSE identifier END \
             WHERE table_name = ?2",
            params![new, old],
        )?;
        for table in GPKG_CATALOG_TABLES {
            if !self.table_exists(table)? {
                continue;
            }
            let sql = format!("UPDATE {table} SET table_name = ?1 WHERE table_name = ?2");
            let n = self.exec(old, new, &sql, params![new, old])?;
            if n > 0 {
                debug!(table, rows = n, "updated catalog rows");
            }
        }
        if !self.table_exists("gpkg_geometry_columns")? {
            return Ok(());
        }
        let columns = self.geometry_columns(
            "SELECT column_name FROM gpkg_geometry_columns WHERE table_name = ?1",
            new,
            old,
            new,
        )?;
        // GeoPackage spatial indexes are `rtree_<table>_<column>`.
        self.rename_spatial_indexes("rtree_", old, new, &columns)
    }

    /// Geometry columns registered for `table` in a catalog.
    fn geometry_columns(&self, sql: &str, table: &str, old: &str, new: &str) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(sql).map_err(|e| self.rename_err(old, new, e))?;
        let rows = stmt
            .query_map(params![table], |r| r.get::<_, String>(0))
            .map_err(|e| self.rename_err(old, new, e))?;
        rows.collect::<rusqlite::Result<_>>()
            .map_err(|e| self.rename_err(old, new, e))
    }

    /// Rename `<prefix><old>_<column>` spatial index tables to follow the layer.
    ///
    /// A real R*Tree moves its shadow tables itself; shadows still found under
    /// the old name afterwards are moved explicitly.
    fn rename_spatial_indexes(&self, prefix: &str, old: &str, new: &str, columns: &[String]) -> Result<()> {
        for column in columns {
            let from = format!("{prefix}{old}_{column}");
            let to = format!("{prefix}{new}_{column}");
            let tables = std::iter::once((from.clone(), to.clone())).chain(
                RTREE_SHADOW_SUFFIXES
                    .iter()
                    .map(|s| (format!("{from}{s}"), format!("{to}{s}"))),
            );
            for (from, to) in tables {
                if !self.table_exists(&from)? {
                    continue;
                }
                let sql = format!("ALTER TABLE {} RENAME TO {}", quote_ident(&from), quote_ident(&to));
                self.exec(old, new, &sql, [])?;
                debug!(from, to, "renamed spatial index");
            }
        }
        Ok(())
    }

    fn rename_spatialite_catalog(&self, old: &str, new: &str) -> Result<()> {
        // SpatiaLite stores catalog names lowercased and enforces it with triggers.
        for table in SPATIALITE_CATALOG_TABLES {
            if !self.table_exists(table)? {
                continue;
            }
            let sql = format!(
                "UPDATE {table} SET f_table_name = lower(?1) WHERE lower(f_table_name) = lower(?2)"
            );
            self.exec(old, new, &sql, params![new, old])?;
        }
        if !self.table_exists("geometry_columns")? {
            return Ok(());
        }
        let columns = self.geometry_columns(
            "SELECT f_geometry_column FROM geometry_columns WHERE f_table_name = lower(?1)",
            new,
            old,
            new,
        )?;
        self.rename_spatial_indexes("idx_", old, new, &columns)
    }

    /// User tables of a SpatiaLite database in creation order.
    ///
    /// Metadata tables and the `idx_<table>_<column>` spatial indexes (with
    /// their R*Tree shadows) of registered geometry columns are left out.
    fn spatialite_layers(&self) -> rusqlite::Result<Vec<String>> {
        let all = self.query_names("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY rowid")?;
        let mut indexes: Vec<String> = Vec::new();
        if all.iter().any(|n| n.eq_ignore_ascii_case("geometry_columns")) {
            let mut stmt = self
                .conn
                .prepare("SELECT f_table_name, f_geometry_column FROM geometry_columns")?;
            let pairs = stmt.query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?)))?;
            for pair in pairs {
                let (table, column) = pair?;
                let base = format!("idx_{table}_{column}").to_ascii_lowercase();
                indexes.extend(RTREE_SHADOW_SUFFIXES.iter().map(|s| format!("{base}{s}")));
                indexes.push(base);
            }
        }
        Ok(all
            .into_iter()
            .filter(|n| {
                let lower = n.to_ascii_lowercase();
                !SPATIALITE_SYSTEM_PREFIXES.iter().any(|p| lower.starts_with(p))
                    && !SPATIALITE_SYSTEM_TABLES.contains(&lower.as_str())
                    && !indexes.contains(&lower)
            })
            .collect())
    }
}

impl SqlLayerStore for SqliteStore {
    fn list_layers(&self) -> Result<Vec<String>> {
        let names = match self.flavor {
            Flavor::GeoPackage => self.query_names(
                "SELECT table_name FROM gpkg_contents \
                 WHERE data_type IN ('features', 'tiles', 'attributes') ORDER BY rowid",
            ),
            Flavor::SpatiaLite => self.spatialite_layers(),
        };
        names.map_err(|e| LayerRenameError::container_read(&self.path, e))
    }

    fn begin(&mut self) -> Result<()> {
        self.conn
            .execute_batch("BEGIN IMMEDIATE; PRAGMA defer_foreign_keys = ON;")
            .map_err(|e| LayerRenameError::rename(&self.path, "", "", format!("begin transaction: {e}")))?;
        self.in_tx = true;
        Ok(())
    }

    fn rename_layer(&mut self, old: &str, new: &str) -> Result<()> {
        let sql = format!("ALTER TABLE {} RENAME TO {}", quote_ident(old), quote_ident(new));
        self.exec(old, new, &sql, [])?;
        match self.flavor {
            Flavor::GeoPackage => self.rename_geopackage_catalog(old, new)?,
            Flavor::SpatiaLite => self.rename_spatialite_catalog(old, new)?,
        }
        debug!(container = %self.path.display(), old, new, "renamed table");
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.conn
            .execute_batch("COMMIT")
            .map_err(|e| LayerRenameError::rename(&self.path, "", "", format!("commit: {e}")))?;
        self.in_tx = false;
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        if !self.in_tx {
            return Ok(());
        }
        let res = self.conn.execute_batch("ROLLBACK");
        self.in_tx = false;
        res.map_err(|e| LayerRenameError::rename(&self.path, "", "", format!("rollback: {e}")))
    }
}

impl Drop for SqliteStore {
    fn drop(&mut self) {
        // Never leave a half-applied container behind on an early return.
        if self.in_tx {
            let _ = self.conn.execute_batch("ROLLBACK");
        }
    }
}
