//! Containers, layers and the vector formats they come from.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// How a container stores its layers, which decides the apply strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// SQLite-backed database with many tables (GeoPackage, SpatiaLite).
    SqlMultiLayer,
    /// One layer spread over sibling files sharing a base name.
    FileSetSingleLayer,
}

impl BackendKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BackendKind::SqlMultiLayer => "sql-multi-layer",
            BackendKind::FileSetSingleLayer => "file-set-single-layer",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutability {
    Writable,
    ReadOnly,
}

/// Vector formats recognised during discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VectorFormat {
    GeoPackage,
    SpatiaLite,
    Shapefile,
    GeoJson,
    Kml,
    Gpx,
    Gml,
    MapInfo,
    FileGeodatabase,
}

impl VectorFormat {
    pub const ALL: [VectorFormat; 9] = [
        VectorFormat::GeoPackage,
        VectorFormat::SpatiaLite,
        VectorFormat::Shapefile,
        VectorFormat::GeoJson,
        VectorFormat::Kml,
        VectorFormat::Gpx,
        VectorFormat::Gml,
        VectorFormat::MapInfo,
        VectorFormat::FileGeodatabase,
    ];

    /// Lowercase extensions (without the dot) that identify a container of this format.
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            VectorFormat::GeoPackage => &["gpkg"],
            VectorFormat::SpatiaLite => &["sqlite", "db"],
            VectorFormat::Shapefile => &["shp"],
            VectorFormat::GeoJson => &["geojson", "json"],
            VectorFormat::Kml => &["kml", "kmz"],
            VectorFormat::Gpx => &["gpx"],
            VectorFormat::Gml => &["gml"],
            VectorFormat::MapInfo => &["tab", "mif"],
            VectorFormat::FileGeodatabase => &["gdb"],
        }
    }

    /// Sibling extensions that belong to the same layer as a file with `primary_ext`.
    ///
    /// Entries may contain a dot (`shp.xml`) for sidecars that stack on the
    /// primary extension. Single-file formats own only their primary file, so
    /// `roads.geojson` and `roads.json` stay separate layers.
    pub fn component_extensions(self, primary_ext: &str) -> &'static [&'static str] {
        match self {
            VectorFormat::Shapefile => &[
                "shp", "shx", "dbf", "prj", "cpg", "qix", "qpj", "sbn", "sbx", "fbn", "fbx",
                "ain", "aih", "atx", "ixs", "mxs", "fix", "shp.xml",
            ],
            VectorFormat::MapInfo if primary_ext == "mif" => &["mif", "mid"],
            VectorFormat::MapInfo => &["tab", "dat", "map", "id", "ind"],
            VectorFormat::Gml => &["gml", "gfs", "xsd"],
            VectorFormat::GeoJson if primary_ext == "json" => &["json"],
            VectorFormat::GeoJson => &["geojson"],
            VectorFormat::Kml if primary_ext == "kmz" => &["kmz"],
            VectorFormat::Kml => &["kml"],
            VectorFormat::Gpx => &["gpx"],
            VectorFormat::GeoPackage | VectorFormat::SpatiaLite | VectorFormat::FileGeodatabase => {
                &[]
            }
        }
    }

    pub fn backend(self) -> BackendKind {
        match self {
            VectorFormat::GeoPackage | VectorFormat::SpatiaLite => BackendKind::SqlMultiLayer,
            _ => BackendKind::FileSetSingleLayer,
        }
    }

    /// Whether containers of this format are directories rather than files.
    pub fn is_directory(self) -> bool {
        matches!(self, VectorFormat::FileGeodatabase)
    }

    pub fn from_path(path: &Path) -> Option<VectorFormat> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        VectorFormat::ALL
            .into_iter()
            .find(|f| f.extensions().contains(&ext.as_str()))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            VectorFormat::GeoPackage => "gpkg",
            VectorFormat::SpatiaLite => "spatialite",
            VectorFormat::Shapefile => "shapefile",
            VectorFormat::GeoJson => "geojson",
            VectorFormat::Kml => "kml",
            VectorFormat::Gpx => "gpx",
            VectorFormat::Gml => "gml",
            VectorFormat::MapInfo => "mapinfo",
            VectorFormat::FileGeodatabase => "gdb",
        }
    }
}

impl fmt::Display for VectorFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VectorFormat {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gpkg" | "geopackage" => Ok(VectorFormat::GeoPackage),
            "spatialite" | "sqlite" => Ok(VectorFormat::SpatiaLite),
            "shapefile" | "shp" => Ok(VectorFormat::Shapefile),
            "geojson" | "json" => Ok(VectorFormat::GeoJson),
            "kml" | "kmz" => Ok(VectorFormat::Kml),
            "gpx" => Ok(VectorFormat::Gpx),
            "gml" => Ok(VectorFormat::Gml),
            "mapinfo" | "tab" | "mif" => Ok(VectorFormat::MapInfo),
            "gdb" | "filegdb" => Ok(VectorFormat::FileGeodatabase),
            other => Err(format!("unknown vector format: '{other}'")),
        }
    }
}

/// Parse a comma separated list of formats (`gpkg,shapefile`).
pub fn parse_format_list(s: &str) -> Result<Vec<VectorFormat>, String> {
    let mut out = Vec::new();
    for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let f: VectorFormat = part.parse()?;
        if !out.contains(&f) {
            out.push(f);
        }
    }
    if out.is_empty() {
        return Err("format list is empty".into());
    }
    Ok(out)
}

/// A unit of storage holding one or more layers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    pub path: PathBuf,
    pub format: VectorFormat,
    pub mutability: Mutability,
}

impl Container {
    pub fn kind(&self) -> BackendKind {
        self.format.backend()
    }

    pub fn is_writable(&self) -> bool {
        self.mutability == Mutability::Writable
    }

    /// File name for display; falls back to the full path.
    pub fn display_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    /// Directory holding the container (file sets share this namespace).
    pub fn parent_dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }
}

/// A named unit inside a container. `container` indexes the discovery result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layer {
    pub container: usize,
    pub name: String,
    pub ordinal: usize,
}
