//! Rename planning: discovery + transform + sanitize + de-duplicate.
//!
//! A [`RenamePlan`] is built once, never mutated, and is the only thing the
//! preview and the execution engine look at. Building a plan never writes.

use std::fmt::{self, Write as _};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;
use tracing::{debug, info};

use crate::discovery::{self, Discovery, SkippedContainer};
use crate::errors::Result;
use crate::model::{BackendKind, Container, VectorFormat};
use crate::naming::{RenameOperation, Sanitizer, resolve_scoped};

/// Which layers must end up with distinct names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NamespaceScope {
    /// One namespace for the whole run.
    #[default]
    PerRun,
    /// One namespace per SQL container, and per directory for file sets.
    PerContainer,
}

impl NamespaceScope {
    pub fn as_str(self) -> &'static str {
        match self {
            NamespaceScope::PerRun => "per-run",
            NamespaceScope::PerContainer => "per-container",
        }
    }
}

impl fmt::Display for NamespaceScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NamespaceScope {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "per-run" | "run" => Ok(NamespaceScope::PerRun),
            "per-container" | "container" => Ok(NamespaceScope::PerContainer),
            other => Err(format!("invalid namespace scope: '{other}'")),
        }
    }
}

/// Where a container's names physically live: the database file for SQL
/// containers, the directory for file sets.
pub fn storage_key(container: &Container) -> PathBuf {
    match container.kind() {
        BackendKind::SqlMultiLayer => container.path.clone(),
        BackendKind::FileSetSingleLayer => container.parent_dir().to_path_buf(),
    }
}

/// Settings that shape a plan.
#[derive(Debug, Clone)]
pub struct PlanOptions {
    pub formats: Vec<VectorFormat>,
    pub scope: NamespaceScope,
    pub sanitizer: Sanitizer,
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self {
            formats: VectorFormat::ALL.to_vec(),
            scope: NamespaceScope::default(),
            sanitizer: Sanitizer::default(),
        }
    }
}

/// One discovered layer and the name it will get.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanEntry {
    /// Index into [`RenamePlan::containers`].
    pub container: usize,
    pub ordinal: usize,
    pub original: String,
    pub transformed: String,
    pub sanitized: String,
    pub final_name: String,
    pub conflict_resolved: bool,
}

impl PlanEntry {
    pub fn is_change(&self) -> bool {
        self.final_name != self.original
    }
}

#[derive(Debug)]
pub struct RenamePlan {
    operation: RenameOperation,
    containers: Vec<Container>,
    entries: Vec<PlanEntry>,
    skipped: Vec<SkippedContainer>,
}

impl RenamePlan {
    pub fn operation(&self) -> &RenameOperation {
        &self.operation
    }

    pub fn containers(&self) -> &[Container] {
        &self.containers
    }

    /// Entries in discovery order.
    pub fn entries(&self) -> &[PlanEntry] {
        &self.entries
    }

    /// Containers that could not be listed during discovery.
    pub fn skipped(&self) -> &[SkippedContainer] {
        &self.skipped
    }

    pub fn entries_for(&self, container: usize) -> impl Iterator<Item = &PlanEntry> {
        self.entries.iter().filter(move |e| e.container == container)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Counts describing a plan.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PlanSummary {
    pub total_entries: usize,
    pub changed_entries: usize,
    pub conflicts_resolved: usize,
    pub per_container_counts: Vec<(PathBuf, usize)>,
}

/// Discover containers under `root` and plan the rename of every layer.
pub fn build_plan(root: &Path, operation: &RenameOperation, options: &PlanOptions) -> Result<RenamePlan> {
    operation.validate()?;
    let found = discovery::discover(root, &options.formats)?;
    plan_from_discovery(found, operation, options)
}

/// Plan over an existing discovery result.
pub fn plan_from_discovery(
    found: Discovery,
    operation: &RenameOperation,
    options: &PlanOptions,
) -> Result<RenamePlan> {
    operation.validate()?;
    let Discovery {
        containers,
        layers,
        skipped,
    } = found;

    let mut staged = Vec::with_capacity(layers.len());
    let mut keyed = Vec::with_capacity(layers.len());
    for layer in &layers {
        let container = &containers[layer.container];
        let kind = container.kind();
        let transformed = operation.apply(&layer.name);
        let sanitized = options.sanitizer.sanitize(kind, &transformed);
        let key = match options.scope {
            NamespaceScope::PerRun => None,
            NamespaceScope::PerContainer => Some(storage_key(container)),
        };
        keyed.push((key, sanitized.clone(), options.sanitizer.max_len(kind)));
        staged.push((layer, transformed, sanitized));
    }

    let (resolved, spaces) = resolve_scoped(&keyed)?;
    debug!(namespaces = spaces.len(), "names resolved");

    let entries: Vec<PlanEntry> = staged
        .into_iter()
        .zip(resolved)
        .map(|((layer, transformed, sanitized), r)| PlanEntry {
            container: layer.container,
            ordinal: layer.ordinal,
            original: layer.name.clone(),
            transformed,
            sanitized,
            final_name: r.name,
            conflict_resolved: r.conflict_resolved,
        })
        .collect();

    let plan = RenamePlan {
        operation: operation.clone(),
        containers,
        entries,
        skipped,
    };
    let s = summarize(&plan);
    info!(
        operation = %plan.operation,
        scope = %options.scope,
        entries = s.total_entries,
        changed = s.changed_entries,
        conflicts = s.conflicts_resolved,
        "plan built"
    );
    Ok(plan)
}

pub fn summarize(plan: &RenamePlan) -> PlanSummary {
    let mut per_container_counts: Vec<(PathBuf, usize)> = plan
        .containers
        .iter()
        .map(|c| (c.path.clone(), 0))
        .collect();
    let mut s = PlanSummary::default();
    for e in &plan.entries {
        s.total_entries += 1;
        if e.is_change() {
            s.changed_entries += 1;
        }
        if e.conflict_resolved {
            s.conflicts_resolved += 1;
        }
        per_container_counts[e.container].1 += 1;
    }
    s.per_container_counts = per_container_counts;
    s
}

const COL_CONTAINER: usize = 40;
const COL_NAME: usize = 25;
const RULE_WIDTH: usize = COL_CONTAINER + 2 * COL_NAME + 6;

fn clip(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        return s.to_string();
    }
    let head: String = s.chars().take(width - 3).collect();
    format!("{head}...")
}

/// Text table of the pending changes (unchanged layers are omitted).
pub fn render_preview(plan: &RenamePlan) -> String {
    let summary = summarize(plan);
    let mut out = String::new();
    if summary.changed_entries == 0 {
        out.push_str("No layers need to be renamed.\n");
        return out;
    }
    let rule = "-".repeat(RULE_WIDTH);
    let _ = writeln!(out, "{}", "=".repeat(RULE_WIDTH));
    let _ = writeln!(out, "RENAME PLAN - Layer Name Changes");
    let _ = writeln!(out, "{}", "=".repeat(RULE_WIDTH));
    let _ = writeln!(
        out,
        "{:<COL_CONTAINER$} | {:<COL_NAME$} | {:<COL_NAME$}",
        "Container", "Original Name", "New Name"
    );
    let _ = writeln!(out, "{rule}");
    for e in plan.entries.iter().filter(|e| e.is_change()) {
        let container = plan.containers[e.container].display_name();
        let marker = if e.conflict_resolved { " *" } else { "" };
        let _ = writeln!(
            out,
            "{:<COL_CONTAINER$} | {:<COL_NAME$} | {}{marker}",
            clip(&container, COL_CONTAINER),
            clip(&e.original, COL_NAME),
            clip(&e.final_name, COL_NAME),
        );
    }
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "Total layers to rename: {}", summary.changed_entries);
    if summary.conflicts_resolved > 0 {
        let _ = writeln!(
            out,
            "Name conflicts auto-resolved with numeric suffixes (*): {}",
            summary.conflicts_resolved
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Layer, Mutability};

    fn discovery(layout: &[(&str, &[&str])]) -> Discovery {
        let mut d = Discovery::default();
        for (i, (path, layers)) in layout.iter().enumerate() {
            let format = VectorFormat::from_path(Path::new(path)).unwrap();
            d.containers.push(Container {
                path: PathBuf::from(path),
                format,
                mutability: Mutability::Writable,
            });
            for (ordinal, name) in layers.iter().enumerate() {
                d.layers.push(Layer {
                    container: i,
                    name: name.to_string(),
                    ordinal,
                });
            }
        }
        d
    }

    fn finals(plan: &RenamePlan) -> Vec<&str> {
        plan.entries().iter().map(|e| e.final_name.as_str()).collect()
    }

    #[test]
    fn replace_with_empty_strips_prefix() {
        let op = RenameOperation::Replace {
            find: "temp_".into(),
            replace: String::new(),
        };
        let plan = plan_from_discovery(
            discovery(&[("/d/a.gpkg", &["temp_counties", "temp_roads"])]),
            &op,
            &PlanOptions::default(),
        )
        .unwrap();
        assert_eq!(finals(&plan), ["counties", "roads"]);
    }

    #[test]
    fn conflicts_span_the_run_by_default() {
        let op = RenameOperation::Replace {
            find: "_v2".into(),
            replace: String::new(),
        };
        let d = discovery(&[
            ("/d/a.gpkg", &["roads_v2", "rivers"]),
            ("/d/b.gpkg", &["roads"]),
        ]);
        let plan = plan_from_discovery(d, &op, &PlanOptions::default()).unwrap();
        assert_eq!(finals(&plan), ["roads", "rivers", "roads_1"]);
        let s = summarize(&plan);
        assert_eq!(s.total_entries, 3);
        assert_eq!(s.conflicts_resolved, 1);
        assert_eq!(s.changed_entries, 2);
        assert_eq!(s.per_container_counts[1], (PathBuf::from("/d/b.gpkg"), 1));
    }

    #[test]
    fn per_container_scope_isolates_databases() {
        let d = discovery(&[("/d/a.gpkg", &["roads"]), ("/d/b.gpkg", &["roads"])]);
        let options = PlanOptions {
            scope: NamespaceScope::PerContainer,
            ..PlanOptions::default()
        };
        let plan = plan_from_discovery(d, &RenameOperation::Lowercase, &options).unwrap();
        assert_eq!(finals(&plan), ["roads", "roads"]);
    }

    #[test]
    fn file_sets_in_one_directory_share_a_namespace() {
        let d = discovery(&[("/d/Roads.shp", &["Roads"]), ("/d/roads.geojson", &["roads"])]);
        let options = PlanOptions {
            scope: NamespaceScope::PerContainer,
            ..PlanOptions::default()
        };
        let plan = plan_from_discovery(d, &RenameOperation::Lowercase, &options).unwrap();
        assert_eq!(finals(&plan), ["roads", "roads_1"]);
    }

    #[test]
    fn replanning_is_idempotent() {
        let layout: &[(&str, &[&str])] = &[("/d/a.gpkg", &["My Roads", "my-roads", "2020"])];
        let a = plan_from_discovery(discovery(layout), &RenameOperation::Clean, &PlanOptions::default())
            .unwrap();
        let b = plan_from_discovery(discovery(layout), &RenameOperation::Clean, &PlanOptions::default())
            .unwrap();
        assert_eq!(a.entries(), b.entries());
        assert_eq!(finals(&a), ["My_Roads", "my_roads_1", "layer_2020"]);
    }

    #[test]
    fn invalid_operation_rejected() {
        let op = RenameOperation::TrimBegin(0);
        let err = plan_from_discovery(Discovery::default(), &op, &PlanOptions::default()).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn preview_lists_changes_and_conflicts() {
        let d = discovery(&[("/d/a.gpkg", &["Roads", "roads", "keep"])]);
        let plan = plan_from_discovery(d, &RenameOperation::Lowercase, &PlanOptions::default()).unwrap();
        let text = render_preview(&plan);
        assert!(text.contains("Container"));
        assert!(text.contains("Original Name"));
        assert!(text.contains("New Name"));
        assert!(text.contains("Total layers to rename: 2"), "{text}");
        assert!(text.contains("auto-resolved"));
        assert!(!text.contains("keep "), "unchanged layers are not listed");
    }

    #[test]
    fn preview_of_no_changes() {
        let d = discovery(&[("/d/a.gpkg", &["roads"])]);
        let plan = plan_from_discovery(d, &RenameOperation::Lowercase, &PlanOptions::default()).unwrap();
        assert_eq!(render_preview(&plan), "No layers need to be renamed.\n");
    }

    #[test]
    fn scope_parses_config_spellings() {
        assert_eq!("per_container".parse::<NamespaceScope>().unwrap(), NamespaceScope::PerContainer);
        assert_eq!("PER-RUN".parse::<NamespaceScope>().unwrap(), NamespaceScope::PerRun);
        assert!("global".parse::<NamespaceScope>().is_err());
    }
}
