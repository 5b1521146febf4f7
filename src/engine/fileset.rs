//! Staged apply for file-set containers.
//!
//! Every component first moves to a hidden temporary name, the staging is
//! verified, then each component moves to its final name. Completed moves are
//! journaled so a failure can walk them back in reverse.

use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, error, warn};

use crate::backend::{FileSetOps, component_target};
use crate::fs_ops::util::unique_temp_path;
use crate::model::Container;
use crate::plan::PlanEntry;

#[derive(Debug)]
pub(crate) enum FileSetOutcome {
    Applied,
    /// All completed moves were undone.
    Reverted(String),
    /// Undo failed for at least one move; files may be split across names.
    PartiallyFailed { cause: String, undo: String },
}

/// One component's journey.
#[derive(Debug)]
struct Move {
    original: PathBuf,
    staged: PathBuf,
    target: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Pending,
    Staged,
    Final,
}

/// Final paths of every component, or a reason the entry cannot be mapped.
pub(crate) fn targets(
    ops: &dyn FileSetOps,
    container: &Container,
    entry: &PlanEntry,
) -> Result<Vec<(PathBuf, PathBuf)>, String> {
    let components = ops
        .component_paths(container)
        .map_err(|e| format!("list components: {e}"))?;
    components
        .into_iter()
        .map(|c| {
            let t = component_target(&c, &entry.original, &entry.final_name).ok_or_else(|| {
                format!("component {} does not carry the layer name", c.display())
            })?;
            Ok((c, t))
        })
        .collect()
}

/// First target that is occupied by something other than this container's own
/// files (a case-only rename on a case-insensitive filesystem sees itself).
pub(crate) fn blocked_target(ops: &dyn FileSetOps, pairs: &[(PathBuf, PathBuf)]) -> Option<PathBuf> {
    let own = |p: &Path| {
        let lower = p.to_string_lossy().to_lowercase();
        pairs
            .iter()
            .any(|(c, _)| c.to_string_lossy().to_lowercase() == lower)
    };
    pairs
        .iter()
        .map(|(_, t)| t)
        .find(|t| ops.exists(t) && !own(t))
        .cloned()
}

fn undo(ops: &dyn FileSetOps, moves: &[Move], stages: &[Stage]) -> Result<(), String> {
    let mut failures = Vec::new();
    for (m, stage) in moves.iter().zip(stages).rev() {
        if *stage == Stage::Final {
            if let Err(e) = ops.rename_path(&m.target, &m.staged) {
                failures.push(e.to_string());
                continue;
            }
        }
        if *stage != Stage::Pending {
            if let Err(e) = ops.rename_path(&m.staged, &m.original) {
                failures.push(e.to_string());
            }
        }
    }
    if failures.is_empty() {
        Ok(())
    } else {
        Err(failures.join("; "))
    }
}

fn fail(ops: &dyn FileSetOps, moves: &[Move], stages: &[Stage], cause: String) -> FileSetOutcome {
    match undo(ops, moves, stages) {
        Ok(()) => {
            warn!(error = %cause, "file-set rename reverted");
            FileSetOutcome::Reverted(cause)
        }
        Err(undo) => {
            error!(error = %cause, undo_error = %undo, "file-set rename could not be reverted");
            FileSetOutcome::PartiallyFailed { cause, undo }
        }
    }
}

/// Rename every component of `container` from `entry.original` to `entry.final_name`.
pub(crate) fn apply(ops: &dyn FileSetOps, container: &Container, entry: &PlanEntry) -> FileSetOutcome {
    let pairs = match targets(ops, container, entry) {
        Ok(p) => p,
        Err(reason) => return FileSetOutcome::Reverted(reason),
    };
    let dir = container.parent_dir();
    let moves: Vec<Move> = pairs
        .into_iter()
        .map(|(original, target)| Move {
            original,
            staged: unique_temp_path(dir, "stage"),
            target,
        })
        .collect();
    let mut stages = vec![Stage::Pending; moves.len()];

    for (i, m) in moves.iter().enumerate() {
        if let Err(e) = ops.rename_path(&m.original, &m.staged) {
            return fail(ops, &moves, &stages, format!("stage: {e}"));
        }
        stages[i] = Stage::Staged;
    }

    if let Some(m) = moves
        .iter()
        .find(|m| !ops.exists(&m.staged) || ops.exists(&m.original))
    {
        let cause = format!("staging of {} could not be verified", m.original.display());
        return fail(ops, &moves, &stages, cause);
    }

    for (i, m) in moves.iter().enumerate() {
        if let Err(e) = ops.rename_path(&m.staged, &m.target) {
            let cause = if e.kind() == io::ErrorKind::AlreadyExists {
                format!("target exists: {}", m.target.display())
            } else {
                e.to_string()
            };
            return fail(ops, &moves, &stages, cause);
        }
        stages[i] = Stage::Final;
    }
    debug!(
        container = %container.path.display(),
        from = %entry.original,
        to = %entry.final_name,
        components = moves.len(),
        "file set renamed"
    );
    FileSetOutcome::Applied
}
