//! Transactional apply for SQL containers.
//!
//! All renames of one container run in a single transaction. When a target
//! name is currently held by another layer of the container (or the change is
//! case-only, which SQLite treats as a collision), every changed layer first
//! moves to a temporary name and then to its final name.

use std::collections::HashSet;

use tracing::{debug, error, warn};

use crate::backend::SqlLayerStore;
use crate::errors::LayerRenameError;
use crate::plan::PlanEntry;

/// How an SQL container ended.
#[derive(Debug)]
pub(crate) enum SqlOutcome {
    Committed,
    /// Nothing changed; the error that caused the rollback.
    RolledBack(LayerRenameError),
    /// The rollback itself failed; state unknown.
    RollbackFailed {
        cause: LayerRenameError,
        rollback: LayerRenameError,
    },
}

fn needs_hops(changed: &[&PlanEntry], current: &HashSet<String>) -> bool {
    changed
        .iter()
        .any(|e| current.contains(&e.final_name.to_lowercase()))
}

fn temp_name(ordinal: usize, taken: &HashSet<String>) -> String {
    let base = format!("_lrtmp_{}_{ordinal}", std::process::id());
    let mut name = base.clone();
    let mut k = 1;
    while taken.contains(&name.to_lowercase()) {
        name = format!("{base}_{k}");
        k += 1;
    }
    name
}

/// The ordered `(from, to)` renames that move `changed` to their final names.
pub(crate) fn rename_steps(changed: &[&PlanEntry], all: &[&PlanEntry]) -> Vec<(String, String)> {
    let current: HashSet<String> = all.iter().map(|e| e.original.to_lowercase()).collect();
    if !needs_hops(changed, &current) {
        return changed
            .iter()
            .map(|e| (e.original.clone(), e.final_name.clone()))
            .collect();
    }
    let mut taken = current;
    taken.extend(changed.iter().map(|e| e.final_name.to_lowercase()));
    let temps: Vec<String> = changed
        .iter()
        .map(|e| {
            let t = temp_name(e.ordinal, &taken);
            taken.insert(t.to_lowercase());
            t
        })
        .collect();
    let mut steps = Vec::with_capacity(changed.len() * 2);
    for (e, t) in changed.iter().zip(&temps) {
        steps.push((e.original.clone(), t.clone()));
    }
    for (e, t) in changed.iter().zip(&temps) {
        steps.push((t.clone(), e.final_name.clone()));
    }
    steps
}

fn run_steps(store: &mut dyn SqlLayerStore, steps: &[(String, String)]) -> Result<(), LayerRenameError> {
    store.begin()?;
    for (from, to) in steps {
        store.rename_layer(from, to)?;
    }
    store.commit()
}

/// Apply `changed` inside one transaction; `all` holds every entry of the container.
pub(crate) fn apply(store: &mut dyn SqlLayerStore, changed: &[&PlanEntry], all: &[&PlanEntry]) -> SqlOutcome {
    let steps = rename_steps(changed, all);
    debug!(steps = steps.len(), hops = steps.len() > changed.len(), "applying sql renames");
    match run_steps(store, &steps) {
        Ok(()) => SqlOutcome::Committed,
        Err(cause) => match store.rollback() {
            Ok(()) => {
                warn!(error = %cause, "rename failed; transaction rolled back");
                SqlOutcome::RolledBack(cause)
            }
            Err(rollback) => {
                error!(error = %cause, rollback_error = %rollback, "rename failed and rollback failed");
                SqlOutcome::RollbackFailed { cause, rollback }
            }
        },
    }
}
