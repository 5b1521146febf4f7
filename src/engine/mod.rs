//! Plan execution.
//!
//! Containers are grouped by where their names physically live (the database
//! file, or the directory of a file set). Groups are independent and may run
//! in parallel; containers inside a group run one after another in plan order.
//! Every container is isolated: a failure is recorded and the next one runs.
//!
//! Per container:
//! 1. skip if read-only, cancelled, or nothing changes
//! 2. back up (when enabled); a failed backup leaves the container alone
//! 3. apply (SQL transaction or staged file moves)
//! 4. keep or discard the backup according to the outcome

mod fileset;
pub mod lock;
mod sql;

use std::collections::HashMap;
use std::path::PathBuf;

use rayon::prelude::*;
use tracing::{error, info, warn};

use crate::backend::{self, FileSetOps, RealFileSet};
use crate::backup::{self, BackupOptions, BackupRecord};
use crate::errors::{LayerRenameError, Result};
use crate::model::{BackendKind, Container};
use crate::plan::{PlanEntry, RenamePlan, storage_key};
use crate::report::{
    BackupStatus, ContainerOutcome, ContainerReport, EntryReport, EntryResult, RunReport,
    SKIP_CANCELLED, SKIP_READ_ONLY, SKIP_UNCHANGED,
};
use crate::shutdown;

use fileset::FileSetOutcome;
use sql::SqlOutcome;

pub use lock::RunLock;

/// Execution settings.
#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    /// Snapshot each container before mutating it.
    pub backup: bool,
    pub backup_location: BackupOptions,
    /// Keep backups even when a container rolled back cleanly.
    pub keep_backups: bool,
    /// Parallel container groups; 1 runs everything on the calling thread.
    pub jobs: usize,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            backup: true,
            backup_location: BackupOptions::default(),
            keep_backups: false,
            jobs: 1,
        }
    }
}

pub struct Engine {
    options: ExecuteOptions,
    files: Box<dyn FileSetOps>,
}

/// Result of one attempt at a container.
enum Attempt {
    Done(ContainerReport),
    /// A target is occupied; try again after the rest of the group.
    Deferred(PathBuf),
}

fn entry_reports(entries: &[&PlanEntry], result_for: impl Fn(&PlanEntry) -> EntryResult) -> Vec<EntryReport> {
    entries
        .iter()
        .map(|e| EntryReport {
            original: e.original.clone(),
            final_name: e.final_name.clone(),
            result: result_for(e),
        })
        .collect()
}

/// Changed entries get `changed`; unchanged ones are skipped as unchanged.
fn uniform(entries: &[&PlanEntry], changed: EntryResult) -> Vec<EntryReport> {
    entry_reports(entries, |e| {
        if e.is_change() {
            changed.clone()
        } else {
            EntryResult::skipped(SKIP_UNCHANGED)
        }
    })
}

impl Engine {
    pub fn new(options: ExecuteOptions) -> Self {
        Self::with_file_ops(options, Box::new(RealFileSet))
    }

    /// Engine over a custom filesystem implementation for file sets.
    pub fn with_file_ops(options: ExecuteOptions, files: Box<dyn FileSetOps>) -> Self {
        Self { options, files }
    }

    /// Apply `plan`. Never fails as a whole: per-container problems end up in the report.
    pub fn execute(&self, plan: &RenamePlan) -> Result<RunReport> {
        let groups = group_containers(plan);
        info!(containers = plan.containers().len(), groups = groups.len(), jobs = self.options.jobs, "executing plan");

        let mut reports: Vec<(usize, ContainerReport)> = if self.options.jobs > 1 && groups.len() > 1 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.options.jobs)
                .build()
                .map_err(|e| LayerRenameError::InvalidOperation(format!("cannot start worker pool: {e}")))?;
            pool.install(|| {
                groups
                    .par_iter()
                    .map(|g| self.run_group(plan, g))
                    .collect::<Vec<_>>()
                    .into_iter()
                    .flatten()
                    .collect()
            })
        } else {
            groups.iter().flat_map(|g| self.run_group(plan, g)).collect()
        };
        reports.sort_by_key(|(idx, _)| *idx);

        let report = RunReport {
            containers: reports.into_iter().map(|(_, r)| r).collect(),
            unreadable: plan
                .skipped()
                .iter()
                .map(|s| (s.path.clone(), s.error.to_string()))
                .collect(),
            cancelled: shutdown::is_requested(),
        };
        let c = report.counts();
        info!(
            processed = c.containers_processed,
            renamed = c.layers_renamed,
            skipped = c.skipped,
            failed = c.failed,
            cancelled = report.cancelled,
            "execution finished"
        );
        Ok(report)
    }

    fn run_group(&self, plan: &RenamePlan, group: &[usize]) -> Vec<(usize, ContainerReport)> {
        let mut done = Vec::with_capacity(group.len());
        let mut pending: Vec<usize> = group.to_vec();
        // A deferred container waits for another one to vacate its target, so
        // keep passing over the group while anything completes. Chains such as
        // a -> ax -> axx resolve back to front.
        while !pending.is_empty() {
            let before = pending.len();
            let mut deferred = Vec::new();
            for idx in pending {
                match self.run_container(plan, idx, true) {
                    Attempt::Done(r) => done.push((idx, r)),
                    Attempt::Deferred(target) => {
                        info!(container = %plan.containers()[idx].path.display(), target = %target.display(), "target occupied; deferring");
                        deferred.push(idx);
                    }
                }
            }
            if deferred.len() == before {
                // No progress: the targets are held by files nothing will move.
                for idx in deferred {
                    if let Attempt::Done(r) = self.run_container(plan, idx, false) {
                        done.push((idx, r));
                    }
                }
                break;
            }
            pending = deferred;
        }
        done
    }

    fn run_container(&self, plan: &RenamePlan, idx: usize, allow_defer: bool) -> Attempt {
        let container = &plan.containers()[idx];
        let entries: Vec<&PlanEntry> = plan.entries_for(idx).collect();
        let changed: Vec<&PlanEntry> = entries.iter().copied().filter(|e| e.is_change()).collect();
        let report = |outcome, entries: Vec<EntryReport>, backup| ContainerReport {
            container: container.path.clone(),
            kind: container.kind(),
            outcome,
            entries,
            backup,
        };

        if shutdown::is_requested() {
            let all = entry_reports(&entries, |_| EntryResult::skipped(SKIP_CANCELLED));
            return Attempt::Done(report(ContainerOutcome::Skipped, all, BackupStatus::NotTaken));
        }
        if changed.is_empty() {
            let all = uniform(&entries, EntryResult::skipped(SKIP_UNCHANGED));
            return Attempt::Done(report(ContainerOutcome::Skipped, all, BackupStatus::NotTaken));
        }
        if !container.is_writable() {
            warn!(container = %container.path.display(), "read-only; skipping");
            let all = uniform(&entries, EntryResult::skipped(SKIP_READ_ONLY));
            return Attempt::Done(report(ContainerOutcome::Skipped, all, BackupStatus::NotTaken));
        }

        if container.kind() == BackendKind::FileSetSingleLayer && allow_defer {
            let blocked = changed.iter().find_map(|e| {
                let pairs = fileset::targets(self.files.as_ref(), container, e).ok()?;
                fileset::blocked_target(self.files.as_ref(), &pairs)
            });
            if let Some(target) = blocked {
                return Attempt::Deferred(target);
            }
        }

        let record = if self.options.backup {
            match backup::backup(container, self.files.as_ref(), &self.options.backup_location) {
                Ok(r) => Some(r),
                Err(e) => {
                    error!(container = %container.path.display(), code = e.code(), error = %e, "backup failed; container left untouched");
                    let reason = format!("backup failed: {e}");
                    let all = uniform(&entries, EntryResult::Skipped(reason));
                    return Attempt::Done(report(ContainerOutcome::Skipped, all, BackupStatus::Failed(e.to_string())));
                }
            }
        } else {
            None
        };

        let (outcome, entry_results) = match container.kind() {
            BackendKind::SqlMultiLayer => self.apply_sql(container, &entries, &changed),
            BackendKind::FileSetSingleLayer => self.apply_file_set(container, &entries, &changed),
        };
        let backup_status = self.settle_backup(record, outcome);
        info!(container = %container.path.display(), outcome = outcome.as_str(), "container done");
        Attempt::Done(report(outcome, entry_results, backup_status))
    }

    fn apply_sql(
        &self,
        container: &Container,
        entries: &[&PlanEntry],
        changed: &[&PlanEntry],
    ) -> (ContainerOutcome, Vec<EntryReport>) {
        let mut store = match backend::open_sql_store(container) {
            Ok(s) => s,
            Err(e) => {
                warn!(container = %container.path.display(), error = %e, "cannot open for writing");
                return (ContainerOutcome::Failed, uniform(entries, EntryResult::Failed(e.to_string())));
            }
        };
        match sql::apply(store.as_mut(), changed, entries) {
            SqlOutcome::Committed => (ContainerOutcome::Applied, uniform(entries, EntryResult::Applied)),
            SqlOutcome::RolledBack(cause) => (
                ContainerOutcome::Failed,
                uniform(entries, EntryResult::Failed(cause.to_string())),
            ),
            SqlOutcome::RollbackFailed { cause, rollback } => (
                ContainerOutcome::PartiallyFailed,
                uniform(entries, EntryResult::Failed(format!("{cause}; rollback failed: {rollback}"))),
            ),
        }
    }

    fn apply_file_set(
        &self,
        container: &Container,
        entries: &[&PlanEntry],
        changed: &[&PlanEntry],
    ) -> (ContainerOutcome, Vec<EntryReport>) {
        // A file set has exactly one layer, so `changed` has at most one entry.
        let mut results: HashMap<usize, EntryResult> = HashMap::new();
        let mut partial = false;
        for e in changed {
            let result = match fileset::apply(self.files.as_ref(), container, e) {
                FileSetOutcome::Applied => EntryResult::Applied,
                FileSetOutcome::Reverted(cause) => EntryResult::Failed(cause),
                FileSetOutcome::PartiallyFailed { cause, undo } => {
                    partial = true;
                    EntryResult::Failed(format!("{cause}; undo failed: {undo}"))
                }
            };
            results.insert(e.ordinal, result);
        }
        let reports = entry_reports(entries, |e| {
            results
                .get(&e.ordinal)
                .cloned()
                .unwrap_or_else(|| EntryResult::skipped(SKIP_UNCHANGED))
        });
        let outcome = if partial {
            ContainerOutcome::PartiallyFailed
        } else {
            ContainerOutcome::from_entries(&reports)
        };
        (outcome, reports)
    }

    fn settle_backup(&self, record: Option<BackupRecord>, outcome: ContainerOutcome) -> BackupStatus {
        let Some(record) = record else {
            return BackupStatus::NotTaken;
        };
        if outcome == ContainerOutcome::Failed && !self.options.keep_backups {
            return match backup::discard(&record) {
                Ok(()) => BackupStatus::Discarded,
                Err(e) => {
                    warn!(error = %e, "backup kept because it could not be removed");
                    BackupStatus::Kept(record.location)
                }
            };
        }
        BackupStatus::Kept(record.location)
    }
}

/// Container indices grouped by storage location, groups ordered by first
/// appearance, members in plan order.
fn group_containers(plan: &RenamePlan) -> Vec<Vec<usize>> {
    let mut order: Vec<Vec<usize>> = Vec::new();
    let mut index: HashMap<PathBuf, usize> = HashMap::new();
    for (i, c) in plan.containers().iter().enumerate() {
        let key = storage_key(c);
        let slot = *index.entry(key).or_insert_with(|| {
            order.push(Vec::new());
            order.len() - 1
        });
        order[slot].push(i);
    }
    order
}
