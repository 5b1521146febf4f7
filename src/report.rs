//! Run results and the end-of-run summary.

use std::fmt::Write as _;
use std::path::PathBuf;

use crate::model::BackendKind;
use crate::output::outcome_label;

/// Reasons attached to skipped entries.
pub const SKIP_UNCHANGED: &str = "unchanged";
pub const SKIP_READ_ONLY: &str = "read-only";
pub const SKIP_CANCELLED: &str = "cancelled";

/// Terminal state of one plan entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryResult {
    Applied,
    Skipped(String),
    Failed(String),
}

impl EntryResult {
    pub fn skipped(reason: &str) -> Self {
        EntryResult::Skipped(reason.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryReport {
    pub original: String,
    pub final_name: String,
    pub result: EntryResult,
}

/// Overall state of one container after execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerOutcome {
    /// Every changed entry applied.
    Applied,
    /// Nothing attempted (unchanged, read-only, cancelled, backup failed).
    Skipped,
    /// Nothing applied; the container is as it was.
    Failed,
    /// A rollback failed; the container may be inconsistent.
    PartiallyFailed,
}

impl ContainerOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            ContainerOutcome::Applied => "applied",
            ContainerOutcome::Skipped => "skipped",
            ContainerOutcome::Failed => "failed",
            ContainerOutcome::PartiallyFailed => "partially-failed",
        }
    }

    /// Outcome implied by entry results when no rollback failed.
    pub fn from_entries(entries: &[EntryReport]) -> Self {
        if entries.iter().any(|e| matches!(e.result, EntryResult::Failed(_))) {
            ContainerOutcome::Failed
        } else if entries.iter().any(|e| e.result == EntryResult::Applied) {
            ContainerOutcome::Applied
        } else {
            ContainerOutcome::Skipped
        }
    }
}

/// What happened to a container's backup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackupStatus {
    /// Backups disabled, or nothing to change.
    NotTaken,
    /// Snapshot retained; restoring it brings back the pre-run state.
    Kept(PathBuf),
    /// Rolled back cleanly, snapshot removed.
    Discarded,
    /// Snapshot could not be taken; the container was left alone.
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct ContainerReport {
    pub container: PathBuf,
    pub kind: BackendKind,
    pub outcome: ContainerOutcome,
    pub entries: Vec<EntryReport>,
    pub backup: BackupStatus,
}

impl ContainerReport {
    pub fn applied_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.result == EntryResult::Applied)
            .count()
    }

    fn was_cancelled(&self) -> bool {
        !self.entries.is_empty()
            && self
                .entries
                .iter()
                .all(|e| e.result == EntryResult::skipped(SKIP_CANCELLED))
    }
}

/// Aggregate counts for the summary line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunCounts {
    pub containers_processed: usize,
    pub layers_renamed: usize,
    pub skipped: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// Plan order.
    pub containers: Vec<ContainerReport>,
    /// Containers discovery could not read, with the reason.
    pub unreadable: Vec<(PathBuf, String)>,
    pub cancelled: bool,
}

impl RunReport {
    pub fn counts(&self) -> RunCounts {
        let mut c = RunCounts::default();
        for report in &self.containers {
            if !report.was_cancelled() {
                c.containers_processed += 1;
            }
            for e in &report.entries {
                match e.result {
                    EntryResult::Applied => c.layers_renamed += 1,
                    EntryResult::Skipped(_) => c.skipped += 1,
                    EntryResult::Failed(_) => c.failed += 1,
                }
            }
        }
        c
    }

    /// Backups of containers with at least one applied entry.
    pub fn backup_locations(&self) -> Vec<&PathBuf> {
        self.containers
            .iter()
            .filter(|r| r.applied_count() > 0)
            .filter_map(|r| match &r.backup {
                BackupStatus::Kept(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    /// Any container failed, or was left alone because its backup failed.
    pub fn has_failures(&self) -> bool {
        self.containers.iter().any(|r| {
            matches!(
                r.outcome,
                ContainerOutcome::Failed | ContainerOutcome::PartiallyFailed
            ) || matches!(r.backup, BackupStatus::Failed(_))
        })
    }
}

/// Multi-line summary printed after an applying run.
pub fn render_summary(report: &RunReport) -> String {
    let mut out = String::new();
    for r in &report.containers {
        if r.outcome == ContainerOutcome::Skipped && r.applied_count() == 0 && r.backup == BackupStatus::NotTaken
        {
            continue;
        }
        let _ = writeln!(out, "{} [{}]", r.container.display(), outcome_label(r.outcome));
        for e in &r.entries {
            match &e.result {
                EntryResult::Applied => {
                    let _ = writeln!(out, "  {} -> {}", e.original, e.final_name);
                }
                EntryResult::Failed(reason) => {
                    let _ = writeln!(out, "  {} -> {} FAILED: {reason}", e.original, e.final_name);
                }
                EntryResult::Skipped(_) => {}
            }
        }
        match (&r.backup, r.outcome) {
            (BackupStatus::Kept(p), ContainerOutcome::PartiallyFailed) => {
                let _ = writeln!(out, "  container may be inconsistent; restore from {}", p.display());
            }
            (BackupStatus::Kept(p), _) => {
                let _ = writeln!(out, "  backup: {}", p.display());
            }
            (BackupStatus::Discarded, _) => {
                let _ = writeln!(out, "  rolled back cleanly; backup removed");
            }
            (BackupStatus::Failed(reason), _) => {
                let _ = writeln!(out, "  not modified; backup failed: {reason}");
            }
            (BackupStatus::NotTaken, ContainerOutcome::PartiallyFailed) => {
                let _ = writeln!(out, "  container may be inconsistent and no backup exists");
            }
            (BackupStatus::NotTaken, _) => {}
        }
    }
    for (path, reason) in &report.unreadable {
        let _ = writeln!(out, "{} [unreadable] {reason}", path.display());
    }
    let c = report.counts();
    let _ = writeln!(
        out,
        "Containers processed: {}, layers renamed: {}, skipped: {}, failed: {}",
        c.containers_processed, c.layers_renamed, c.skipped, c.failed
    );
    if report.cancelled {
        let _ = writeln!(out, "Run interrupted; remaining containers were not touched.");
    }
    out
}
