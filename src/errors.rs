//! Typed error definitions for layer_rename.
//! Provides the failure taxonomy used to decide what aborts a run and what is
//! contained at the container boundary.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LayerRenameError {
    /// Root directory missing or unreadable. Fatal for the whole run.
    #[error("Cannot scan root {path}: {reason}")]
    Discovery { path: PathBuf, reason: String },

    /// One container could not be opened or listed. The container is skipped.
    #[error("Cannot read container {path}: {reason}")]
    ContainerRead { path: PathBuf, reason: String },

    /// Backup destination not writable. The container is not mutated.
    #[error("Backup of {path} failed: {reason}")]
    Backup { path: PathBuf, reason: String },

    /// The backend rejected a rename. The container is rolled back.
    #[error("Renaming '{from}' -> '{to}' in {path} failed: {reason}")]
    Rename {
        path: PathBuf,
        from: String,
        to: String,
        reason: String,
    },

    #[error("No free numeric suffix left for name '{0}'")]
    ConflictExhaustion(String),

    #[error("Invalid rename operation: {0}")]
    InvalidOperation(String),

    #[error("Another layer_rename run holds the lock on {0}")]
    Locked(PathBuf),

    #[error("Operation interrupted by user")]
    Interrupted,
}

impl LayerRenameError {
    /// Stable numeric code used in structured logs.
    pub fn code(&self) -> u16 {
        match self {
            LayerRenameError::Discovery { .. } => 10,
            LayerRenameError::ContainerRead { .. } => 11,
            LayerRenameError::Backup { .. } => 20,
            LayerRenameError::Rename { .. } => 30,
            LayerRenameError::ConflictExhaustion(_) => 40,
            LayerRenameError::InvalidOperation(_) => 50,
            LayerRenameError::Locked(_) => 60,
            LayerRenameError::Interrupted => 130,
        }
    }

    /// Whether this error aborts the whole run rather than one container.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            LayerRenameError::Discovery { .. }
                | LayerRenameError::InvalidOperation(_)
                | LayerRenameError::ConflictExhaustion(_)
                | LayerRenameError::Locked(_)
        )
    }

    pub(crate) fn container_read(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        LayerRenameError::ContainerRead {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn backup(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        LayerRenameError::Backup {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn rename(
        path: impl Into<PathBuf>,
        from: &str,
        to: &str,
        reason: impl ToString,
    ) -> Self {
        LayerRenameError::Rename {
            path: path.into(),
            from: from.to_string(),
            to: to.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LayerRenameError>;
