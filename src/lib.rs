//! Core library for `layer_rename`.
//!
//! Finds vector data containers under a root directory, computes a rename plan
//! for every layer from one operation, and applies it per container with
//! backups and rollback. The binary is a thin CLI over this API:
//!
//! - [`plan::build_plan`] discovers containers and resolves final names.
//! - [`plan::render_preview`] is the dry-run output.
//! - [`engine::Engine::execute`] applies a plan and returns a [`report::RunReport`].

pub mod backend;
pub mod backup;
pub mod config;
pub mod discovery;
pub mod engine;
pub mod errors;
pub(crate) mod fs_ops;
pub mod model;
pub mod naming;
pub mod output;
pub mod plan;
pub mod platform;
pub mod report;
pub mod shutdown;

pub use config::{Config, LogLevel};
pub use engine::{Engine, ExecuteOptions, RunLock};
pub use errors::{LayerRenameError, Result};
pub use model::{BackendKind, Container, Layer, VectorFormat};
pub use naming::RenameOperation;
pub use plan::{
    NamespaceScope, PlanEntry, PlanOptions, PlanSummary, RenamePlan, build_plan, render_preview,
    summarize,
};
pub use report::{ContainerOutcome, EntryResult, RunReport, render_summary};
