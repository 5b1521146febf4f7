//! Application orchestrator.
//! Loads/merges config, initializes logging, installs the signal handler,
//! validates the root, builds and previews the plan, and applies it when asked.

use anyhow::{Context, Result};
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};

use layer_rename::config::{self, CONFIG_ENV, Config, default_config_path};
use layer_rename::engine::{Engine, RunLock};
use layer_rename::errors::LayerRenameError;
use layer_rename::output as out;
use layer_rename::plan::{build_plan, render_preview, summarize};
use layer_rename::report::render_summary;
use layer_rename::shutdown;

use crate::cli::Args;
use crate::logging::init_tracing;

fn print_config_location() {
    if let Some(p) = std::env::var_os(CONFIG_ENV) {
        out::print_info(&format!(
            "Using {CONFIG_ENV} (explicit):\n  {}\n",
            std::path::Path::new(&p).display()
        ));
        out::print_info(&format!("To override, unset {CONFIG_ENV} or set it to another file."));
        return;
    }
    match default_config_path() {
        Some(p) => {
            out::print_info(&format!("Default layer_rename config path:\n  {}\n", p.display()));
            if p.exists() {
                out::print_info("A config file already exists at that location.");
            } else {
                out::print_info("No config file exists there yet; the next run creates a template.");
            }
        }
        None => out::print_error("Could not determine a default config path"),
    }
}

/// Structured log line for a typed failure.
fn log_typed_error(e: &anyhow::Error, what: &str) {
    match e.downcast_ref::<LayerRenameError>() {
        Some(lr) => {
            let code = lr.code();
            match lr {
                LayerRenameError::Discovery { path, reason } => {
                    error!(code, kind = "discovery", path = %path.display(), %reason, "{what}")
                }
                LayerRenameError::InvalidOperation(reason) => {
                    error!(code, kind = "invalid_operation", %reason, "{what}")
                }
                LayerRenameError::Locked(root) => {
                    error!(code, kind = "locked", root = %root.display(), "{what}")
                }
                LayerRenameError::ConflictExhaustion(name) => {
                    error!(code, kind = "conflict_exhaustion", %name, "{what}")
                }
                _ => error!(code, kind = "run_error", error = %lr, "{what}"),
            }
        }
        None => error!(error = %format!("{e:#}"), "{what}"),
    }
}

/// Run the CLI application.
pub fn run(args: Args) -> Result<ExitCode> {
    if args.print_config {
        print_config_location();
        return Ok(ExitCode::SUCCESS);
    }

    // defaults < XML < CLI
    let (mut cfg, cfg_path) = config::load_config()?;
    args.apply_overrides(&mut cfg)?;
    cfg.validate()?;

    let guard_opt = init_tracing(cfg.log_level, cfg.log_file.as_deref(), args.json).map_err(|e| {
        out::print_error(&format!("Failed to initialize logging: {e}"));
        e
    })?;

    // The guard is dropped on SIGINT to flush the file log.
    let guard_slot = Arc::new(Mutex::new(guard_opt));
    {
        let guard_slot = Arc::clone(&guard_slot);
        let installed = ctrlc::set_handler(move || {
            shutdown::request();
            out::print_warn("Received interrupt; finishing the current container...");
            if let Ok(mut g) = guard_slot.lock() {
                let _ = g.take();
            }
        });
        if let Err(e) = installed {
            warn!(error = %e, "could not install interrupt handler");
        }
    }

    debug!(config = ?cfg, file = ?cfg_path, "effective configuration");

    let result = execute(&args, &cfg);
    if let Err(e) = &result {
        log_typed_error(e, "run aborted");
    }

    if let Ok(mut g) = guard_slot.lock() {
        let _ = g.take();
    }
    result
}

fn execute(args: &Args, cfg: &Config) -> Result<ExitCode> {
    let operation = args.to_operation()?;
    let root_arg = args
        .root
        .as_deref()
        .context("ROOT is required")?;
    let root = config::validate_root(root_arg)?;
    info!(root = %root.display(), operation = %operation, dry_run = cfg.dry_run, "starting");

    let plan = build_plan(&root, &operation, &cfg.plan_options())?;
    out::print_user(&render_preview(&plan));
    let summary = summarize(&plan);
    for s in plan.skipped() {
        out::print_warn(&format!("Skipped unreadable container {}: {}", s.path.display(), s.error));
    }

    if cfg.dry_run {
        if summary.changed_entries > 0 {
            out::print_info("Dry run: nothing was changed. Re-run with --apply to rename.");
        }
        return Ok(ExitCode::SUCCESS);
    }
    if summary.changed_entries == 0 {
        return Ok(ExitCode::SUCCESS);
    }

    let _lock = RunLock::acquire(&root)?;
    let report = Engine::new(cfg.execute_options(&root)).execute(&plan)?;
    out::print_user(&render_summary(&report));

    if report.cancelled {
        out::print_warn("Run was interrupted; remaining containers were not changed.");
    }
    if report.has_failures() {
        out::print_error("Some containers could not be renamed; see the summary above.");
        return Ok(ExitCode::FAILURE);
    }
    out::print_success("All planned renames applied.");
    Ok(ExitCode::SUCCESS)
}
