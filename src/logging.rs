//! Tracing initialization.
//! Builds a subscriber with EnvFilter, supports compact or JSON formats, and optional file logging.
//!
//! Behavior:
//! - Log level is driven by LogLevel; RUST_LOG is not consulted.
//! - Console logs go to stderr so stdout carries only the preview and summary.
//! - If `log_file` is provided and passes safety checks, a non-blocking file layer is added.

use anyhow::Result;
use chrono::Local;
use std::fmt as stdfmt;
use std::io;
use std::path::Path;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::fmt as tsfmt;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry;
use tracing_subscriber::util::SubscriberInitExt;

use layer_rename::config::LogLevel;
use layer_rename::config::paths::path_has_symlink_ancestor;
use layer_rename::output as out;
use layer_rename::platform::open_log_file_secure_append;

/// Human-friendly timestamp formatter (DD/MM/YY HH:MM:SS)
struct LocalHumanTime;
impl FormatTime for LocalHumanTime {
    fn format_time(&self, w: &mut tsfmt::format::Writer<'_>) -> stdfmt::Result {
        let now = Local::now();
        write!(w, "{}", now.format("%d/%m/%y %H:%M:%S"))
    }
}

#[inline]
fn to_level_filter(lvl: LogLevel) -> LevelFilter {
    match lvl {
        LogLevel::Quiet => LevelFilter::ERROR,
        LogLevel::Normal => LevelFilter::WARN,
        LogLevel::Info => LevelFilter::INFO,
        LogLevel::Debug => LevelFilter::DEBUG,
    }
}

#[inline]
fn env_filter_from_level(level_filter: LevelFilter) -> EnvFilter {
    let level_str = match level_filter {
        LevelFilter::ERROR => "error",
        LevelFilter::WARN => "warn",
        LevelFilter::INFO => "info",
        LevelFilter::DEBUG => "debug",
        LevelFilter::TRACE => "trace",
        _ => "warn",
    };
    EnvFilter::new(level_str)
}

/// Try to open a non-blocking file writer for logging:
/// - Refuse if any ancestor is a symlink
/// - Best-effort create parent directory
/// - Open file for append and wrap with non_blocking
fn maybe_open_non_blocking_writer(path: &Path) -> Option<(NonBlocking, WorkerGuard)> {
    match path_has_symlink_ancestor(path) {
        Ok(true) => {
            out::print_warn(&format!(
                "Refusing to enable file logging: ancestor of {} is a symlink",
                path.display()
            ));
            return None;
        }
        Err(e) => {
            out::print_warn(&format!(
                "Error checking log path {} for symlinks: {e}",
                path.display()
            ));
            return None;
        }
        Ok(false) => {}
    }

    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    match open_log_file_secure_append(path) {
        Ok(file) => Some(tracing_appender::non_blocking(file)),
        Err(e) => {
            out::print_warn(&format!("Failed to open log file {}: {e}", path.display()));
            None
        }
    }
}

/// Initialize tracing based on LogLevel and format. Returns an optional WorkerGuard
/// if a file appender is created (must be held until shutdown to flush logs).
pub fn init_tracing(
    lvl: LogLevel,
    log_file: Option<&Path>,
    json: bool,
) -> Result<Option<WorkerGuard>> {
    let env_filter = env_filter_from_level(to_level_filter(lvl));

    let file = log_file.and_then(|path| {
        let w = maybe_open_non_blocking_writer(path);
        if w.is_none() {
            out::print_warn(&format!(
                "Requested file logging to '{}' was not enabled. Logs will continue to stderr.",
                path.display()
            ));
        }
        w
    });

    match (file, json) {
        (Some((writer, guard)), true) => {
            let console = tsfmt::layer()
                .event_format(tsfmt::format().json())
                .with_timer(LocalHumanTime)
                .with_target(true)
                .with_thread_ids(true)
                .with_writer(io::stderr);
            let file_layer = tsfmt::layer()
                .event_format(tsfmt::format().json())
                .with_timer(LocalHumanTime)
                .with_target(true)
                .with_thread_ids(true)
                .with_ansi(false)
                .with_writer(writer);
            registry()
                .with(env_filter)
                .with(console)
                .with(file_layer)
                .try_init()?;
            Ok(Some(guard))
        }
        (Some((writer, guard)), false) => {
            let console = tsfmt::layer()
                .with_timer(LocalHumanTime)
                .with_target(true)
                .with_thread_ids(true)
                .compact()
                .with_writer(io::stderr);
            let file_layer = tsfmt::layer()
                .with_timer(LocalHumanTime)
                .with_target(true)
                .with_thread_ids(true)
                .with_ansi(false)
                .compact()
                .with_writer(writer);
            registry()
                .with(env_filter)
                .with(console)
                .with(file_layer)
                .try_init()?;
            Ok(Some(guard))
        }
        (None, true) => {
            let console = tsfmt::layer()
                .event_format(tsfmt::format().json())
                .with_timer(LocalHumanTime)
                .with_target(true)
                .with_thread_ids(true)
                .with_writer(io::stderr);
            registry().with(env_filter).with(console).try_init()?;
            Ok(None)
        }
        (None, false) => {
            let console = tsfmt::layer()
                .with_timer(LocalHumanTime)
                .with_target(true)
                .with_thread_ids(true)
                .compact()
                .with_writer(io::stderr);
            registry().with(env_filter).with(console).try_init()?;
            Ok(None)
        }
    }
}
