//! Process-wide cancellation flag.
//! Set by the ctrlc handler; the execution engine checks it between containers
//! so an in-flight container always finishes its commit or rollback first.
//!
//! Notes:
//! - Relaxed atomics are sufficient for a one-way "stop" flag.
//! - `request()` is safe to call from signal handlers.
use std::sync::atomic::{AtomicBool, Ordering};

static SHUTDOWN: AtomicBool = AtomicBool::new(false);

/// Request a cooperative shutdown (idempotent).
#[inline]
pub fn request() {
    SHUTDOWN.store(true, Ordering::Relaxed);
}

/// Check whether a shutdown has been requested.
#[inline]
pub fn is_requested() -> bool {
    SHUTDOWN.load(Ordering::Relaxed)
}

/// Clear the flag. Used by tests and by embedders that run several plans in one process.
#[inline]
pub fn reset() {
    SHUTDOWN.store(false, Ordering::Relaxed);
}
