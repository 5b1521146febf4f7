//! Platform-specific helpers behind one API (Unix / Windows).

mod temp;
#[cfg(unix)]
mod unix;
#[cfg(not(unix))]
mod windows;

#[cfg(unix)]
pub use unix::{is_writable, open_log_file_secure_append, write_config_secure_new_0600};

#[cfg(not(unix))]
pub use windows::{is_writable, open_log_file_secure_append, write_config_secure_new_0600};
