//! Filesystem primitives shared by backups and file-set renames.

mod atomic;
mod copy;
mod helpers;
pub(crate) mod util;

pub use atomic::move_no_clobber;
pub use copy::durable_copy;
pub use helpers::{io_error_with_help, io_error_with_help_io};
