//! Layer name computation: transform, sanitize, de-duplicate.

pub mod resolve;
pub mod sanitize;
pub mod transform;

pub use resolve::{Resolved, UsedNameSet, resolve_names, resolve_scoped};
pub use sanitize::{FileSetNames, MAX_IDENTIFIER_LEN, Sanitizer, sanitize_identifier};
pub use transform::{RenameOperation, clean_name};
