//! Name transformation operations.
//! Every operation is a pure function of the input name, so a dry run and the
//! apply that follows it always compute the same proposals.

use std::fmt;

use crate::errors::{LayerRenameError, Result};

/// The single operation applied to every layer in a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenameOperation {
    /// Literal substring substitution of every occurrence; `replace` may be empty.
    Replace { find: String, replace: String },
    TrimBegin(usize),
    TrimEnd(usize),
    AddPrefix(String),
    AddSuffix(String),
    Clean,
    Lowercase,
    Uppercase,
    TitleCase,
}

impl RenameOperation {
    /// Reject descriptors that cannot produce a meaningful rename.
    pub fn validate(&self) -> Result<()> {
        match self {
            RenameOperation::Replace { find, .. } if find.is_empty() => Err(
                LayerRenameError::InvalidOperation("replace needs non-empty find text".into()),
            ),
            RenameOperation::TrimBegin(0) | RenameOperation::TrimEnd(0) => Err(
                LayerRenameError::InvalidOperation("trim count must be at least 1".into()),
            ),
            RenameOperation::AddPrefix(t) if t.trim().is_empty() => Err(
                LayerRenameError::InvalidOperation("prefix text must not be empty".into()),
            ),
            RenameOperation::AddSuffix(t) if t.trim().is_empty() => Err(
                LayerRenameError::InvalidOperation("suffix text must not be empty".into()),
            ),
            _ => Ok(()),
        }
    }

    /// Proposed name for `name`. Total: never fails, may return an empty string.
    pub fn apply(&self, name: &str) -> String {
        match self {
            RenameOperation::Replace { find, replace } => name.replace(find.as_str(), replace),
            RenameOperation::TrimBegin(n) => name.chars().skip(*n).collect(),
            RenameOperation::TrimEnd(n) => {
                let len = name.chars().count();
                name.chars().take(len.saturating_sub(*n)).collect()
            }
            RenameOperation::AddPrefix(p) => format!("{p}{name}"),
            RenameOperation::AddSuffix(s) => format!("{name}{s}"),
            RenameOperation::Clean => clean_name(name),
            RenameOperation::Lowercase => name.to_lowercase(),
            RenameOperation::Uppercase => name.to_uppercase(),
            RenameOperation::TitleCase => title_case(name),
        }
    }
}

impl fmt::Display for RenameOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenameOperation::Replace { find, replace } => {
                write!(f, "replace '{find}' with '{replace}'")
            }
            RenameOperation::TrimBegin(n) => write!(f, "trim {n} from start"),
            RenameOperation::TrimEnd(n) => write!(f, "trim {n} from end"),
            RenameOperation::AddPrefix(p) => write!(f, "add prefix '{p}'"),
            RenameOperation::AddSuffix(s) => write!(f, "add suffix '{s}'"),
            RenameOperation::Clean => f.write_str("clean"),
            RenameOperation::Lowercase => f.write_str("lowercase"),
            RenameOperation::Uppercase => f.write_str("uppercase"),
            RenameOperation::TitleCase => f.write_str("title case"),
        }
    }
}

/// Replace anything outside `[A-Za-z0-9_]` with `_`, collapse runs of `_`,
/// and strip leading/trailing `_`.
pub fn clean_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        let c = if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' };
        if c == '_' && out.ends_with('_') {
            continue;
        }
        out.push(c);
    }
    out.trim_matches('_').to_string()
}

/// Capitalise the first letter of each `_`-delimited segment and lowercase the rest.
fn title_case(name: &str) -> String {
    name.split('_')
        .map(|segment| {
            let mut chars = segment.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("_")
}
