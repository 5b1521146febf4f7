//! Identifier sanitization.
//!
//! Strict rules (all SQL backends, and file sets unless configured otherwise):
//! - only `[A-Za-z0-9_]`, no repeated or surrounding `_`
//! - empty becomes `layer`
//! - a leading digit gets a `layer_` prefix
//! - at most 63 characters
//!
//! Permissive rules (file sets only, opt-in) keep any character a filesystem
//! accepts in a file name.

use serde::Deserialize;

use super::transform::clean_name;
use crate::model::BackendKind;

/// Identifier length limit shared with the SQL backends.
pub const MAX_IDENTIFIER_LEN: usize = 63;
/// File-name budget for permissive file-set names, leaving room for extensions and suffixes.
pub const MAX_FILE_STEM_LEN: usize = 200;
pub const FALLBACK_NAME: &str = "layer";

/// How file-set layer names are sanitized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileSetNames {
    /// Same identifier rules as SQL layers.
    #[default]
    Strict,
    /// Only strip what the filesystem cannot store.
    Permissive,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Sanitizer {
    pub file_set_names: FileSetNames,
}

impl Sanitizer {
    pub fn new(file_set_names: FileSetNames) -> Self {
        Self { file_set_names }
    }

    pub fn sanitize(&self, kind: BackendKind, candidate: &str) -> String {
        match (kind, self.file_set_names) {
            (BackendKind::FileSetSingleLayer, FileSetNames::Permissive) => {
                sanitize_file_stem(candidate)
            }
            _ => sanitize_identifier(candidate),
        }
    }

    /// Length limit that conflict suffixing must respect for this backend.
    pub fn max_len(&self, kind: BackendKind) -> usize {
        match (kind, self.file_set_names) {
            (BackendKind::FileSetSingleLayer, FileSetNames::Permissive) => MAX_FILE_STEM_LEN,
            _ => MAX_IDENTIFIER_LEN,
        }
    }
}

/// Strict identifier: non-empty, `[A-Za-z0-9_]+`, no leading digit, ≤ 63 chars.
pub fn sanitize_identifier(candidate: &str) -> String {
    let mut name = clean_name(candidate);
    if name.is_empty() {
        name = FALLBACK_NAME.to_string();
    }
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        name = format!("{FALLBACK_NAME}_{name}");
    }
    // ASCII only at this point, so byte truncation is char-safe.
    name.truncate(MAX_IDENTIFIER_LEN);
    let trimmed = name.trim_end_matches('_');
    trimmed.to_string()
}

/// Filesystem-safe stem: separators, reserved and control characters become `_`.
pub fn sanitize_file_stem(candidate: &str) -> String {
    let replaced: String = candidate
        .chars()
        .map(|c| match c {
            '/' | '\\' | '<' | '>' | ':' | '"' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let trimmed = replaced.trim_matches(|c: char| c == ' ' || c == '.');
    let mut name: String = trimmed.chars().take(MAX_FILE_STEM_LEN).collect();
    if name.trim().is_empty() {
        name = FALLBACK_NAME.to_string();
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_identifier(s: &str) {
        assert!(!s.is_empty());
        assert!(s.len() <= MAX_IDENTIFIER_LEN, "{s} too long");
        assert!(s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'), "{s}");
        assert!(!s.starts_with(|c: char| c.is_ascii_digit()), "{s}");
    }

    #[test]
    fn empty_falls_back_to_layer() {
        assert_eq!(sanitize_identifier(""), "layer");
        assert_eq!(sanitize_identifier("___"), "layer");
    }

    #[test]
    fn digits_get_prefix() {
        assert_eq!(sanitize_identifier("2023"), "layer_2023");
        assert_eq!(sanitize_identifier("9roads"), "layer_9roads");
    }

    #[test]
    fn truncates_and_strips_dangling_underscore() {
        let long = format!("{}_b", "a".repeat(62));
        let out = sanitize_identifier(&long);
        assert_eq!(out, "a".repeat(62));
        assert_identifier(&out);
    }

    #[test]
    fn totality_over_awkward_inputs() {
        let long_digits = "1".repeat(80);
        let inputs = [
            "",
            "0",
            "12345",
            "   ",
            "Straße-Ost",
            "日本語",
            "-_-",
            "a b c",
            long_digits.as_str(),
        ];
        for input in inputs {
            assert_identifier(&sanitize_identifier(input));
        }
    }

    #[test]
    fn permissive_keeps_spaces_and_unicode() {
        let s = Sanitizer::new(FileSetNames::Permissive);
        assert_eq!(s.sanitize(BackendKind::FileSetSingleLayer, "Straße Ost"), "Straße Ost");
        assert_eq!(s.sanitize(BackendKind::FileSetSingleLayer, "a/b:c"), "a_b_c");
        assert_eq!(s.sanitize(BackendKind::FileSetSingleLayer, " .. "), "layer");
        // SQL layers never get permissive treatment.
        assert_eq!(s.sanitize(BackendKind::SqlMultiLayer, "Straße Ost"), "Stra_e_Ost");
    }
}
