//! Conflict resolution.
//!
//! Names are claimed strictly in discovery order. The first claim of a name
//! keeps it; later claims get the smallest free `_k` suffix. Comparison is
//! case-insensitive because SQLite identifiers (and most desktop filesystems)
//! are, so `Roads` and `roads` can never coexist in one namespace.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use tracing::debug;

use crate::errors::{LayerRenameError, Result};

/// A final name plus whether a numeric suffix had to be added.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub name: String,
    pub conflict_resolved: bool,
}

/// Names already claimed in one namespace.
#[derive(Debug, Clone, Default)]
pub struct UsedNameSet {
    keys: HashSet<String>,
}

fn fold(name: &str) -> String {
    name.to_lowercase()
}

impl UsedNameSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.keys.contains(&fold(name))
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Claim `name`, or the first free `name_k` when it is taken. `max_len`
    /// bounds the result in characters; the base is shortened to make room
    /// for the suffix.
    pub fn claim(&mut self, name: &str, max_len: usize) -> Result<Resolved> {
        if self.keys.insert(fold(name)) {
            return Ok(Resolved {
                name: name.to_string(),
                conflict_resolved: false,
            });
        }
        for k in 1..=u32::MAX {
            let suffix = format!("_{k}");
            let candidate = with_suffix(name, &suffix, max_len);
            if self.keys.insert(fold(&candidate)) {
                debug!(name, resolved = %candidate, "name conflict resolved");
                return Ok(Resolved {
                    name: candidate,
                    conflict_resolved: true,
                });
            }
        }
        Err(LayerRenameError::ConflictExhaustion(name.to_string()))
    }
}

fn with_suffix(base: &str, suffix: &str, max_len: usize) -> String {
    let budget = max_len.saturating_sub(suffix.chars().count());
    let mut stem: String = base.chars().take(budget).collect();
    if stem.chars().count() < base.chars().count() {
        // Avoid "abc__1" when the cut lands on a separator.
        let trimmed = stem.trim_end_matches('_').len();
        stem.truncate(trimmed);
    }
    format!("{stem}{suffix}")
}

/// Resolve one ordered sequence of names sharing a single namespace.
pub fn resolve_names(names: &[String], max_len: usize) -> Result<Vec<Resolved>> {
    let mut used = UsedNameSet::new();
    names.iter().map(|n| used.claim(n, max_len)).collect()
}

/// Resolve names that belong to independent namespaces, keyed by `K`.
///
/// Order within each namespace is the order of `items`. Returns the resolved
/// names (aligned with `items`) and the frozen per-namespace sets.
pub fn resolve_scoped<K>(items: &[(K, String, usize)]) -> Result<(Vec<Resolved>, HashMap<K, UsedNameSet>)>
where
    K: Eq + Hash + Clone,
{
    let mut spaces: HashMap<K, UsedNameSet> = HashMap::new();
    let mut out = Vec::with_capacity(items.len());
    for (key, name, max_len) in items {
        let used = spaces.entry(key.clone()).or_default();
        out.push(used.claim(name, *max_len)?);
    }
    Ok((out, spaces))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn numbering_is_deterministic() {
        let out = resolve_names(&names(&["roads_main", "roads", "roads", "utilities"]), 63).unwrap();
        let finals: Vec<_> = out.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(finals, ["roads_main", "roads", "roads_1", "utilities"]);
        assert!(out[2].conflict_resolved);
        assert!(!out[1].conflict_resolved);
    }

    #[test]
    fn generated_names_are_claimed_too() {
        // "roads_1" is already taken by a real layer, so the duplicate moves on to _2,
        // and the later real "roads_2" is pushed to _2_1.
        let out = resolve_names(&names(&["roads", "roads_1", "roads", "roads_2"]), 63).unwrap();
        let finals: Vec<_> = out.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(finals, ["roads", "roads_1", "roads_2", "roads_2_1"]);
    }

    #[test]
    fn case_variants_collide() {
        let out = resolve_names(&names(&["Roads", "roads"]), 63).unwrap();
        assert_eq!(out[0].name, "Roads");
        assert_eq!(out[1].name, "roads_1");
    }

    #[test]
    fn suffix_respects_length_limit() {
        let base = "a".repeat(63);
        let out = resolve_names(&[base.clone(), base.clone()], 63).unwrap();
        assert_eq!(out[1].name.len(), 63);
        assert!(out[1].name.ends_with("_1"));
    }

    #[test]
    fn scoped_namespaces_are_independent() {
        let items = vec![
            ("a.gpkg", "roads".to_string(), 63),
            ("b.gpkg", "roads".to_string(), 63),
            ("a.gpkg", "roads".to_string(), 63),
        ];
        let (out, spaces) = resolve_scoped(&items).unwrap();
        let finals: Vec<_> = out.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(finals, ["roads", "roads", "roads_1"]);
        assert_eq!(spaces.len(), 2);
        assert_eq!(spaces["a.gpkg"].len(), 2);
    }
}
