// src/diff.rs

//! Structural diff between two JSON trees, and catalog diffs built on it.
//!
//! Everything goes through [`delta`]: keys present only on the `to` side are
//! copied wholesale, keys present on both sides are descended into while the
//! [`Depth`] allows it, and a residue that the [`LeafRule`] marks as not
//! meaningful (empty, or an artifact record) is dropped.
//!
//! A catalog diff is `delta` limited to two levels (cookbook, version), so a
//! version that exists on both sides never shows up as added or removed no
//! matter how its attributes drifted. The unlimited variant is used to compare
//! single-cookbook records.

use crate::catalog::{Catalog, DOWNLOAD_URL, LOCATION_PATH};
use serde_json::{Map, Value};
use tracing::debug;

/// How far [`delta`] descends into keys present on both sides
///
/// The top level's key sets are always compared, so `Limited(1)` is the
/// shallowest diff and `Limited(0)` behaves the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Depth {
    /// Compare key sets for this many levels; deeper values are not compared
    Limited(usize),
    /// Recurse until the trees bottom out
    Unlimited,
}

impl Depth {
    /// Depth budget for the next level down, or `None` when exhausted
    fn descend(self) -> Option<Depth> {
        match self {
            Depth::Limited(0) | Depth::Limited(1) => None,
            Depth::Limited(n) => Some(Depth::Limited(n - 1)),
            Depth::Unlimited => Some(Depth::Unlimited),
        }
    }
}

/// Decides which nested residues carry no meaningful difference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeafRule {
    markers: &'static [&'static str],
}

impl LeafRule {
    /// Empty residues, and residues carrying `location_path` or
    /// `download_url` (a version record, not a further-diffable subtree)
    pub const ARTIFACT: LeafRule = LeafRule {
        markers: &[LOCATION_PATH, DOWNLOAD_URL],
    };

    /// Only empty residues
    pub const EMPTY_ONLY: LeafRule = LeafRule { markers: &[] };

    /// True when a residue should be left out of the result
    pub fn suppresses(&self, residue: &Map<String, Value>) -> bool {
        residue.is_empty() || self.markers.iter().any(|key| residue.contains_key(*key))
    }
}

/// What must be added to `from` to arrive at `to`
pub fn delta(
    from: &Map<String, Value>,
    to: &Map<String, Value>,
    depth: Depth,
    leaf: LeafRule,
) -> Map<String, Value> {
    to.iter()
        .filter_map(|(key, to_value)| match from.get(key) {
            None => Some((key.clone(), to_value.clone())),
            Some(from_value) => {
                let next = depth.descend()?;
                value_delta(from_value, to_value, next, leaf).map(|residue| (key.clone(), residue))
            }
        })
        .collect()
}

fn value_delta(from: &Value, to: &Value, depth: Depth, leaf: LeafRule) -> Option<Value> {
    match (from, to) {
        (Value::Object(from), Value::Object(to)) => {
            let residue = delta(from, to, depth, leaf);
            (!leaf.suppresses(&residue)).then_some(Value::Object(residue))
        }
        // Scalars, arrays, or a mix of shapes: surface the new value verbatim
        _ if from != to => Some(to.clone()),
        _ => None,
    }
}

/// Both directions of a tree diff
#[derive(Debug, Clone, PartialEq)]
pub struct TreeDiff {
    /// Present only in `to`
    pub added: Value,
    /// Present only in `from`
    pub removed: Value,
}

impl TreeDiff {
    /// True when neither side has anything the other lacks
    pub fn is_empty(&self) -> bool {
        fn empty(value: &Value) -> bool {
            matches!(value, Value::Object(map) if map.is_empty())
        }
        empty(&self.added) && empty(&self.removed)
    }
}

/// Diff two arbitrary trees
///
/// An absent side counts as an empty object. When either side is not an
/// object and the two differ, the values themselves are the diff.
pub fn diff_trees(
    from: Option<&Value>,
    to: Option<&Value>,
    depth: Depth,
    leaf: LeafRule,
) -> TreeDiff {
    let empty = Value::Object(Map::new());
    let from = from.unwrap_or(&empty);
    let to = to.unwrap_or(&empty);

    match (from, to) {
        (Value::Object(s), Value::Object(t)) => TreeDiff {
            added: Value::Object(delta(s, t, depth, leaf)),
            removed: Value::Object(delta(t, s, depth, leaf)),
        },
        _ if from != to => TreeDiff {
            added: to.clone(),
            removed: from.clone(),
        },
        _ => TreeDiff {
            added: empty.clone(),
            removed: empty,
        },
    }
}

/// Result of comparing two catalogs
///
/// Directions are relative to the first argument of [`diff_catalogs`]: when
/// diffing a mirror against its upstream, `added` is what the mirror lacks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogDiff {
    /// Cookbooks and versions only the `to` catalog has
    pub added: Catalog,
    /// Cookbooks and versions only the `from` catalog has
    pub removed: Catalog,
    /// `"<cookbook> <version>"` for versions on both sides whose
    /// dependencies differ
    pub invalid_dependency_changes: Vec<String>,
}

impl CatalogDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
            && self.removed.is_empty()
            && self.invalid_dependency_changes.is_empty()
    }
}

/// Levels compared in a catalog: cookbook, then version
const CATALOG_DEPTH: Depth = Depth::Limited(2);

/// Diff two catalogs
///
/// An absent catalog is treated as empty.
pub fn diff_catalogs(from: Option<&Catalog>, to: Option<&Catalog>) -> CatalogDiff {
    let empty = Catalog::new();
    let from = from.unwrap_or(&empty);
    let to = to.unwrap_or(&empty);

    let added = delta(from.as_map(), to.as_map(), CATALOG_DEPTH, LeafRule::ARTIFACT);
    let removed = delta(to.as_map(), from.as_map(), CATALOG_DEPTH, LeafRule::ARTIFACT);
    let invalid_dependency_changes = dependency_changes(from, to);

    debug!(
        "Catalog diff: {} cookbooks added, {} removed, {} dependency changes",
        added.len(),
        removed.len(),
        invalid_dependency_changes.len()
    );

    CatalogDiff {
        added: Catalog::from_map_unchecked(added),
        removed: Catalog::from_map_unchecked(removed),
        invalid_dependency_changes,
    }
}

/// Versions whose dependencies changed without a version bump
///
/// Lexicographic by cookbook, then by version key.
pub fn dependency_changes(from: &Catalog, to: &Catalog) -> Vec<String> {
    from.packages()
        .filter_map(|(cookbook, from_entry)| {
            to.get(cookbook).map(|to_entry| (cookbook, from_entry, to_entry))
        })
        .flat_map(|(cookbook, from_entry, to_entry)| {
            from_entry.versions().filter_map(move |version| {
                let before = from_entry.get(version)?;
                let after = to_entry.get(version)?;
                (before.dependencies_value() != after.dependencies_value())
                    .then(|| format!("{} {}", cookbook, version))
            })
        })
        .collect()
}
