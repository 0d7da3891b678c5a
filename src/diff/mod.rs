// src/diff/mod.rs

//! Structural diffing of snapshot trees.
//!
//! [`diff`] walks `curr` and reports one [`DiffEntry`] per changed leaf:
//!
//! - records recurse over the union of their keys;
//! - arrays are matched by value, not position (see [`arrays`]), so a pure
//!   reordering is not a change;
//! - array elements that are containers are reported whole, never field by
//!   field.
//!
//! The output order follows `curr`: at every record level the keys of `curr`
//! come first in their own order, then keys only present in `prev`.

pub mod arrays;

use std::fmt;

use crate::snapshot::Snapshot;
use crate::value::{KeyPath, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffKind {
    Added,
    Removed,
    Modified,
}

impl fmt::Display for DiffKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DiffKind::Added => "added",
            DiffKind::Removed => "removed",
            DiffKind::Modified => "modified",
        };
        f.write_str(s)
    }
}

/// One detected difference.
///
/// For array elements (`element == true`) the last path segment is the
/// position the change applies at: the append slot for an added element, the
/// index in the previously observed array for a removed one.
#[derive(Debug, Clone, PartialEq)]
pub struct DiffEntry {
    pub path: KeyPath,
    pub kind: DiffKind,
    pub old: Option<Value>,
    pub new: Option<Value>,
    pub element: bool,
}

impl DiffEntry {
    pub fn added(path: KeyPath, new: Value) -> Self {
        Self {
            path,
            kind: DiffKind::Added,
            old: None,
            new: Some(new),
            element: false,
        }
    }

    pub fn removed(path: KeyPath, old: Value) -> Self {
        Self {
            path,
            kind: DiffKind::Removed,
            old: Some(old),
            new: None,
            element: false,
        }
    }

    pub fn modified(path: KeyPath, old: Value, new: Value) -> Self {
        Self {
            path,
            kind: DiffKind::Modified,
            old: Some(old),
            new: Some(new),
            element: false,
        }
    }

    pub fn as_element(mut self) -> Self {
        self.element = true;
        self
    }
}

/// Diff tuning.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiffOptions {
    /// Diff arrays position by position instead of matching by value. Used
    /// when a snapshot comes from the text fallback, where element identity
    /// cannot be trusted.
    pub leaf_only: bool,
}

/// Diff two trees with default options.
pub fn diff(prev: &Value, curr: &Value) -> Vec<DiffEntry> {
    diff_with(prev, curr, DiffOptions::default())
}

pub fn diff_with(prev: &Value, curr: &Value, options: DiffOptions) -> Vec<DiffEntry> {
    let empty = Value::empty_record();
    let prev = if prev.is_absent() { &empty } else { prev };
    let curr = if curr.is_absent() { &empty } else { curr };

    let mut out = Vec::new();
    if !unchanged(prev, curr, options) {
        diff_node(&KeyPath::root(), prev, curr, options, &mut out);
    }
    out
}

/// Diff two snapshots of the same target. Falls back to leaf-only array
/// diffing when either side came from the text rendering.
pub fn diff_snapshots(prev: &Snapshot, curr: &Snapshot) -> Vec<DiffEntry> {
    let options = DiffOptions {
        leaf_only: !prev.origin().is_structured() || !curr.origin().is_structured(),
    };
    diff_with(prev.tree(), curr.tree(), options)
}

/// Equality used to prune unchanged subtrees: multiset equality for arrays
/// normally, positional equality in leaf-only mode.
fn unchanged(prev: &Value, curr: &Value, options: DiffOptions) -> bool {
    if options.leaf_only {
        prev == curr
    } else {
        prev.equivalent(curr)
    }
}

/// Precondition: `prev` and `curr` are not `unchanged`.
fn diff_node(
    path: &KeyPath,
    prev: &Value,
    curr: &Value,
    options: DiffOptions,
    out: &mut Vec<DiffEntry>,
) {
    match (prev, curr) {
        (Value::Record(p), Value::Record(c)) => {
            for (key, cv) in c {
                let child = path.child_key(key.clone());
                match p.get(key) {
                    None => out.push(DiffEntry::added(child, cv.clone())),
                    Some(pv) if !unchanged(pv, cv, options) => diff_node(&child, pv, cv, options, out),
                    Some(_) => {}
                }
            }
            for (key, pv) in p {
                if !c.contains_key(key) {
                    out.push(DiffEntry::removed(path.child_key(key.clone()), pv.clone()));
                }
            }
        }
        (Value::Array(p), Value::Array(c)) if options.leaf_only => {
            diff_array_by_index(path, p, c, options, out);
        }
        (Value::Array(p), Value::Array(c)) => {
            arrays::diff_array(path, p, c, out);
        }
        _ => out.push(DiffEntry::modified(path.clone(), prev.clone(), curr.clone())),
    }
}

/// Degraded array diff: compare position by position.
fn diff_array_by_index(
    path: &KeyPath,
    prev: &[Value],
    curr: &[Value],
    options: DiffOptions,
    out: &mut Vec<DiffEntry>,
) {
    for (i, cv) in curr.iter().enumerate() {
        let child = path.child_index(i);
        match prev.get(i) {
            None => out.push(DiffEntry::added(child, cv.clone())),
            Some(pv) if !unchanged(pv, cv, options) => diff_node(&child, pv, cv, options, out),
            Some(_) => {}
        }
    }
    for i in (curr.len()..prev.len()).rev() {
        out.push(DiffEntry::removed(path.child_index(i), prev[i].clone()));
    }
}
