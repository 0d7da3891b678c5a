// src/diff/arrays.rs

//! Value-based array matching.
//!
//! Each element of `curr` claims the first unused element of `prev` that is
//! equivalent to it (greedy first-fit, O(n·m); preference arrays hold tens of
//! elements). Whatever stays unclaimed is a change:
//!
//! - unmatched `curr` elements are Added, addressed at consecutive append
//!   slots starting at `prev.len()`;
//! - unmatched `prev` elements are Removed, addressed at their index in
//!   `prev` and emitted highest index first, so applying them in order never
//!   shifts a pending index.

use crate::value::{KeyPath, Value};

use super::DiffEntry;

/// Result of matching two arrays.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArrayMatch {
    /// Indices into `curr` with no partner in `prev`, ascending.
    pub unmatched_curr: Vec<usize>,
    /// Indices into `prev` with no partner in `curr`, ascending.
    pub unmatched_prev: Vec<usize>,
}

pub fn match_elements(prev: &[Value], curr: &[Value]) -> ArrayMatch {
    let mut used = vec![false; prev.len()];
    let mut unmatched_curr = Vec::new();

    for (i, element) in curr.iter().enumerate() {
        let partner = prev
            .iter()
            .enumerate()
            .position(|(j, candidate)| !used[j] && candidate.equivalent(element));
        match partner {
            Some(j) => used[j] = true,
            None => unmatched_curr.push(i),
        }
    }

    let unmatched_prev = used
        .iter()
        .enumerate()
        .filter(|(_, claimed)| !**claimed)
        .map(|(j, _)| j)
        .collect();

    ArrayMatch {
        unmatched_curr,
        unmatched_prev,
    }
}

pub(crate) fn diff_array(path: &KeyPath, prev: &[Value], curr: &[Value], out: &mut Vec<DiffEntry>) {
    let matched = match_elements(prev, curr);

    for (k, &i) in matched.unmatched_curr.iter().enumerate() {
        let slot = path.child_index(prev.len() + k);
        out.push(DiffEntry::added(slot, curr[i].clone()).as_element());
    }

    for &j in matched.unmatched_prev.iter().rev() {
        out.push(DiffEntry::removed(path.child_index(j), prev[j].clone()).as_element());
    }
}
