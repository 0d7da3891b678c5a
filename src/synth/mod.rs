// src/synth/mod.rs

//! Command synthesis.
//!
//! Turns [`DiffEntry`]s into [`SynthesizedCommand`]s that reproduce the change
//! on a fresh copy of the preference store:
//!
//! - Added / Modified leaf → `Set`
//! - Removed leaf → `Delete` (only when the current snapshot confirms it)
//! - Added array element → `AppendRecord`
//! - Removed array element → `Delete` by index into the array as last seen
//!
//! Each command carries a primary rendering and, where the primary is a
//! `defaults` call, an equivalent PlistBuddy structural edit.

pub mod apply;
pub mod render;

use std::collections::HashMap;
use std::fmt;

use tracing::debug;

use crate::diff::{DiffEntry, DiffKind};
use crate::snapshot::{Snapshot, Target};
use crate::types::SnapshotOrigin;
use crate::value::infer::resolve_tokens;
use crate::value::plist::to_xml_fragment;
use crate::value::{infer_value, Inferred, KeyPath, Segment, Value, ValueKind};

use render::{
    defaults_delete, defaults_value_args, defaults_write, pb_add_clauses, pb_literal, pb_path,
    plistbuddy,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Set,
    Delete,
    /// Append an element (usually a record) to an array.
    AppendRecord,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operation::Set => "set",
            Operation::Delete => "delete",
            Operation::AppendRecord => "append",
        };
        f.write_str(s)
    }
}

/// A rendered, replayable command.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesizedCommand {
    pub target: Target,
    pub path: KeyPath,
    pub operation: Operation,
    pub primary: String,
    /// Structural-edit equivalents, in order.
    pub alternate: Vec<String>,
    pub warnings: Vec<String>,
    /// Typed value written by `Set` / `AppendRecord`.
    pub payload: Option<Value>,
    /// The value type could not be determined; the literal is a placeholder
    /// and the command must not be replayed as-is.
    pub placeholder: bool,
}

impl SynthesizedCommand {
    pub fn domain(&self) -> &str {
        self.target.name()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Log rendering: the primary `Cmd:` line, advisory comments, then one
    /// `Cmd:` line per alternate.
    pub fn render_lines(&self) -> Vec<String> {
        let mut lines = Vec::with_capacity(1 + self.warnings.len() + self.alternate.len());
        lines.push(format!("Cmd: {}", self.primary));
        for warning in &self.warnings {
            lines.push(format!("# {warning}"));
        }
        for alt in &self.alternate {
            lines.push(format!("Cmd: {alt}"));
        }
        lines
    }
}

/// The value a command writes: resolved to a type, or the raw token that
/// could not be classified.
type Resolved = Result<Value, String>;

/// Synthesize the command for a single entry.
///
/// `current` is the snapshot the entry was diffed into. Returns `None` for
/// entries that cannot be represented safely (deletions the current state
/// does not confirm, elements whose array is gone, root-level replacements).
pub fn synthesize(
    target: &Target,
    entry: &DiffEntry,
    current: &Snapshot,
) -> Option<SynthesizedCommand> {
    if entry.path.is_root() {
        debug!(domain = %target, "root value replaced; not representable as a command");
        return None;
    }

    match (entry.kind, entry.element) {
        (DiffKind::Added | DiffKind::Modified, false) => {
            let new = entry.new.as_ref()?;
            Some(synthesize_set(target, entry, resolve(new, current, &entry.path)))
        }
        (DiffKind::Removed, false) => synthesize_delete(target, &entry.path, current),
        (DiffKind::Added, true) => {
            let new = entry.new.as_ref()?;
            Some(synthesize_append(target, &entry.path, resolve(new, current, &entry.path)))
        }
        (DiffKind::Removed, true) => synthesize_element_delete(target, &entry.path, current),
        (DiffKind::Modified, true) => {
            debug!(domain = %target, path = %entry.path, "modified element entry; ignoring");
            None
        }
    }
}

/// Synthesize commands for every entry of one cycle, in entry order.
///
/// When several elements of the same array are removed in one cycle, each of
/// those commands carries an index-shift warning.
pub fn synthesize_all(
    target: &Target,
    entries: &[DiffEntry],
    current: &Snapshot,
) -> Vec<SynthesizedCommand> {
    let mut removals: HashMap<KeyPath, usize> = HashMap::new();
    for entry in entries {
        if entry.element && entry.kind == DiffKind::Removed {
            if let Some(parent) = entry.path.parent() {
                *removals.entry(parent).or_default() += 1;
            }
        }
    }

    entries
        .iter()
        .filter_map(|entry| {
            let mut command = synthesize(target, entry, current)?;
            if entry.element && entry.kind == DiffKind::Removed {
                let count = entry
                    .path
                    .parent()
                    .and_then(|p| removals.get(&p).copied())
                    .unwrap_or(0);
                if count > 1 {
                    command.warnings.push(format!(
                        "{count} elements removed from {}; indices shift after each deletion, apply highest index first",
                        entry.path.parent().unwrap_or_default()
                    ));
                }
            }
            Some(command)
        })
        .collect()
}

fn resolve(value: &Value, current: &Snapshot, path: &KeyPath) -> Resolved {
    if current.origin().is_structured() {
        Ok(value.clone())
    } else {
        resolve_tokens(value, current, path)
    }
}

fn inferred_of(resolved: &Resolved) -> Inferred {
    match resolved {
        Ok(value) => infer_value(value),
        Err(raw) => Inferred {
            kind: ValueKind::Unknown,
            literal: format!("<type> {raw}"),
            value: None,
        },
    }
}

fn placeholder_warning(path: &KeyPath, raw: &str) -> String {
    format!("could not infer the value type of {path} (raw value {raw}); literal is a placeholder")
}

fn synthesize_set(target: &Target, entry: &DiffEntry, resolved: Resolved) -> SynthesizedCommand {
    let path = &entry.path;
    let inferred = inferred_of(&resolved);
    let structural = plistbuddy(target, &set_clauses(path, entry.old.as_ref(), &resolved, &inferred));

    let (primary, alternate) = match path.segments() {
        [Segment::Key(key)] => (
            defaults_write(target, key, &defaults_value_args(&inferred)),
            vec![structural],
        ),
        [Segment::Key(top), Segment::Key(sub)] if !inferred.kind.is_container() => {
            let args = format!(
                "-dict-add {} {}",
                render::sh_quote(sub),
                defaults_value_args(&inferred)
            );
            (defaults_write(target, top, &args), vec![structural])
        }
        _ => (structural, Vec::new()),
    };

    let mut command = SynthesizedCommand {
        target: target.clone(),
        path: path.clone(),
        operation: Operation::Set,
        primary,
        alternate,
        warnings: Vec::new(),
        payload: resolved.as_ref().ok().cloned(),
        placeholder: resolved.is_err(),
    };
    if let Err(raw) = &resolved {
        command.warnings.push(placeholder_warning(path, raw));
    }
    command
}

/// PlistBuddy clauses for a Set: `Add` for new keys, `Set` when a scalar keeps
/// its type, otherwise `Delete` + `Add`.
fn set_clauses(
    path: &KeyPath,
    old: Option<&Value>,
    resolved: &Resolved,
    inferred: &Inferred,
) -> Vec<String> {
    let entry = pb_path(path);
    let mut clauses = Vec::new();
    match (old, resolved) {
        (Some(old), Ok(new)) if !old.is_container() && old.kind() == new.kind() && !new.is_container() => {
            clauses.push(format!("Set {entry} {}", pb_literal(inferred)));
        }
        (old, Ok(new)) => {
            if old.is_some() {
                clauses.push(format!("Delete {entry}"));
            }
            pb_add_clauses(path, new, &mut clauses);
        }
        (old, Err(_)) => {
            if old.is_some() {
                clauses.push(format!("Delete {entry}"));
            }
            clauses.push(format!("Add {entry} {}", inferred.literal));
        }
    }
    clauses
}

fn synthesize_delete(target: &Target, path: &KeyPath, current: &Snapshot) -> Option<SynthesizedCommand> {
    if !current.confirms_absent(path) {
        debug!(
            domain = %target,
            path = %path,
            origin = ?current.origin(),
            "removal not confirmed by current snapshot; skipping delete"
        );
        return None;
    }

    let structural = plistbuddy(target, &[format!("Delete {}", pb_path(path))]);
    let (primary, alternate) = match path.segments() {
        [Segment::Key(key)] => (defaults_delete(target, key), vec![structural]),
        _ => (structural, Vec::new()),
    };

    Some(SynthesizedCommand {
        target: target.clone(),
        path: path.clone(),
        operation: Operation::Delete,
        primary,
        alternate,
        warnings: Vec::new(),
        payload: None,
        placeholder: false,
    })
}

fn synthesize_append(target: &Target, slot: &KeyPath, resolved: Resolved) -> SynthesizedCommand {
    let inferred = inferred_of(&resolved);
    let array_path = slot.parent().unwrap_or_default();

    let structural = match &resolved {
        Ok(value) => {
            let mut clauses = Vec::new();
            pb_add_clauses(slot, value, &mut clauses);
            plistbuddy(target, &clauses)
        }
        Err(_) => plistbuddy(target, &[format!("Add {} {}", pb_path(slot), inferred.literal)]),
    };

    let (primary, alternate) = match array_path.segments() {
        [Segment::Key(key)] => {
            let element = match inferred.kind {
                ValueKind::Unknown => inferred.literal.clone(),
                _ => render::sh_quote(&to_xml_fragment(
                    inferred.value.as_ref().unwrap_or(&Value::Absent),
                )),
            };
            (
                defaults_write(target, key, &format!("-array-add {element}")),
                vec![structural],
            )
        }
        _ => (structural, Vec::new()),
    };

    let mut command = SynthesizedCommand {
        target: target.clone(),
        path: slot.clone(),
        operation: Operation::AppendRecord,
        primary,
        alternate,
        warnings: Vec::new(),
        payload: resolved.as_ref().ok().cloned(),
        placeholder: resolved.is_err(),
    };
    if let Err(raw) = &resolved {
        command.warnings.push(placeholder_warning(slot, raw));
    }
    command
}

fn synthesize_element_delete(
    target: &Target,
    path: &KeyPath,
    current: &Snapshot,
) -> Option<SynthesizedCommand> {
    let array_path = path.parent()?;
    let array_present = matches!(current.get(&array_path), Some(Value::Array(_)));
    if current.origin() == SnapshotOrigin::Missing || !array_present {
        debug!(
            domain = %target,
            path = %path,
            "array of removed element not found in current state; skipping"
        );
        return None;
    }

    Some(SynthesizedCommand {
        target: target.clone(),
        path: path.clone(),
        operation: Operation::Delete,
        primary: plistbuddy(target, &[format!("Delete {}", pb_path(path))]),
        alternate: Vec::new(),
        warnings: Vec::new(),
        payload: None,
        placeholder: false,
    })
}
