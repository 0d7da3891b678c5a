// src/synth/render.rs

//! Text rendering for the two command syntaxes.
//!
//! - `defaults` is the primary syntax: readable, and what administrators
//!   expect in deployment scripts. It can only address top-level keys (plus
//!   one level of `-dict-add`).
//! - PlistBuddy is the structural-edit syntax: it addresses any nested path,
//!   including array indices, against the backing plist file.

use crate::snapshot::Target;
use crate::value::{Inferred, KeyPath, Segment, Value, ValueKind};

pub const PLISTBUDDY: &str = "/usr/libexec/PlistBuddy";

/// Quote `s` for a POSIX shell using single quotes when needed.
pub fn sh_quote(s: &str) -> String {
    let safe = !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '/' | ':' | '@' | '+'));
    if safe {
        return s.to_string();
    }
    format!("'{}'", s.replace('\'', r"'\''"))
}

/// Escape `s` for use inside a double-quoted shell word.
pub fn dq_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '\\' | '"' | '$' | '`') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn defaults_prefix(target: &Target, verb: &str) -> String {
    let host = if target.is_current_host() { " -currentHost" } else { "" };
    format!("defaults{host} {verb} {}", sh_quote(&target.defaults_arg()))
}

/// `defaults write <domain> <key> <args>`
pub fn defaults_write(target: &Target, key: &str, args: &str) -> String {
    format!("{} {} {args}", defaults_prefix(target, "write"), sh_quote(key))
}

/// `defaults delete <domain> <key>`
pub fn defaults_delete(target: &Target, key: &str) -> String {
    format!("{} {}", defaults_prefix(target, "delete"), sh_quote(key))
}

/// Value arguments for `defaults write`.
///
/// Scalars get an explicit type flag; containers are passed as a single XML
/// plist fragment, which `defaults` parses into typed values.
pub fn defaults_value_args(inferred: &Inferred) -> String {
    match inferred.kind {
        ValueKind::Unknown => inferred.literal.clone(),
        ValueKind::Array | ValueKind::Record => sh_quote(&inferred.literal),
        ValueKind::String => format!("-string {}", sh_quote(&inferred.literal)),
        kind => format!(
            "{} {}",
            kind.defaults_flag().unwrap_or_default(),
            inferred.literal
        ),
    }
}

/// Shell expression for the plist file backing `target`.
pub fn plist_file_expr(target: &Target) -> String {
    if let Some(path) = target.file_path() {
        return format!("\"{}\"", dq_escape(&path.display().to_string()));
    }
    let domain = dq_escape(target.name());
    if target.is_current_host() {
        format!("\"$HOME/Library/Preferences/ByHost/{domain}.$HOST_UUID.plist\"")
    } else {
        format!("\"$HOME/Library/Preferences/{domain}.plist\"")
    }
}

/// PlistBuddy entry path, e.g. `:persistent-apps:3:tile-data`.
pub fn pb_path(path: &KeyPath) -> String {
    let mut out = String::new();
    for segment in path.segments() {
        out.push(':');
        match segment {
            Segment::Key(k) => out.push_str(&pb_key(k)),
            Segment::Index(i) => out.push_str(&i.to_string()),
        }
    }
    out
}

/// Escape one key for a PlistBuddy entry. PlistBuddy splits its command on
/// whitespace and the entry on `:`, so both are backslash-escaped along with
/// quotes and the backslash itself.
pub fn pb_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for c in key.chars() {
        if c.is_whitespace() || matches!(c, ':' | '\\' | '\'' | '"') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Scalar literal for a PlistBuddy clause. Strings are single-quoted with
/// backslash and quote escaped, as PlistBuddy's own parser expects.
pub fn pb_literal(inferred: &Inferred) -> String {
    match inferred.kind {
        ValueKind::String => {
            let escaped = inferred.literal.replace('\\', r"\\").replace('\'', r"\'");
            format!("'{escaped}'")
        }
        _ => inferred.literal.clone(),
    }
}

/// `Add` clauses creating `value` at `path`, recursing into containers.
pub fn pb_add_clauses(path: &KeyPath, value: &Value, out: &mut Vec<String>) {
    let entry = pb_path(path);
    match value {
        Value::Record(fields) => {
            out.push(format!("Add {entry} dict"));
            for (k, v) in fields {
                pb_add_clauses(&path.child_key(k.clone()), v, out);
            }
        }
        Value::Array(items) => {
            out.push(format!("Add {entry} array"));
            for (i, v) in items.iter().enumerate() {
                pb_add_clauses(&path.child_index(i), v, out);
            }
        }
        scalar => {
            let inferred = crate::value::infer_value(scalar);
            out.push(format!(
                "Add {entry} {} {}",
                inferred.kind.plistbuddy_type(),
                pb_literal(&inferred)
            ));
        }
    }
}

/// A full PlistBuddy invocation running `clauses` in order.
pub fn plistbuddy(target: &Target, clauses: &[String]) -> String {
    let mut out = String::from(PLISTBUDDY);
    for clause in clauses {
        out.push_str(" -c \"");
        out.push_str(&dq_escape(clause));
        out.push('"');
    }
    out.push(' ');
    out.push_str(&plist_file_expr(target));
    out
}
