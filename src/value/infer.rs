// src/value/infer.rs

//! Type inference for raw preference values.
//!
//! Typed tree values render straight from their variant. Raw tokens (from the
//! text rendering of a domain) are classified with a fixed precedence, first
//! match wins:
//!
//! 1. boolean tokens: `true` / `false` (any case) and the bare `0` / `1`
//! 2. integer: optional sign, digits only
//! 3. float: optional sign, digits, exactly one decimal point
//! 4. quoted string: one layer of quotes stripped, `\\` and `\"` un-escaped
//! 5. structured lookup through a [`TypedLookup`]
//!
//! When everything fails the result is [`ValueKind::Unknown`] with a
//! placeholder literal; callers must flag the resulting command.

use std::sync::LazyLock;

use regex::Regex;

use super::plist::to_xml_fragment;
use super::{KeyPath, Value, ValueKind};

static INTEGER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[+-]?[0-9]+$").expect("valid integer regex"));

static FLOAT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?(?:[0-9]+\.[0-9]*|\.[0-9]+)$").expect("valid float regex")
});

/// Result of classifying a value.
#[derive(Debug, Clone, PartialEq)]
pub struct Inferred {
    pub kind: ValueKind,
    /// Canonical literal, unquoted. Containers render as XML plist fragments.
    pub literal: String,
    /// The typed value, when one could be determined.
    pub value: Option<Value>,
}

impl Inferred {
    pub fn is_unknown(&self) -> bool {
        self.kind == ValueKind::Unknown
    }

    fn unknown(raw: &str) -> Self {
        Self {
            kind: ValueKind::Unknown,
            literal: format!("<type> {raw}"),
            value: None,
        }
    }
}

/// Typed extraction used as the last inference step for raw tokens.
pub trait TypedLookup {
    fn extract(&self, path: &KeyPath) -> Option<Value>;
}

/// Lookup that never knows anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLookup;

impl TypedLookup for NoLookup {
    fn extract(&self, _path: &KeyPath) -> Option<Value> {
        None
    }
}

/// Render a typed value.
pub fn infer_value(value: &Value) -> Inferred {
    let literal = match value {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Float(f) => float_literal(*f),
        Value::Array(_) | Value::Record(_) => to_xml_fragment(value),
        Value::Absent => return Inferred::unknown("<absent>"),
    };
    Inferred {
        kind: value.kind(),
        literal,
        value: Some(value.clone()),
    }
}

/// Classify a raw token at `path`.
pub fn infer_token(raw: &str, lookup: &dyn TypedLookup, path: &KeyPath) -> Inferred {
    let token = raw.trim();

    if let Some(b) = parse_bool_token(token) {
        return infer_value(&Value::Bool(b));
    }

    if INTEGER_RE.is_match(token) {
        if let Ok(i) = token.trim_start_matches('+').parse::<i64>() {
            return infer_value(&Value::Integer(i));
        }
    }

    if FLOAT_RE.is_match(token) {
        if let Ok(f) = token.parse::<f64>() {
            return infer_value(&Value::Float(f));
        }
    }

    if let Some(s) = unquote(token) {
        return infer_value(&Value::String(s));
    }

    match lookup.extract(path) {
        Some(value @ Value::String(_)) => infer_value(&value),
        Some(value @ Value::Bool(_)) => infer_value(&value),
        Some(value @ Value::Integer(_)) => infer_value(&value),
        Some(value @ Value::Float(_)) => infer_value(&value),
        Some(value @ Value::Array(_)) => infer_value(&value),
        Some(value @ Value::Record(_)) => infer_value(&value),
        Some(Value::Absent) | None => Inferred::unknown(token),
    }
}

/// Resolve a tree of raw tokens into typed values.
///
/// Returns the first token that could not be classified as the error.
pub fn resolve_tokens(
    value: &Value,
    lookup: &dyn TypedLookup,
    path: &KeyPath,
) -> Result<Value, String> {
    match value {
        Value::String(token) => {
            let inferred = infer_token(token, lookup, path);
            inferred.value.ok_or_else(|| token.clone())
        }
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, v)| resolve_tokens(v, lookup, &path.child_index(i)))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Value::Record(fields) => fields
            .iter()
            .map(|(k, v)| {
                let resolved = resolve_tokens(v, lookup, &path.child_key(k.clone()))?;
                Ok::<_, String>((k.clone(), resolved))
            })
            .collect::<Result<_, String>>()
            .map(Value::Record),
        other => Ok(other.clone()),
    }
}

fn parse_bool_token(token: &str) -> Option<bool> {
    // Bare 0/1 are read as booleans; a genuine small integer is
    // indistinguishable without a schema.
    match token {
        "1" => return Some(true),
        "0" => return Some(false),
        _ => {}
    }
    if token.eq_ignore_ascii_case("true") {
        Some(true)
    } else if token.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

/// Strip one layer of double or single quotes and un-escape `\\` / `\"`.
fn unquote(token: &str) -> Option<String> {
    let quote = token.chars().next()?;
    if !(quote == '"' || quote == '\'') || token.len() < 2 || !token.ends_with(quote) {
        return None;
    }
    let inner = &token[1..token.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(next @ ('\\' | '"' | '\'')) => out.push(next),
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    Some(out)
}

/// Floats always carry a decimal point so they never read back as integers.
fn float_literal(f: f64) -> String {
    let s = f.to_string();
    if s.contains('.') || s.contains('e') || s.contains("inf") || s.contains("NaN") {
        s
    } else {
        format!("{s}.0")
    }
}
