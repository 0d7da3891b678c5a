// src/value/mod.rs

//! Preference value model.
//!
//! - [`Value`] is the tagged union every snapshot tree is built from.
//! - [`path`] addresses nodes inside a tree.
//! - [`infer`] classifies raw tokens and renders canonical literals.
//! - [`plist`] renders values as XML property-list fragments.

pub mod infer;
pub mod path;
pub mod plist;

use std::fmt;

use indexmap::IndexMap;

pub use infer::{infer_token, infer_value, Inferred, NoLookup, TypedLookup};
pub use path::{KeyPath, Segment};

/// Ordered record type; field order is preserved from the source.
pub type Record = IndexMap<String, Value>;

/// A single preference value.
///
/// `PartialEq` is strict structural equality (arrays compare by position,
/// records by key set, a NaN real equals itself). Use [`Value::equivalent`]
/// where element order of arrays must not matter.
#[derive(Debug, Clone)]
pub enum Value {
    String(String),
    Bool(bool),
    Integer(i64),
    Float(f64),
    Array(Vec<Value>),
    Record(Record),
    Absent,
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Record(a), Value::Record(b)) => a == b,
            (Value::Absent, Value::Absent) => true,
            _ => false,
        }
    }
}

/// Coarse type of a value as understood by the command renderers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    String,
    Bool,
    Integer,
    Float,
    Array,
    Record,
    Unknown,
}

impl ValueKind {
    /// Type flag used by `defaults write`.
    pub fn defaults_flag(self) -> Option<&'static str> {
        match self {
            ValueKind::String => Some("-string"),
            ValueKind::Bool => Some("-bool"),
            ValueKind::Integer => Some("-int"),
            ValueKind::Float => Some("-float"),
            ValueKind::Array => Some("-array"),
            ValueKind::Record => Some("-dict"),
            ValueKind::Unknown => None,
        }
    }

    /// Type name used by PlistBuddy `Add`.
    pub fn plistbuddy_type(self) -> &'static str {
        match self {
            ValueKind::String => "string",
            ValueKind::Bool => "bool",
            ValueKind::Integer => "integer",
            ValueKind::Float => "real",
            ValueKind::Array => "array",
            ValueKind::Record => "dict",
            ValueKind::Unknown => "<type>",
        }
    }

    pub fn is_container(self) -> bool {
        matches!(self, ValueKind::Array | ValueKind::Record)
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ValueKind::String => "string",
            ValueKind::Bool => "bool",
            ValueKind::Integer => "integer",
            ValueKind::Float => "float",
            ValueKind::Array => "array",
            ValueKind::Record => "record",
            ValueKind::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

impl Value {
    pub fn empty_record() -> Self {
        Value::Record(Record::new())
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Value::String(_) => ValueKind::String,
            Value::Bool(_) => ValueKind::Bool,
            Value::Integer(_) => ValueKind::Integer,
            Value::Float(_) => ValueKind::Float,
            Value::Array(_) => ValueKind::Array,
            Value::Record(_) => ValueKind::Record,
            Value::Absent => ValueKind::Unknown,
        }
    }

    pub fn is_container(&self) -> bool {
        matches!(self, Value::Array(_) | Value::Record(_))
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Value::Absent)
    }

    /// Structural equality where arrays compare as multisets, recursively.
    ///
    /// Reordering the elements of any array (at any depth) keeps two values
    /// equivalent.
    pub fn equivalent(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Array(a), Value::Array(b)) => {
                if a.len() != b.len() {
                    return false;
                }
                let mut used = vec![false; b.len()];
                a.iter().all(|x| {
                    match b
                        .iter()
                        .enumerate()
                        .position(|(j, y)| !used[j] && x.equivalent(y))
                    {
                        Some(j) => {
                            used[j] = true;
                            true
                        }
                        None => false,
                    }
                })
            }
            (Value::Record(a), Value::Record(b)) => {
                a.len() == b.len()
                    && a
                        .iter()
                        .all(|(k, v)| b.get(k).is_some_and(|w| v.equivalent(w)))
            }
            _ => self == other,
        }
    }

    /// Look up the node at `path`. The root path returns `self`.
    pub fn get(&self, path: &KeyPath) -> Option<&Value> {
        let mut node = self;
        for segment in path.segments() {
            node = match (node, segment) {
                (Value::Record(r), Segment::Key(k)) => r.get(k)?,
                (Value::Array(a), Segment::Index(i)) => a.get(*i)?,
                _ => return None,
            };
        }
        Some(node)
    }

    pub fn get_mut(&mut self, path: &KeyPath) -> Option<&mut Value> {
        let mut node = self;
        for segment in path.segments() {
            node = match (node, segment) {
                (Value::Record(r), Segment::Key(k)) => r.get_mut(k)?,
                (Value::Array(a), Segment::Index(i)) => a.get_mut(*i)?,
                _ => return None,
            };
        }
        Some(node)
    }

    /// Set the node at `path`, creating the last segment if needed.
    ///
    /// Returns `false` when the parent does not exist or has the wrong shape.
    /// An index equal to the array length appends.
    pub fn set(&mut self, path: &KeyPath, value: Value) -> bool {
        let Some(parent_path) = path.parent() else {
            *self = value;
            return true;
        };
        let Some(parent) = self.get_mut(&parent_path) else {
            return false;
        };
        match (parent, path.last()) {
            (Value::Record(r), Some(Segment::Key(k))) => {
                r.insert(k.clone(), value);
                true
            }
            (Value::Array(a), Some(Segment::Index(i))) if *i < a.len() => {
                a[*i] = value;
                true
            }
            (Value::Array(a), Some(Segment::Index(i))) if *i == a.len() => {
                a.push(value);
                true
            }
            _ => false,
        }
    }

    /// Remove and return the node at `path`.
    pub fn remove(&mut self, path: &KeyPath) -> Option<Value> {
        let parent_path = path.parent()?;
        let parent = self.get_mut(&parent_path)?;
        match (parent, path.last()) {
            (Value::Record(r), Some(Segment::Key(k))) => r.shift_remove(k),
            (Value::Array(a), Some(Segment::Index(i))) if *i < a.len() => Some(a.remove(*i)),
            _ => None,
        }
    }

    /// Ordered leaf view of the tree: every scalar and every empty container,
    /// keyed by its path.
    pub fn leaves(&self) -> Vec<(KeyPath, &Value)> {
        let mut out = Vec::new();
        collect_leaves(self, KeyPath::root(), &mut out);
        out
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Integer(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Array(a) => serde_json::Value::Array(a.iter().map(Value::to_json).collect()),
            Value::Record(r) => serde_json::Value::Object(
                r.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
            Value::Absent => serde_json::Value::Null,
        }
    }
}

fn collect_leaves<'a>(value: &'a Value, path: KeyPath, out: &mut Vec<(KeyPath, &'a Value)>) {
    match value {
        Value::Record(r) if !r.is_empty() => {
            for (k, v) in r {
                collect_leaves(v, path.child_key(k.clone()), out);
            }
        }
        Value::Array(a) if !a.is_empty() => {
            for (i, v) in a.iter().enumerate() {
                collect_leaves(v, path.child_index(i), out);
            }
        }
        _ => {
            if !path.is_root() {
                out.push((path, value));
            }
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Absent,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => Value::Float(n.as_f64().unwrap_or(0.0)),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(a) => Value::Array(a.into_iter().map(Value::from).collect()),
            serde_json::Value::Object(o) => {
                Value::Record(o.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Absent => f.write_str("<absent>"),
            Value::String(s) => write!(f, "{s:?}"),
            other => write!(f, "{}", other.to_json()),
        }
    }
}
