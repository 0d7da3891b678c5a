// src/provider/text.rs

//! Parser for the old-style property list text that `defaults read` prints.
//!
//! ```text
//! {
//!     autohide = 1;
//!     "persistent-apps" =     (
//!                 {
//!             "tile-type" = "file-tile";
//!         }
//!     );
//!     tilesize = 48;
//! }
//! ```
//!
//! The parser is line based and forgiving: a line it cannot make sense of is
//! counted and skipped, and the rest of the rendering is still used. Scalar
//! values are kept as raw tokens (`Value::String`) with their quoting intact,
//! so the inferencer sees exactly what the store printed.

use crate::value::{Record, Value};

/// Result of parsing one rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedText {
    pub tree: Value,
    /// Number of lines that were skipped as malformed.
    pub skipped: usize,
}

#[derive(Debug)]
enum Frame {
    Record { key: Option<String>, fields: Record },
    Array { key: Option<String>, items: Vec<Value> },
}

impl Frame {
    fn close(self) -> (Option<String>, Value) {
        match self {
            Frame::Record { key, fields } => (key, Value::Record(fields)),
            Frame::Array { key, items } => (key, Value::Array(items)),
        }
    }
}

/// Parse a rendering. Empty input (a domain that does not exist) is an empty
/// record.
pub fn parse_text(input: &str) -> ParsedText {
    let mut stack: Vec<Frame> = Vec::new();
    let mut root: Option<Value> = None;
    let mut skipped = 0usize;

    for raw_line in input.lines() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }

        if stack.is_empty() {
            match line {
                "{" => stack.push(Frame::Record { key: None, fields: Record::new() }),
                "(" => stack.push(Frame::Array { key: None, items: Vec::new() }),
                _ if root.is_none() => {
                    // A bare scalar rendering (`defaults read <domain> <key>`).
                    root = Some(Value::String(line.to_string()));
                }
                _ => skipped += 1,
            }
            continue;
        }

        if is_closer(line) {
            if let Some(frame) = stack.pop() {
                attach(&mut stack, &mut root, frame);
            }
            continue;
        }

        let in_array = matches!(stack.last(), Some(Frame::Array { .. }));
        let ok = if in_array {
            array_line(&mut stack, line)
        } else {
            record_line(&mut stack, line)
        };
        if !ok {
            skipped += 1;
        }
    }

    // Unterminated containers are closed at end of input.
    while let Some(frame) = stack.pop() {
        attach(&mut stack, &mut root, frame);
    }

    ParsedText {
        tree: root.unwrap_or_else(Value::empty_record),
        skipped,
    }
}

fn is_closer(line: &str) -> bool {
    matches!(line, "}" | "};" | "}," | ")" | ");" | "),")
}

fn attach(stack: &mut [Frame], root: &mut Option<Value>, frame: Frame) {
    let (key, value) = frame.close();
    match stack.last_mut() {
        Some(Frame::Record { fields, .. }) => {
            if let Some(key) = key {
                fields.insert(key, value);
            }
        }
        Some(Frame::Array { items, .. }) => items.push(value),
        None => *root = Some(value),
    }
}

fn record_line(stack: &mut Vec<Frame>, line: &str) -> bool {
    let Some((key, rest)) = split_assignment(line) else {
        return false;
    };
    match rest {
        "{" => stack.push(Frame::Record { key: Some(key), fields: Record::new() }),
        "(" => stack.push(Frame::Array { key: Some(key), items: Vec::new() }),
        "{};" | "{ };" => insert_field(stack, key, Value::empty_record()),
        "();" | "( );" => insert_field(stack, key, Value::Array(Vec::new())),
        _ => {
            let Some(token) = rest.strip_suffix(';') else {
                return false;
            };
            let token = token.trim();
            if token.is_empty() {
                return false;
            }
            insert_field(stack, key, Value::String(token.to_string()));
        }
    }
    true
}

fn insert_field(stack: &mut [Frame], key: String, value: Value) {
    if let Some(Frame::Record { fields, .. }) = stack.last_mut() {
        fields.insert(key, value);
    }
}

fn array_line(stack: &mut Vec<Frame>, line: &str) -> bool {
    match line {
        "{" => stack.push(Frame::Record { key: None, fields: Record::new() }),
        "(" => stack.push(Frame::Array { key: None, items: Vec::new() }),
        _ => {
            let token = line.strip_suffix(',').unwrap_or(line).trim();
            if token.is_empty() {
                return false;
            }
            let value = match token {
                "{}" | "{ }" => Value::empty_record(),
                "()" | "( )" => Value::Array(Vec::new()),
                _ => Value::String(token.to_string()),
            };
            if let Some(Frame::Array { items, .. }) = stack.last_mut() {
                items.push(value);
            }
        }
    }
    true
}

/// Split `key = rest` where `key` may be quoted. Returns the unquoted key and
/// the trimmed remainder.
fn split_assignment(line: &str) -> Option<(String, &str)> {
    if let Some(body) = line.strip_prefix('"') {
        let mut key = String::new();
        let mut chars = body.char_indices();
        while let Some((i, c)) = chars.next() {
            match c {
                '\\' => {
                    let (_, escaped) = chars.next()?;
                    key.push(escaped);
                }
                '"' => {
                    let rest = body[i + 1..].trim_start().strip_prefix('=')?;
                    return Some((key, rest.trim()));
                }
                other => key.push(other),
            }
        }
        return None;
    }

    let (key, rest) = line.split_once(" = ")?;
    let key = key.trim();
    if key.is_empty() || key.contains(char::is_whitespace) {
        return None;
    }
    Some((key.to_string(), rest.trim()))
}

/// Render a typed tree the way `parse_text` would have produced it from the
/// store's own rendering: strings quoted unless they are a plain word, bools
/// as `1`/`0`, numbers in their shortest decimal form. Keys are unchanged.
pub fn lower_to_tokens(value: &Value) -> Value {
    match value {
        Value::String(text) => Value::String(quote_token(text)),
        Value::Bool(flag) => Value::String(if *flag { "1" } else { "0" }.to_string()),
        Value::Integer(n) => Value::String(n.to_string()),
        Value::Float(x) => Value::String(x.to_string()),
        Value::Array(items) => Value::Array(items.iter().map(lower_to_tokens).collect()),
        Value::Record(fields) => Value::Record(
            fields
                .iter()
                .map(|(key, field)| (key.clone(), lower_to_tokens(field)))
                .collect(),
        ),
        Value::Absent => Value::Absent,
    }
}

fn quote_token(text: &str) -> String {
    let bare = !text.is_empty() && text.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if bare {
        return text.to_string();
    }
    let mut quoted = String::with_capacity(text.len() + 2);
    quoted.push('"');
    for c in text.chars() {
        if matches!(c, '"' | '\\') {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}
