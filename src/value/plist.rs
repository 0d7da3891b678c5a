// src/value/plist.rs

//! XML property-list fragments.
//!
//! `defaults write` accepts an XML plist fragment as a value argument, which
//! is the only way to pass a typed nested record or array in one command.

use super::Value;

/// Render `value` as a compact, single-line XML plist fragment.
pub fn to_xml_fragment(value: &Value) -> String {
    let mut out = String::new();
    write_xml(value, &mut out);
    out
}

fn write_xml(value: &Value, out: &mut String) {
    match value {
        Value::String(s) => {
            out.push_str("<string>");
            out.push_str(&xml_escape(s));
            out.push_str("</string>");
        }
        Value::Bool(true) => out.push_str("<true/>"),
        Value::Bool(false) => out.push_str("<false/>"),
        Value::Integer(i) => {
            out.push_str("<integer>");
            out.push_str(&i.to_string());
            out.push_str("</integer>");
        }
        Value::Float(f) => {
            out.push_str("<real>");
            out.push_str(&f.to_string());
            out.push_str("</real>");
        }
        Value::Array(items) => {
            out.push_str("<array>");
            for item in items {
                write_xml(item, out);
            }
            out.push_str("</array>");
        }
        Value::Record(fields) => {
            out.push_str("<dict>");
            for (k, v) in fields {
                out.push_str("<key>");
                out.push_str(&xml_escape(k));
                out.push_str("</key>");
                write_xml(v, out);
            }
            out.push_str("</dict>");
        }
        Value::Absent => out.push_str("<string/>"),
    }
}

pub fn xml_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            other => out.push(other),
        }
    }
    out
}
