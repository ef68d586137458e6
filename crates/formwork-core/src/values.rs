//! Flat and nested value maps.
//!
//! Field names may use dotted/bracketed paths (`profile.email`,
//! `phones[0].number`). The registry stores values flat, keyed by the full
//! name; [`combine_field_values`] folds a flat map into a nested
//! `serde_json::Value` tree for submission callbacks and `nest`ed reads.

use indexmap::IndexMap;
use serde_json::{Map, Value};

/// Flat, registration-ordered snapshot of field values.
pub type FieldValues = IndexMap<String, Value>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Segment {
    Key(String),
    Index(usize),
}

/// Split `a.b[2].c` into `[Key(a), Key(b), Index(2), Key(c)]`. Malformed
/// bracket content falls back to a literal key segment.
pub fn parse_path(name: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    for part in name.split('.') {
        let mut rest = part;
        while let Some(open) = rest.find('[') {
            if open > 0 {
                segments.push(Segment::Key(rest[..open].to_string()));
            }
            match rest[open..].find(']') {
                Some(close) => {
                    let inner = &rest[open + 1..open + close];
                    match inner.parse::<usize>() {
                        Ok(i) => segments.push(Segment::Index(i)),
                        Err(_) => segments.push(Segment::Key(inner.to_string())),
                    }
                    rest = &rest[open + close + 1..];
                }
                None => {
                    segments.push(Segment::Key(rest[open..].to_string()));
                    rest = "";
                }
            }
        }
        if !rest.is_empty() {
            segments.push(Segment::Key(rest.to_string()));
        }
    }
    segments
}

fn set_path(root: &mut Value, segments: &[Segment], value: Value) {
    let Some(head) = segments.first() else { return };
    let rest = &segments[1..];
    match head {
        Segment::Key(key) => {
            if !root.is_object() {
                *root = Value::Object(Map::new());
            }
            if let Value::Object(map) = root {
                let slot = map.entry(key.clone()).or_insert(Value::Null);
                if rest.is_empty() {
                    *slot = value;
                } else {
                    set_path(slot, rest, value);
                }
            }
        }
        Segment::Index(i) => {
            if !root.is_array() {
                *root = Value::Array(Vec::new());
            }
            if let Value::Array(arr) = root {
                while arr.len() <= *i {
                    arr.push(Value::Null);
                }
                if rest.is_empty() {
                    arr[*i] = value;
                } else {
                    set_path(&mut arr[*i], rest, value);
                }
            }
        }
    }
}

/// Fold a flat value map into a nested value tree.
pub fn combine_field_values(flat: &FieldValues) -> Value {
    let mut root = Value::Object(Map::new());
    for (name, value) in flat {
        let segments = parse_path(name);
        set_path(&mut root, &segments, value.clone());
    }
    root
}

/// Walk a nested value along a parsed path.
pub fn get_path(root: &Value, segments: &[Segment]) -> Option<Value> {
    let mut current = root;
    for segment in segments {
        current = match segment {
            Segment::Key(key) => current.as_object()?.get(key)?,
            Segment::Index(i) => current.as_array()?.get(*i)?,
        };
    }
    Some(current.clone())
}

/// Look up a configured default for `name`: exact key first, then a
/// dotted-path walk into nested default values.
pub fn get_default_value(defaults: &FieldValues, name: &str) -> Option<Value> {
    if let Some(v) = defaults.get(name) {
        return Some(v.clone());
    }
    let combined = combine_field_values(defaults);
    get_path(&combined, &parse_path(name))
}
