//! Cycle-safe serialization of value graphs
//!
//! [`decycle`] turns a graph that may contain duplicate references or cycles
//! into a tree in which every repeated node is replaced by a marker object
//! `{"$ref": PATH}`. PATH is a JSONPath-style expression (`$`, `[0]`,
//! `["key"]`) locating the first occurrence of that node. [`retrocycle`]
//! reverses the transform.

use crate::value::Value;
use chrono::SecondsFormat;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};

/// Member name of a back-reference marker
pub const REF_KEY: &str = "$ref";

/// Deepest nesting [`decycle`] copies; nodes below it become `null`
pub const MAX_DEPTH: usize = 512;

/// Grammar a marker path must match before [`retrocycle`] will follow it
static PATH_GRAMMAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"^\$(?:\[(?:\d+|"(?:[^\\"\x00-\x1f]|\\(?:[\\"/bfnrt]|u[0-9a-zA-Z]{4}))*")\])*$"#,
    )
    .expect("path grammar is a valid regex")
});

/// One step of a marker path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Index(usize),
    Key(String),
}

/// Deep-copy `value` into an acyclic tree
///
/// Dates, patterns and scalars are copied as-is. Arrays are walked in index
/// order, objects in property order, so the first occurrence of a node is
/// always the one a depth-first walk meets first.
///
/// Arrays and objects nested more than [`MAX_DEPTH`] levels below the root
/// are replaced by `null`, which bounds the recursion of every serializer
/// built on this function.
pub fn decycle(value: &Value) -> Value {
    let mut seen = HashMap::new();
    derez(value, "$", 0, &mut seen)
}

fn derez(
    value: &Value,
    path: &str,
    depth: usize,
    seen: &mut HashMap<usize, String>,
) -> Value {
    let Some(id) = value.node_id() else {
        return value.clone();
    };
    if let Some(first) = seen.get(&id) {
        return Value::object([(REF_KEY, Value::String(first.clone()))]);
    }
    if depth > MAX_DEPTH {
        return Value::Null;
    }
    seen.insert(id, path.to_string());

    match value {
        Value::Array(items) => {
            let items = items.borrow();
            let copied: Vec<Value> = items
                .iter()
                .enumerate()
                .map(|(i, item)| derez(item, &format!("{}[{}]", path, i), depth + 1, seen))
                .collect();
            Value::array(copied)
        }
        Value::Object(map) => {
            let map = map.borrow();
            let copied: Vec<(String, Value)> = map
                .iter()
                .map(|(key, item)| {
                    let child = format!("{}[{}]", path, quote_key(key));
                    (key.clone(), derez(item, &child, depth + 1, seen))
                })
                .collect();
            Value::object(copied)
        }
        other => other.clone(),
    }
}

fn quote_key(key: &str) -> String {
    serde_json::to_string(key).unwrap_or_else(|_| format!("\"{}\"", key))
}

/// Replace every well-formed `{"$ref": PATH}` marker in `root` with the node
/// PATH points to, in place, and return the root
///
/// Markers whose path does not match the grammar, or does not resolve, are
/// left untouched. The walk recurses once per nesting level, so `root` should
/// be a tree produced by [`decycle`].
pub fn retrocycle(root: Value) -> Value {
    let mut visited = HashSet::new();
    rez(&root, &root, &mut visited);
    root
}

fn rez(node: &Value, root: &Value, visited: &mut HashSet<usize>) {
    let Some(id) = node.node_id() else {
        return;
    };
    if !visited.insert(id) {
        return;
    }

    match node {
        Value::Array(items) => {
            let mut replacements = Vec::new();
            let mut descend = Vec::new();
            for (i, item) in items.borrow().iter().enumerate() {
                match marker_target(item, root) {
                    Some(target) => replacements.push((i, target)),
                    None if item.is_node() => descend.push(item.clone()),
                    None => {}
                }
            }
            {
                let mut items = items.borrow_mut();
                for (i, target) in replacements {
                    items[i] = target;
                }
            }
            for child in descend {
                rez(&child, root, visited);
            }
        }
        Value::Object(map) => {
            let mut replacements = Vec::new();
            let mut descend = Vec::new();
            for (key, item) in map.borrow().iter() {
                match marker_target(item, root) {
                    Some(target) => replacements.push((key.clone(), target)),
                    None if item.is_node() => descend.push(item.clone()),
                    None => {}
                }
            }
            {
                let mut map = map.borrow_mut();
                for (key, target) in replacements {
                    if let Some(slot) = map.get_mut(&key) {
                        *slot = target;
                    }
                }
            }
            for child in descend {
                rez(&child, root, visited);
            }
        }
        _ => {}
    }
}

/// The node a marker refers to, if `item` is a well-formed, resolvable marker
fn marker_target(item: &Value, root: &Value) -> Option<Value> {
    let Value::Object(map) = item else {
        return None;
    };
    let path = match map.borrow().get(REF_KEY) {
        Some(Value::String(path)) => path.clone(),
        _ => return None,
    };
    if !is_valid_path(&path) {
        return None;
    }
    resolve_path(root, &path)
}

/// Whether `path` matches the marker path grammar
pub fn is_valid_path(path: &str) -> bool {
    PATH_GRAMMAR.is_match(path)
}

/// Split a marker path into its segments
pub fn parse_path(path: &str) -> Option<Vec<PathSegment>> {
    if !is_valid_path(path) {
        return None;
    }

    let mut segments = Vec::new();
    let mut rest = &path[1..];
    while !rest.is_empty() {
        rest = rest.strip_prefix('[')?;
        if rest.starts_with('"') {
            let end = closing_quote(rest)?;
            let key: String = serde_json::from_str(&rest[..=end]).ok()?;
            segments.push(PathSegment::Key(key));
            rest = rest[end + 1..].strip_prefix(']')?;
        } else {
            let end = rest.find(']')?;
            segments.push(PathSegment::Index(rest[..end].parse().ok()?));
            rest = &rest[end + 1..];
        }
    }
    Some(segments)
}

/// Byte offset of the quote closing the JSON string literal that opens `s`
fn closing_quote(s: &str) -> Option<usize> {
    let mut escaped = false;
    for (i, c) in s.char_indices().skip(1) {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            '"' => return Some(i),
            _ => {}
        }
    }
    None
}

/// Evaluate a marker path against `root`
pub fn resolve_path(root: &Value, path: &str) -> Option<Value> {
    let segments = parse_path(path)?;
    segments
        .iter()
        .try_fold(root.clone(), |current, segment| match (segment, &current) {
            (PathSegment::Index(i), Value::Array(_)) => current.index(*i),
            (PathSegment::Index(i), Value::Object(_)) => current.get(&i.to_string()),
            (PathSegment::Key(key), Value::Object(_)) => current.get(key),
            (PathSegment::Key(key), Value::Array(_)) => {
                key.parse::<usize>().ok().and_then(|i| current.index(i))
            }
            _ => None,
        })
}

/// JSON form of `decycle(value)`; `None` when the value is undefined
pub fn to_json(value: &Value) -> Option<serde_json::Value> {
    tree_to_json(&decycle(value))
}

/// Compact JSON text of `decycle(value)`; `None` when the value is undefined
pub fn stringify(value: &Value) -> Option<String> {
    to_json(value).map(|json| json.to_string())
}

/// Indented (2-space) JSON text of `decycle(value)`
pub fn stringify_pretty(value: &Value) -> Option<String> {
    to_json(value).and_then(|json| serde_json::to_string_pretty(&json).ok())
}

// Only called on decycled trees, which are finite
fn tree_to_json(value: &Value) -> Option<serde_json::Value> {
    use serde_json::Value as Json;

    match value {
        Value::Undefined => None,
        Value::Null => Some(Json::Null),
        Value::Bool(b) => Some(Json::Bool(*b)),
        Value::Number(n) => Some(number_to_json(*n)),
        Value::String(s) => Some(Json::String(s.clone())),
        Value::Date(date) => Some(Json::String(date.to_rfc3339_opts(SecondsFormat::Millis, true))),
        Value::Pattern(source) => Some(Json::String(format!("/{}/", source))),
        Value::Array(items) => Some(Json::Array(
            items
                .borrow()
                .iter()
                .map(|item| tree_to_json(item).unwrap_or(Json::Null))
                .collect(),
        )),
        Value::Object(map) => Some(Json::Object(
            map.borrow()
                .iter()
                .filter_map(|(key, item)| tree_to_json(item).map(|json| (key.clone(), json)))
                .collect(),
        )),
    }
}

const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

fn number_to_json(n: f64) -> serde_json::Value {
    if !n.is_finite() {
        return serde_json::Value::Null;
    }
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        return serde_json::Value::from(n as i64);
    }
    serde_json::Number::from_f64(n).map_or(serde_json::Value::Null, serde_json::Value::Number)
}
