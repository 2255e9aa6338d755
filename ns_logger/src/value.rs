//! Dynamic value graph handed to the logger as structured payload
//!
//! Arrays and objects are shared, mutable nodes, so a graph may contain
//! duplicate references and cycles. Cloning a `Value` that holds a node
//! clones the reference, not the contents.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

/// Shared array node
pub type ArrayRef = Rc<RefCell<Vec<Value>>>;

/// Shared object node; properties keep insertion order
pub type ObjectRef = Rc<RefCell<IndexMap<String, Value>>>;

#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    /// Atomic timestamp; never decomposed
    Date(DateTime<Utc>),
    /// Atomic regular-expression source; never decomposed
    Pattern(String),
    Array(ArrayRef),
    Object(ObjectRef),
}

impl Value {
    /// A new array node
    pub fn array(items: impl IntoIterator<Item = Value>) -> Self {
        Value::Array(Rc::new(RefCell::new(items.into_iter().collect())))
    }

    /// A new object node
    pub fn object<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        Value::Object(Rc::new(RefCell::new(
            entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        )))
    }

    /// An empty object node
    pub fn empty_object() -> Self {
        Value::Object(Rc::new(RefCell::new(IndexMap::new())))
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// True for arrays and objects, the only kinds with identity
    pub fn is_node(&self) -> bool {
        matches!(self, Value::Array(_) | Value::Object(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Pointer identity of an array or object node
    pub fn node_id(&self) -> Option<usize> {
        match self {
            Value::Array(items) => Some(Rc::as_ptr(items) as *const () as usize),
            Value::Object(map) => Some(Rc::as_ptr(map) as *const () as usize),
            _ => None,
        }
    }

    /// True when both values are the very same node
    pub fn same_node(&self, other: &Value) -> bool {
        match (self.node_id(), other.node_id()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    /// Append to an array node; no-op for other kinds
    pub fn push(&self, value: Value) {
        if let Value::Array(items) = self {
            items.borrow_mut().push(value);
        }
    }

    /// Set a property on an object node; no-op for other kinds
    pub fn set(&self, key: impl Into<String>, value: Value) {
        if let Value::Object(map) = self {
            map.borrow_mut().insert(key.into(), value);
        }
    }

    /// Array element by index (reference clone)
    pub fn index(&self, index: usize) -> Option<Value> {
        match self {
            Value::Array(items) => items.borrow().get(index).cloned(),
            _ => None,
        }
    }

    /// Object property by key (reference clone)
    pub fn get(&self, key: &str) -> Option<Value> {
        match self {
            Value::Object(map) => map.borrow().get(key).cloned(),
            _ => None,
        }
    }

    /// Structural equality that terminates on cyclic graphs
    ///
    /// A pair of nodes already under comparison is assumed equal, which makes
    /// two graphs with the same shape of back-references compare equal. NaN
    /// equals NaN. The comparison recurses once per nesting level.
    pub fn deep_eq(&self, other: &Value) -> bool {
        let mut in_progress = HashSet::new();
        deep_eq_inner(self, other, &mut in_progress)
    }
}

fn deep_eq_inner(a: &Value, b: &Value, in_progress: &mut HashSet<(usize, usize)>) -> bool {
    match (a, b) {
        (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => x == y || (x.is_nan() && y.is_nan()),
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Date(x), Value::Date(y)) => x == y,
        (Value::Pattern(x), Value::Pattern(y)) => x == y,
        (Value::Array(x), Value::Array(y)) => {
            let key = (Rc::as_ptr(x) as usize, Rc::as_ptr(y) as usize);
            if !in_progress.insert(key) {
                return true;
            }
            let (x, y) = (x.borrow(), y.borrow());
            x.len() == y.len()
                && x.iter().zip(y.iter()).all(|(a, b)| deep_eq_inner(a, b, in_progress))
        }
        (Value::Object(x), Value::Object(y)) => {
            let key = (Rc::as_ptr(x) as usize, Rc::as_ptr(y) as usize);
            if !in_progress.insert(key) {
                return true;
            }
            let (x, y) = (x.borrow(), y.borrow());
            x.len() == y.len()
                && x.iter().all(|(k, v)| {
                    y.get(k).is_some_and(|other| deep_eq_inner(v, other, in_progress))
                })
        }
        _ => false,
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.deep_eq(other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Printed through the decycled form so cyclic graphs stay finite
        match crate::cycle::stringify(self) {
            Some(json) => f.write_str(&json),
            None => f.write_str("undefined"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(date: DateTime<Utc>) -> Self {
        Value::Date(date)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::array(items.into_iter().map(Into::into))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => Value::array(items.into_iter().map(Value::from)),
            serde_json::Value::Object(map) => {
                Value::object(map.into_iter().map(|(k, v)| (k, Value::from(v))))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_clone_shares_nodes() {
        let list = Value::array([Value::from(1)]);
        let alias = list.clone();
        alias.push(Value::from(2));

        assert!(list.same_node(&alias));
        assert_eq!(list.index(1), Some(Value::from(2)));
    }

    #[test]
    fn test_deep_eq_compares_structure_not_identity() {
        let a = Value::from(json!({"a": [1, 2, {"b": null}], "c": "x"}));
        let b = Value::from(json!({"a": [1, 2, {"b": null}], "c": "x"}));
        let c = Value::from(json!({"a": [1, 2], "c": "x"}));

        assert!(!a.same_node(&b));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_deep_eq_terminates_on_cycles() {
        let a = Value::empty_object();
        a.set("self", a.clone());
        let b = Value::empty_object();
        b.set("self", b.clone());

        assert!(a.deep_eq(&b));
    }

    #[test]
    fn test_debug_of_cyclic_value_is_finite() {
        let list = Value::array([Value::from("x")]);
        list.push(list.clone());

        assert_eq!(format!("{:?}", list), r#"["x",{"$ref":"$"}]"#);
    }

    #[test]
    fn test_object_keeps_insertion_order() {
        let obj = Value::object([("z", Value::from(1)), ("a", Value::from(2))]);
        obj.set("m", Value::from(3));

        assert_eq!(format!("{:?}", obj), r#"{"z":1,"a":2,"m":3}"#);
    }
}
