use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Generic runtime value type for settings records.
///
/// Supports all JSON-compatible types. Untagged so that a settings document
/// written as plain JSON (`true`, `"op"`, `["a", "b"]`) deserializes directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// JSON null.
    Null,
    /// JSON boolean.
    Bool(bool),
    /// JSON integer (signed 64-bit).
    Int(i64),
    /// JSON floating-point (64-bit IEEE 754).
    Float(f64),
    /// JSON string (UTF-8).
    String(String),
    /// JSON array (ordered sequence of values).
    Array(Vec<Value>),
    /// JSON object (ordered map of string keys to values).
    /// Uses `BTreeMap` for deterministic iteration order.
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Returns `true` for [`Value::Null`].
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Returns the string elements of an array value, skipping non-strings.
    ///
    /// `Null` and non-array values yield an empty list, which is how an unset
    /// sequence option reads.
    #[must_use]
    pub fn as_str_list(&self) -> Vec<&str> {
        self.as_array()
            .map(|items| items.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Self::Array(items.into_iter().map(Into::into).collect())
    }
}

impl From<BTreeMap<String, String>> for Value {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self::Map(map.into_iter().map(|(k, v)| (k, Self::String(v))).collect())
    }
}

/// Identity of the resource selected by routing for the current request.
///
/// `kind` is the key the ruleset registry assigns rules to. A published
/// *method* of another resource (e.g. the default view of a file) carries the
/// kind of its owner so lookups can fall back to it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Published {
    /// Registry key for this resource type.
    pub kind: String,
    /// Name under which the resource was published (view or method name).
    pub name: String,
    /// Kind of the resource this method is bound to, if any.
    pub owner: Option<String>,
}

impl Published {
    #[must_use]
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
            owner: None,
        }
    }

    /// A method `name` published on a resource of kind `owner`.
    #[must_use]
    pub fn method(owner: impl Into<String>, name: impl Into<String>) -> Self {
        let owner = owner.into();
        Self {
            kind: format!("{owner}#method"),
            name: name.into(),
            owner: Some(owner),
        }
    }
}

impl fmt::Display for Published {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.owner {
            Some(owner) => write!(f, "<{owner} method {}>", self.name),
            None => write!(f, "<{} {}>", self.kind, self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn str_list_skips_non_strings() {
        let value = Value::Array(vec![Value::from("a"), Value::Int(1), Value::from("b")]);
        assert_eq!(value.as_str_list(), vec!["a", "b"]);
    }

    #[test]
    fn str_list_of_null_is_empty() {
        assert!(Value::Null.as_str_list().is_empty());
    }

    #[test]
    fn value_deserializes_untagged_json() {
        let value: Value = serde_json::from_str(r#"{"ops": ["a", "b"], "on": true}"#).unwrap();
        let map = value.as_map().unwrap();
        assert_eq!(map["ops"].as_str_list(), vec!["a", "b"]);
        assert_eq!(map["on"].as_bool(), Some(true));
    }

    #[test]
    fn method_published_records_owner() {
        let published = Published::method("file", "index_html");
        assert_eq!(published.owner.as_deref(), Some("file"));
        assert_eq!(published.to_string(), "<file method index_html>");
    }
}
