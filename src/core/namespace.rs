// src/core/namespace.rs

use crate::models::Value;
use indexmap::IndexMap;
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::path::Path;

/// The flat set of parsed argument values handed to commands, keyed by
/// argument name in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Namespace {
    values: IndexMap<String, Value>,
}

impl Namespace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a value, returning the one it replaces.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.values.insert(name.into(), value.into())
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }

    // --- Typed accessors, `None` when absent, null or of another type. ---

    pub fn str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_int)
    }

    /// A flag's value; absent flags read as `false`.
    pub fn flag(&self, name: &str) -> bool {
        self.get(name).and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn list(&self, name: &str) -> Option<&[Value]> {
        self.get(name).and_then(Value::as_list)
    }

    pub fn path(&self, name: &str) -> Option<&Path> {
        self.get(name).and_then(Value::as_path)
    }

    pub fn regex(&self, name: &str) -> Option<&Regex> {
        self.get(name).and_then(Value::as_regex)
    }

    /// The list of strings held by `name`, for `store_list` and multi-value
    /// `store` arguments.
    pub fn strings(&self, name: &str) -> Vec<String> {
        self.list(name)
            .map(|items| items.iter().map(Value::to_string).collect())
            .unwrap_or_default()
    }

    /// Compact JSON rendering, used in debug logs.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| self.to_string())
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Namespace(")?;
        for (index, (name, value)) in self.values.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            match value {
                Value::Str(text) => write!(f, "{name}={text:?}")?,
                other => write!(f, "{name}={other}")?,
            }
        }
        f.write_str(")")
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Namespace {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_accessors() {
        let namespace: Namespace = [
            ("count", Value::Int(2)),
            ("name", Value::from("demo")),
            ("tags", Value::from(vec!["a", "b"])),
            ("force", Value::Bool(true)),
        ]
        .into_iter()
        .collect();

        assert_eq!(namespace.int("count"), Some(2));
        assert_eq!(namespace.str("name"), Some("demo"));
        assert_eq!(namespace.strings("tags"), vec!["a", "b"]);
        assert!(namespace.flag("force"));
        assert!(!namespace.flag("missing"));
        assert_eq!(namespace.int("name"), None);
    }

    #[test]
    fn test_renders_as_json_and_text() {
        let mut namespace = Namespace::new();
        namespace.insert("log_level", "INFO");
        namespace.insert("count", 3);
        assert_eq!(namespace.to_json(), r#"{"log_level":"INFO","count":3}"#);
        assert_eq!(namespace.to_string(), r#"Namespace(log_level="INFO", count=3)"#);
    }
}
