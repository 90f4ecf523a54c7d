// src/models.rs

use crate::constants::{FLAG_PREFIX, ROOT_NAME};
use indexmap::IndexMap;
use regex::Regex;
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use std::fmt;
use std::path::{Path, PathBuf};

// --- COMMAND IDENTITY ---

/// The name of a command node: either a plain name or the ROOT sentinel that
/// identifies the top-level dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CommandName {
    /// The top-level dispatcher. It never lives inside a registry.
    Root,
    /// A command selectable by name inside its parent's registry.
    Named(String),
}

impl CommandName {
    /// The name as displayed in usage lines and error messages.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Root => ROOT_NAME,
            Self::Named(name) => name,
        }
    }

    /// Returns `true` for the ROOT sentinel.
    pub fn is_root(&self) -> bool {
        matches!(self, Self::Root)
    }
}

impl fmt::Display for CommandName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// --- PARSED VALUES ---

/// A dynamically typed value, as stored in a parsed namespace.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Path(PathBuf),
    Regex(Regex),
    List(Vec<Value>),
    Map(IndexMap<String, Value>),
}

impl Value {
    /// A short name for the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Int(_) => "integer",
            Self::Float(_) => "float",
            Self::Str(_) => "string",
            Self::Path(_) => "path",
            Self::Regex(_) => "regular expression",
            Self::List(_) => "list",
            Self::Map(_) => "mapping",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Whether the value counts as given: not null, not false, not zero and
    /// not an empty string or container.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Bool(value) => *value,
            Self::Int(value) => *value != 0,
            Self::Float(value) => *value != 0.0,
            Self::Str(value) => !value.is_empty(),
            Self::Path(value) => !value.as_os_str().is_empty(),
            Self::Regex(_) => true,
            Self::List(items) => !items.is_empty(),
            Self::Map(entries) => !entries.is_empty(),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(value) => Some(*value),
            Self::Int(value) => Some(*value as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Self::Path(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_regex(&self) -> Option<&Regex> {
        match self {
            Self::Regex(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Self::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// Translates the result of a command into a process exit code.
    ///
    /// `Null` and `true` mean success, `false` means failure and integers are
    /// used as-is. Anything else is a successful result carrying data.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Bool(false) => 1,
            Self::Int(code) => i32::try_from(*code).unwrap_or(1),
            _ => 0,
        }
    }

    fn fmt_nested(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(value) => write!(f, "{value:?}"),
            other => write!(f, "{other}"),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Path(a), Self::Path(b)) => a == b,
            // Compiled patterns compare by their source.
            (Self::Regex(a), Self::Regex(b)) => a.as_str() == b.as_str(),
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Map(a), Self::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(value) => write!(f, "{value}"),
            Self::Int(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::Str(value) => f.write_str(value),
            Self::Path(value) => write!(f, "{}", value.display()),
            Self::Regex(value) => f.write_str(value.as_str()),
            Self::List(items) => {
                f.write_str("[")?;
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    item.fmt_nested(f)?;
                }
                f.write_str("]")
            }
            Self::Map(entries) => {
                f.write_str("{")?;
                for (index, (key, value)) in entries.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key:?}: ")?;
                    value.fmt_nested(f)?;
                }
                f.write_str("}")
            }
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(value) => serializer.serialize_bool(*value),
            Self::Int(value) => serializer.serialize_i64(*value),
            Self::Float(value) => serializer.serialize_f64(*value),
            Self::Str(value) => serializer.serialize_str(value),
            Self::Path(value) => serializer.serialize_str(&value.to_string_lossy()),
            Self::Regex(value) => serializer.serialize_str(value.as_str()),
            Self::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<PathBuf> for Value {
    fn from(value: PathBuf) -> Self {
        Self::Path(value)
    }
}

impl From<Regex> for Value {
    fn from(value: Regex) -> Self {
        Self::Regex(value)
    }
}

impl<T: Into<Self>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(value) => Self::Bool(value),
            serde_json::Value::Number(number) => number
                .as_i64()
                .map(Self::Int)
                .or_else(|| number.as_f64().map(Self::Float))
                .unwrap_or(Self::Null),
            serde_json::Value::String(value) => Self::Str(value),
            serde_json::Value::Array(items) => {
                Self::List(items.into_iter().map(Self::from).collect())
            }
            serde_json::Value::Object(entries) => Self::Map(
                entries
                    .into_iter()
                    .map(|(key, value)| (key, Self::from(value)))
                    .collect(),
            ),
        }
    }
}

// --- ARGUMENT MODEL ---

/// How a raw command-line token is turned into a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Keep the raw string.
    Store,
    /// Boolean without a value; presence yields the opposite of the default.
    StoreFlag,
    /// Parse as a signed integer.
    StoreInt,
    /// Split on commas into a list of strings.
    StoreList,
    /// Keep as a filesystem path, without checking that it exists.
    StorePath,
    /// Compile as a regular expression.
    StoreRegex,
    /// Parse as a restricted literal (numbers, strings, booleans, null, arrays, mappings).
    StoreEval,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Store => "store",
            Self::StoreFlag => "store_flag",
            Self::StoreInt => "store_int",
            Self::StoreList => "store_list",
            Self::StorePath => "store_path",
            Self::StoreRegex => "store_regex",
            Self::StoreEval => "store_eval",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The number of values an argument consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Arity {
    /// Exactly one value, stored as a scalar. This is the default.
    #[default]
    Single,
    /// Exactly `n` values, always stored as a list.
    Exact(usize),
    /// Zero or one value, stored as a scalar.
    Optional,
    /// Any number of values.
    ZeroOrMore,
    /// At least one value.
    OneOrMore,
    /// Every remaining token, including ones that look like flags.
    /// Only valid for the last positional argument.
    Remainder,
}

impl Arity {
    /// Whether the parsed value is a list.
    pub fn is_multiple(self) -> bool {
        matches!(
            self,
            Self::Exact(_) | Self::ZeroOrMore | Self::OneOrMore | Self::Remainder
        )
    }

    /// Whether at least one value must be given when the argument is present.
    pub fn requires_value(self) -> bool {
        matches!(self, Self::Single | Self::Exact(_) | Self::OneOrMore)
    }
}

/// The resolved, merged description of one argument after flattening a
/// command's ancestry.
#[derive(Debug, Clone, PartialEq)]
pub struct ArgumentSpec {
    /// Logical name, unique within a command. Also the namespace key.
    pub name: String,
    /// Flag tokens (`-v`, `--log-level`), or the bare name for positionals.
    pub aliases: Vec<String>,
    pub action: Action,
    pub default: Option<Value>,
    pub choices: Option<Vec<Value>>,
    pub arity: Arity,
    pub description: Option<String>,
}

impl ArgumentSpec {
    /// An argument without any flag alias is positional.
    pub fn is_positional(&self) -> bool {
        !self
            .aliases
            .iter()
            .any(|alias| alias.starts_with(FLAG_PREFIX))
    }

    /// The flag tokens of an option, in declaration order.
    pub fn flags(&self) -> impl Iterator<Item = &str> {
        self.aliases
            .iter()
            .map(String::as_str)
            .filter(|alias| alias.starts_with(FLAG_PREFIX))
    }

    /// Positionals without a default must be given on the command line.
    pub fn is_required(&self) -> bool {
        self.is_positional() && self.default.is_none() && self.arity.requires_value()
    }

    /// The value the namespace holds when the argument is absent.
    pub fn initial_value(&self) -> Value {
        if let Some(default) = &self.default {
            return default.clone();
        }
        match (self.action, self.arity) {
            (Action::StoreFlag, _) => Value::Bool(false),
            (_, Arity::ZeroOrMore | Arity::Remainder) => Value::List(Vec::new()),
            _ => Value::Null,
        }
    }

    /// The value a flag takes when it is present on the command line.
    pub fn flag_value(&self) -> Value {
        let stated = self
            .default
            .as_ref()
            .and_then(Value::as_bool)
            .unwrap_or(false);
        Value::Bool(!stated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(aliases: &[&str], action: Action, arity: Arity) -> ArgumentSpec {
        ArgumentSpec {
            name: "target".to_string(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
            action,
            default: None,
            choices: None,
            arity,
            description: None,
        }
    }

    #[test]
    fn test_positional_detection_uses_flag_marker() {
        assert!(spec(&["target"], Action::Store, Arity::Single).is_positional());
        assert!(!spec(&["-t", "--target"], Action::Store, Arity::Single).is_positional());
    }

    #[test]
    fn test_initial_values_follow_action_and_arity() {
        assert_eq!(
            spec(&["--all"], Action::StoreFlag, Arity::Single).initial_value(),
            Value::Bool(false)
        );
        assert_eq!(
            spec(&["rest"], Action::Store, Arity::Remainder).initial_value(),
            Value::List(vec![])
        );
        assert_eq!(
            spec(&["--name"], Action::Store, Arity::Single).initial_value(),
            Value::Null
        );
    }

    #[test]
    fn test_flag_value_is_opposite_of_stated_default() {
        let mut flag = spec(&["--no-color"], Action::StoreFlag, Arity::Single);
        flag.default = Some(Value::Bool(true));
        assert_eq!(flag.flag_value(), Value::Bool(false));
        assert_eq!(flag.initial_value(), Value::Bool(true));
    }

    #[test]
    fn test_regex_values_compare_by_pattern() {
        let a = Value::Regex(Regex::new("^a+$").unwrap());
        let b = Value::Regex(Regex::new("^a+$").unwrap());
        assert_eq!(a, b);
    }

    #[test]
    fn test_display_quotes_nested_strings_only() {
        let value = Value::List(vec![Value::from("a"), Value::Int(1)]);
        assert_eq!(value.to_string(), r#"["a", 1]"#);
        assert_eq!(Value::from("plain").to_string(), "plain");
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(Value::Null.exit_code(), 0);
        assert_eq!(Value::Bool(false).exit_code(), 1);
        assert_eq!(Value::Int(3).exit_code(), 3);
        assert_eq!(Value::from("done").exit_code(), 0);
    }
}
