// src/core/actions.rs

use crate::core::commons::wrap_value;
use crate::core::literal::parse_literal;
use crate::models::{Action, Value};
use regex::Regex;
use std::path::PathBuf;

/// Converts one raw command-line token according to an argument's action.
///
/// The error is a plain message; callers wrap it in the error type that fits
/// the stage (declaration or parsing).
pub fn convert(action: Action, raw: &str) -> Result<Value, String> {
    match action {
        Action::Store => Ok(Value::Str(raw.to_string())),
        Action::StoreFlag => match raw.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(Value::Bool(true)),
            "false" | "0" | "no" | "off" => Ok(Value::Bool(false)),
            _ => Err(format!("invalid boolean value: {}", wrap_value(raw))),
        },
        Action::StoreInt => raw
            .trim()
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| format!("invalid integer value: {}", wrap_value(raw))),
        Action::StoreList => {
            if raw.is_empty() {
                return Ok(Value::List(Vec::new()));
            }
            Ok(Value::List(
                raw.split(',').map(|item| Value::Str(item.to_string())).collect(),
            ))
        }
        Action::StorePath => Ok(Value::Path(PathBuf::from(raw))),
        Action::StoreRegex => Regex::new(raw)
            .map(Value::Regex)
            .map_err(|e| format!("invalid regular expression {}: {e}", wrap_value(raw))),
        Action::StoreEval => parse_literal(raw).map_err(|e| e.to_string()),
    }
}

/// Brings a value declared in code (a default or a choice) to the type the
/// action produces. Strings go through [`convert`], lists are coerced item by
/// item and values already of the right type pass through.
pub fn coerce_declared(action: Action, value: Value) -> Result<Value, String> {
    match (action, value) {
        (_, Value::Null) => Ok(Value::Null),
        (Action::StoreEval, value) => match value {
            Value::Str(raw) => convert(action, &raw),
            other => Ok(other),
        },
        (_, Value::Str(raw)) => convert(action, &raw),
        (Action::StoreList, Value::List(items)) => items
            .into_iter()
            .map(|item| coerce_declared(Action::Store, item))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::List),
        (_, Value::List(items)) => items
            .into_iter()
            .map(|item| coerce_declared(action, item))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::List),
        (Action::Store, value @ (Value::Int(_) | Value::Float(_) | Value::Bool(_))) => {
            Ok(Value::Str(value.to_string()))
        }
        (Action::StoreFlag, value @ Value::Bool(_))
        | (Action::StoreInt, value @ Value::Int(_))
        | (Action::StorePath, value @ Value::Path(_))
        | (Action::StoreRegex, value @ Value::Regex(_)) => Ok(value),
        (action, value) => Err(format!(
            "a {} value cannot be used with action '{action}'",
            value.kind()
        )),
    }
}

/// The action used for each choice. Choices of a list argument restrict its
/// items, so they are plain strings.
pub fn choice_action(action: Action) -> Action {
    match action {
        Action::StoreList => Action::Store,
        other => other,
    }
}

/// Checks a parsed value against the allowed choices. Lists are checked item
/// by item unless the list itself is one of the choices.
pub fn check_choices(value: &Value, choices: Option<&[Value]>) -> Result<(), String> {
    let Some(choices) = choices else {
        return Ok(());
    };
    if value.is_null() || choices.contains(value) {
        return Ok(());
    }
    if let Value::List(items) = value {
        if let Some(invalid) = items.iter().find(|item| !choices.contains(item)) {
            return Err(invalid_choice(invalid, choices));
        }
        return Ok(());
    }
    Err(invalid_choice(value, choices))
}

fn invalid_choice(value: &Value, choices: &[Value]) -> String {
    format!(
        "invalid choice: {} (choose from {})",
        wrap_value(&value.to_string()),
        format_choices(choices)
    )
}

/// Renders choices for help and error messages.
pub fn format_choices(choices: &[Value]) -> String {
    choices
        .iter()
        .map(Value::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
