// src/core/argument.rs

use crate::constants::{FLAG_PREFIX, HELP_ARGUMENT, HELP_FLAGS};
use crate::core::actions::{check_choices, choice_action, coerce_declared, format_choices};
use crate::models::{Action, ArgumentSpec, Arity, Value};
use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

lazy_static! {
    // `-x` or `--long-name`.
    static ref FLAG_RE: Regex = Regex::new(r"^(-[A-Za-z0-9]|--[A-Za-z0-9][A-Za-z0-9_-]*)$").unwrap();
    static ref NAME_RE: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_-]*$").unwrap();
}

/// A malformed argument declaration. Raised while commands are loaded, never
/// while parsing user input.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ArgumentDeclarationError {
    #[error("Argument declared without a name or a long flag to derive one from")]
    MissingName,
    #[error("Invalid argument name '{0}'")]
    InvalidName(String),
    #[error("Argument '{argument}': invalid flag '{alias}'")]
    InvalidAlias { argument: String, alias: String },
    #[error("Argument '{0}' mixes flags and positional names in its aliases")]
    MixedAliases(String),
    #[error("Argument '{argument}': '{flag}' is reserved for help")]
    ReservedFlag { argument: String, flag: String },
    #[error("Argument name '{0}' is reserved for help")]
    ReservedName(String),
    #[error("Argument '{argument}': invalid default: {message}")]
    InvalidDefault { argument: String, message: String },
    #[error("Argument '{argument}': invalid choice: {message}")]
    InvalidChoice { argument: String, message: String },
    #[error("Argument '{argument}': default {default} is not one of the choices ({choices})")]
    DefaultNotInChoices {
        argument: String,
        default: String,
        choices: String,
    },
    #[error("Argument '{argument}': {setting} cannot be used with action '{action}'")]
    UnsupportedSetting {
        argument: String,
        setting: &'static str,
        action: Action,
    },
    #[error("Argument '{argument}': {message}")]
    InvalidArity { argument: String, message: String },
    #[error("Arguments '{first}' and '{second}' both capture the remaining tokens")]
    MultipleRemainders { first: String, second: String },
    #[error("Argument '{0}': remainder arity is only valid on the last positional argument")]
    MisplacedRemainder(String),
    #[error("Argument '{0}': a positional taking several values must be the last positional")]
    MisplacedVariadic(String),
    #[error("Argument '{0}': a dispatcher cannot declare positional arguments, its positional slot selects the command")]
    PositionalOnDispatcher(String),
    #[error("Required argument '{argument}' cannot follow optional positional '{previous}'")]
    RequiredAfterOptional { argument: String, previous: String },
    #[error("Flag '{flag}' is declared by both '{first}' and '{second}'")]
    DuplicateFlag {
        flag: String,
        first: String,
        second: String,
    },
    #[error("Exclusive group refers to unknown argument '{0}'")]
    UnknownGroupMember(String),
    #[error("Exclusive group {0:?} needs at least two options")]
    InvalidExclusiveGroup(Vec<String>),
}

/// Declarative definition of one argument.
///
/// Every field is optional so that a descriptor can also be a partial
/// override of an inherited argument: only the fields set here replace the
/// inherited ones when descriptors are merged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArgumentDescriptor {
    pub name: Option<String>,
    pub aliases: Option<Vec<String>>,
    pub description: Option<String>,
    pub default: Option<Value>,
    pub choices: Option<Vec<Value>>,
    pub arity: Option<Arity>,
    pub action: Option<Action>,
}

impl ArgumentDescriptor {
    /// A new declaration using the given parsing action.
    pub fn describe(action: Action) -> Self {
        Self {
            action: Some(action),
            ..Default::default()
        }
    }

    /// A declaration that sets no field yet; used to override part of an
    /// inherited argument.
    pub fn partial() -> Self {
        Default::default()
    }

    pub fn string() -> Self {
        Self::describe(Action::Store)
    }

    pub fn flag() -> Self {
        Self::describe(Action::StoreFlag)
    }

    pub fn integer() -> Self {
        Self::describe(Action::StoreInt)
    }

    pub fn list() -> Self {
        Self::describe(Action::StoreList)
    }

    pub fn path() -> Self {
        Self::describe(Action::StorePath)
    }

    pub fn regex() -> Self {
        Self::describe(Action::StoreRegex)
    }

    pub fn eval() -> Self {
        Self::describe(Action::StoreEval)
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases = Some(aliases.into_iter().map(Into::into).collect());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn choices<I, V>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.choices = Some(choices.into_iter().map(Into::into).collect());
        self
    }

    pub fn arity(mut self, arity: Arity) -> Self {
        self.arity = Some(arity);
        self
    }

    pub fn action(mut self, action: Action) -> Self {
        self.action = Some(action);
        self
    }

    /// Copies every field set on `other` over this descriptor.
    pub fn overlay(&mut self, other: &Self) {
        fn set<T: Clone>(target: &mut Option<T>, source: &Option<T>) {
            if let Some(value) = source {
                *target = Some(value.clone());
            }
        }
        set(&mut self.name, &other.name);
        set(&mut self.aliases, &other.aliases);
        set(&mut self.description, &other.description);
        set(&mut self.default, &other.default);
        set(&mut self.choices, &other.choices);
        set(&mut self.arity, &other.arity);
        set(&mut self.action, &other.action);
    }

    /// The logical name: the explicit name, else the fallback, else derived
    /// from the first long flag (`--log-level` gives `log_level`), else the
    /// first bare alias.
    pub fn logical_name(&self, fallback: Option<&str>) -> Result<String, ArgumentDeclarationError> {
        if let Some(name) = self.name.as_deref().or(fallback) {
            return Ok(name.to_string());
        }
        let aliases = self.aliases.as_deref().unwrap_or_default();
        aliases
            .iter()
            .find_map(|alias| alias.strip_prefix("--").map(|long| long.replace('-', "_")))
            .or_else(|| {
                aliases
                    .iter()
                    .find(|alias| !alias.starts_with(FLAG_PREFIX))
                    .cloned()
            })
            .ok_or(ArgumentDeclarationError::MissingName)
    }

    /// Validates the declaration and produces the resolved argument.
    /// `fallback` is used as the name when none was declared.
    pub fn resolve(&self, fallback: Option<&str>) -> Result<ArgumentSpec, ArgumentDeclarationError> {
        let name = self.logical_name(fallback)?;
        if !NAME_RE.is_match(&name) {
            return Err(ArgumentDeclarationError::InvalidName(name));
        }
        if name == HELP_ARGUMENT {
            return Err(ArgumentDeclarationError::ReservedName(name));
        }

        let action = self.action.unwrap_or(Action::Store);
        let aliases = resolve_aliases(&name, self.aliases.as_deref().unwrap_or_default())?;
        let positional = !aliases.iter().any(|alias| alias.starts_with(FLAG_PREFIX));

        if action == Action::StoreFlag {
            return resolve_flag(self, name, aliases, positional);
        }

        let arity = self.arity.unwrap_or_default();
        match arity {
            Arity::Exact(0) => {
                return Err(ArgumentDeclarationError::InvalidArity {
                    argument: name,
                    message: "an exact arity must be at least 1".to_string(),
                });
            }
            Arity::Remainder if !positional => {
                return Err(ArgumentDeclarationError::InvalidArity {
                    argument: name,
                    message: "remainder arity is only valid on a positional argument".to_string(),
                });
            }
            _ => {}
        }

        let choices = match &self.choices {
            None => None,
            Some(choices) => Some(
                choices
                    .iter()
                    .map(|choice| coerce_declared(choice_action(action), choice.clone()))
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|message| ArgumentDeclarationError::InvalidChoice {
                        argument: name.clone(),
                        message,
                    })?,
            ),
        };

        let default = match &self.default {
            None => None,
            Some(default) => Some(coerce_declared(action, default.clone()).map_err(|message| {
                ArgumentDeclarationError::InvalidDefault {
                    argument: name.clone(),
                    message,
                }
            })?),
        };

        if let (Some(default), Some(choices)) = (&default, &choices) {
            if check_choices(default, Some(choices)).is_err() {
                return Err(ArgumentDeclarationError::DefaultNotInChoices {
                    argument: name,
                    default: default.to_string(),
                    choices: format_choices(choices),
                });
            }
        }

        Ok(ArgumentSpec {
            name,
            aliases,
            action,
            default,
            choices,
            arity,
            description: self.description.clone(),
        })
    }
}

fn resolve_aliases(name: &str, declared: &[String]) -> Result<Vec<String>, ArgumentDeclarationError> {
    let flags = declared.iter().filter(|alias| alias.starts_with(FLAG_PREFIX)).count();
    if flags == 0 {
        // Positionals are known by their bare name only.
        if let Some(other) = declared.iter().find(|alias| alias.as_str() != name) {
            return Err(ArgumentDeclarationError::InvalidAlias {
                argument: name.to_string(),
                alias: other.clone(),
            });
        }
        return Ok(vec![name.to_string()]);
    }
    if flags != declared.len() {
        return Err(ArgumentDeclarationError::MixedAliases(name.to_string()));
    }

    let mut aliases: Vec<String> = Vec::with_capacity(declared.len());
    for alias in declared {
        if HELP_FLAGS.contains(&alias.as_str()) {
            return Err(ArgumentDeclarationError::ReservedFlag {
                argument: name.to_string(),
                flag: alias.clone(),
            });
        }
        if !FLAG_RE.is_match(alias) {
            return Err(ArgumentDeclarationError::InvalidAlias {
                argument: name.to_string(),
                alias: alias.clone(),
            });
        }
        if !aliases.contains(alias) {
            aliases.push(alias.clone());
        }
    }
    Ok(aliases)
}

fn resolve_flag(
    descriptor: &ArgumentDescriptor,
    name: String,
    aliases: Vec<String>,
    positional: bool,
) -> Result<ArgumentSpec, ArgumentDeclarationError> {
    let unsupported = |setting: &'static str| ArgumentDeclarationError::UnsupportedSetting {
        argument: name.clone(),
        setting,
        action: Action::StoreFlag,
    };
    if positional {
        return Err(unsupported("a positional form"));
    }
    if descriptor.arity.is_some() {
        return Err(unsupported("an arity"));
    }
    if descriptor.choices.is_some() {
        return Err(unsupported("choices"));
    }

    let default = match descriptor.default.clone() {
        None | Some(Value::Null) => Value::Bool(false),
        Some(value) => coerce_declared(Action::StoreFlag, value).map_err(|message| {
            ArgumentDeclarationError::InvalidDefault {
                argument: name.clone(),
                message,
            }
        })?,
    };

    Ok(ArgumentSpec {
        name,
        aliases,
        action: Action::StoreFlag,
        default: Some(default),
        choices: None,
        arity: Arity::Single,
        description: descriptor.description.clone(),
    })
}
