// src/core/merger.rs

use crate::core::argument::{ArgumentDeclarationError, ArgumentDescriptor};
use crate::models::{ArgumentSpec, Arity};
use indexmap::IndexMap;
use indexmap::map::Entry;
use log::debug;
use std::collections::HashMap;

/// An ordered set of argument declarations contributed by one level of a
/// command's ancestry (a base command, a dispatcher or the command itself).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArgumentBundle {
    /// Where the declarations come from, for debug output.
    pub label: String,
    arguments: Vec<(Option<String>, ArgumentDescriptor)>,
}

impl ArgumentBundle {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            arguments: Vec::new(),
        }
    }

    /// Declares an argument under `name`, unless the descriptor names itself.
    pub fn argument(mut self, name: impl Into<String>, descriptor: ArgumentDescriptor) -> Self {
        self.arguments.push((Some(name.into()), descriptor));
        self
    }

    /// Declares an argument whose name comes from the descriptor itself or
    /// from its first long flag.
    pub fn add(mut self, descriptor: ArgumentDescriptor) -> Self {
        self.arguments.push((None, descriptor));
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (Option<&str>, &ArgumentDescriptor)> {
        self.arguments
            .iter()
            .map(|(name, descriptor)| (name.as_deref(), descriptor))
    }

    pub fn len(&self) -> usize {
        self.arguments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arguments.is_empty()
    }
}

/// Flattens bundles, ordered from the most general to the most specific,
/// into the effective arguments of one command.
///
/// Declarations are upserted by logical name: a name seen before keeps its
/// position and only the fields set by the newer declaration replace the
/// inherited ones.
pub fn merge_arguments<'a>(
    bundles: impl IntoIterator<Item = &'a ArgumentBundle>,
) -> Result<Vec<ArgumentSpec>, ArgumentDeclarationError> {
    let mut merged: IndexMap<String, ArgumentDescriptor> = IndexMap::new();
    for bundle in bundles {
        for (key, descriptor) in bundle.iter() {
            let name = descriptor.logical_name(key)?;
            match merged.entry(name) {
                Entry::Occupied(mut entry) => {
                    debug!("Argument '{}' overridden by '{}'", entry.key(), bundle.label);
                    entry.get_mut().overlay(descriptor);
                }
                Entry::Vacant(entry) => {
                    entry.insert(descriptor.clone());
                }
            }
        }
    }

    let specs = merged
        .iter()
        .map(|(name, descriptor)| descriptor.resolve(Some(name)))
        .collect::<Result<Vec<_>, _>>()?;
    validate_arguments(&specs)?;
    Ok(specs)
}

/// Checks rules that involve several arguments of the same command.
pub fn validate_arguments(specs: &[ArgumentSpec]) -> Result<(), ArgumentDeclarationError> {
    let mut owners: HashMap<&str, &str> = HashMap::new();
    for spec in specs {
        for flag in spec.flags() {
            if let Some(first) = owners.insert(flag, &spec.name) {
                return Err(ArgumentDeclarationError::DuplicateFlag {
                    flag: flag.to_string(),
                    first: first.to_string(),
                    second: spec.name.clone(),
                });
            }
        }
    }

    let positionals: Vec<&ArgumentSpec> = specs.iter().filter(|spec| spec.is_positional()).collect();
    let mut remainder: Option<&ArgumentSpec> = None;
    for spec in positionals.iter().copied() {
        if spec.arity == Arity::Remainder {
            if let Some(first) = remainder {
                return Err(ArgumentDeclarationError::MultipleRemainders {
                    first: first.name.clone(),
                    second: spec.name.clone(),
                });
            }
            remainder = Some(spec);
        }
    }

    let mut previous: Option<&ArgumentSpec> = None;
    for spec in positionals {
        if let Some(previous) = previous {
            if previous.arity == Arity::Remainder {
                return Err(ArgumentDeclarationError::MisplacedRemainder(previous.name.clone()));
            }
            if previous.arity.is_multiple() {
                return Err(ArgumentDeclarationError::MisplacedVariadic(previous.name.clone()));
            }
            if spec.is_required() && !previous.is_required() {
                return Err(ArgumentDeclarationError::RequiredAfterOptional {
                    argument: spec.name.clone(),
                    previous: previous.name.clone(),
                });
            }
        }
        previous = Some(spec);
    }
    Ok(())
}

/// Checks that every member of every exclusive group names a merged argument.
pub fn validate_exclusive(
    specs: &[ArgumentSpec],
    groups: &[Vec<String>],
) -> Result<(), ArgumentDeclarationError> {
    for group in groups {
        if group.len() < 2 {
            return Err(ArgumentDeclarationError::InvalidExclusiveGroup(group.clone()));
        }
        if let Some(unknown) = group
            .iter()
            .find(|member| !specs.iter().any(|spec| &spec.name == *member))
        {
            return Err(ArgumentDeclarationError::UnknownGroupMember(unknown.clone()));
        }
    }
    Ok(())
}
