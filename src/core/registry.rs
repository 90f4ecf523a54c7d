// src/core/registry.rs

use crate::core::tree::CommandNode;
use indexmap::IndexMap;
use log::debug;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("Command declared in '{module}' has no name")]
    MissingName { module: String },
    #[error("Invalid command name '{0}'")]
    InvalidName(String),
    #[error(
        "Cannot register command '{command}' in '{scope}': {}",
        describe_conflicts(.conflicts)
    )]
    Conflict {
        command: String,
        scope: String,
        /// Each clashing name with the command that already owns it.
        conflicts: Vec<(String, String)>,
    },
    #[error("Command '{command}' refers to unknown parent '{parent}'")]
    MissingParent { command: String, parent: String },
    #[error("Command '{command}' cannot be a child of '{parent}', which is not a dispatcher")]
    NotADispatcher { command: String, parent: String },
    #[error("The root dispatcher is declared more than once (in '{module}')")]
    DuplicateRoot { module: String },
    #[error("The root of a command tree must be a dispatcher named ROOT")]
    InvalidRoot,
    #[error("Command '{0}' is abstract and cannot be registered")]
    AbstractCommand(String),
}

fn describe_conflicts(conflicts: &[(String, String)]) -> String {
    conflicts
        .iter()
        .map(|(name, owner)| {
            if name == owner {
                format!("'{name}' is already registered")
            } else {
                format!("'{name}' is already used by '{owner}'")
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// The outcome of a successful registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registered {
    Inserted,
    /// The same command was loaded before; nothing changed.
    AlreadyPresent,
}

/// The name and alias table of one dispatcher level.
///
/// Names and aliases of all commands in a registry are pairwise distinct;
/// registration fails instead of shadowing an existing entry.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    scope: String,
    commands: Vec<CommandNode>,
    lookup: IndexMap<String, usize>,
}

impl Registry {
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            commands: Vec::new(),
            lookup: IndexMap::new(),
        }
    }

    /// The display name of the dispatcher owning this registry.
    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn register(&mut self, node: CommandNode) -> Result<Registered, RegistrationError> {
        let name = node.name().as_str().to_string();

        if let Some(existing) = self.get(&name) {
            if existing.module() == node.module()
                && existing.name() == node.name()
                && existing.aliases() == node.aliases()
            {
                debug!("Command '{}' already registered in '{}'", name, self.scope);
                return Ok(Registered::AlreadyPresent);
            }
        }

        let mut conflicts: Vec<(String, String)> = Vec::new();
        let mut claimed: Vec<&str> = Vec::new();
        for key in node.names() {
            if let Some(owner) = self.get(key) {
                conflicts.push((key.to_string(), owner.name().to_string()));
            } else if claimed.contains(&key) {
                conflicts.push((key.to_string(), name.clone()));
            }
            claimed.push(key);
        }
        if !conflicts.is_empty() {
            return Err(RegistrationError::Conflict {
                command: name,
                scope: self.scope.clone(),
                conflicts,
            });
        }

        let index = self.commands.len();
        for key in node.names() {
            self.lookup.insert(key.to_string(), index);
        }
        debug!(
            "Registered command '{}' in '{}' (aliases: {:?})",
            name,
            self.scope,
            node.aliases()
        );
        self.commands.push(node);
        Ok(Registered::Inserted)
    }

    /// Looks a command up by name or alias.
    pub fn get(&self, name: &str) -> Option<&CommandNode> {
        self.lookup.get(name).and_then(|&index| self.commands.get(index))
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut CommandNode> {
        let index = *self.lookup.get(name)?;
        self.commands.get_mut(index)
    }

    /// Registered commands, in registration order.
    pub fn commands(&self) -> impl Iterator<Item = &CommandNode> {
        self.commands.iter()
    }

    /// Every name and alias known to this scope, in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.lookup.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}
