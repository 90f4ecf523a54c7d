// src/core/command.rs

use crate::core::namespace::Namespace;
use crate::core::tree::CommandTree;
use crate::models::Value;
use std::fmt::Debug;
use std::sync::Arc;

/// A bound command instance, ready to run.
///
/// Errors returned by `run` are business errors: the dispatcher hands them
/// back to its caller untouched.
pub trait Command: Debug {
    fn run(&mut self) -> anyhow::Result<Value>;
}

/// Builds a leaf command from its invocation. Called only after the whole
/// command line parsed successfully.
pub type Constructor = fn(Invocation) -> anyhow::Result<Box<dyn Command>>;

/// Everything a command is constructed with.
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Canonical names from below the root down to the invoked command.
    pub path: Vec<String>,
    /// Parsed values of every argument of the command, including the ones
    /// inherited from its dispatchers.
    pub namespace: Namespace,
    /// The raw arguments, without the program name. Empty when the command
    /// was invoked with values instead of a command line.
    pub argv: Vec<String>,
    pub program: String,
    /// The tree the command was dispatched from, for calling other commands.
    pub tree: Arc<CommandTree>,
}

impl Invocation {
    /// The invoked command's canonical name.
    pub fn name(&self) -> &str {
        self.path.last().map_or("", String::as_str)
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }
}
