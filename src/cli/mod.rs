// src/cli/mod.rs

//! # Command Line Layer
//!
//! - **`dispatcher`**: parses a command line against the command tree,
//!   instantiates the selected chain of commands and runs the leaf.
//! - **`handlers`**: the built-in commands (`help`, `version`).
//!
//! [`bootstrap`] is the explicit registration step: it builds the root
//! dispatcher, then registers the built-ins and every descriptor the caller
//! hands in. Any declaration or naming conflict fails here, before a single
//! argument is parsed.

use crate::constants::LOG_LEVEL_ARGUMENT;
use crate::core::argument::ArgumentDescriptor;
use crate::core::merger::ArgumentBundle;
use crate::core::tree::{CommandDescriptor, CommandTree, LoadError};
use crate::system::logging::{LogLevel, level_from_env};

pub mod dispatcher;
pub mod handlers;

/// Arguments every command accepts, declared on the root dispatcher.
pub fn global_arguments() -> ArgumentBundle {
    ArgumentBundle::new("global").argument(
        LOG_LEVEL_ARGUMENT,
        ArgumentDescriptor::string()
            .aliases(["-v", "--log-level"])
            .choices(LogLevel::NAMES)
            .default(level_from_env().as_str())
            .description("Set logging verbosity for the execution of the program."),
    )
}

/// The top-level dispatcher with the framework-wide arguments.
pub fn root_descriptor() -> CommandDescriptor {
    CommandDescriptor::root()
        .module(module_path!())
        .doc("A declarative command framework for nested command line tools.")
        .bundle(global_arguments())
}

/// Commands registered in every tree.
pub fn builtin_commands() -> Vec<CommandDescriptor> {
    vec![handlers::help::descriptor(), handlers::version::descriptor()]
}

/// Builds the command tree: the root, the built-ins, then `commands`.
pub fn bootstrap(
    commands: impl IntoIterator<Item = CommandDescriptor>,
) -> Result<CommandTree, LoadError> {
    let mut tree = CommandTree::new(root_descriptor())?;
    tree.register_all(builtin_commands())?;
    tree.register_all(commands)?;
    Ok(tree)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::dispatcher::Dispatcher;
    use crate::models::Value;

    #[test]
    fn test_bootstrap_registers_builtins() {
        let tree = bootstrap(Vec::new()).unwrap();
        let root = tree.root();
        assert!(root.child("man").is_some());
        assert!(root.child("version").is_some());
        assert!(root.find_argument("--log-level").is_some());
    }

    #[test]
    fn test_bootstrap_is_idempotent_for_builtins() {
        let mut tree = bootstrap(Vec::new()).unwrap();
        assert_eq!(tree.register_all(builtin_commands()).unwrap(), 0);
        assert_eq!(tree.root().children().unwrap().len(), 2);
    }

    #[test]
    fn test_help_lists_names() {
        let dispatcher = Dispatcher::new(bootstrap(Vec::new()).unwrap());
        let names = dispatcher.dispatch(&["help", "--names-only"]).unwrap();
        assert_eq!(names, Value::from("h\nhelp\nman\nversion"));

        let Value::Str(summary) = dispatcher.dispatch::<&str>(&[]).unwrap() else {
            panic!("help should return its text");
        };
        assert!(summary.contains("Print the program name and version."));

        let Value::Str(single) = dispatcher.dispatch(&["h", "version"]).unwrap() else {
            panic!("help should return its text");
        };
        assert!(single.contains("--log-level"));

        let error = dispatcher.dispatch(&["help", "nope"]).unwrap_err();
        assert!(error.command_error().is_some());
    }
}
