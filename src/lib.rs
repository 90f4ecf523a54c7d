//! A declarative command framework: typed argument descriptors, argument sets
//! inherited along dispatcher levels, and a dispatcher that turns a command
//! line into one running command.

pub mod cli;
pub mod constants;
pub mod core;
pub mod models;
pub mod system;

pub use cli::dispatcher::{DispatchError, Dispatcher, InvocationError, ParseError, Resolution};
pub use cli::{bootstrap, root_descriptor};
pub use core::argument::{ArgumentDeclarationError, ArgumentDescriptor};
pub use core::command::{Command, Constructor, Invocation};
pub use core::merger::ArgumentBundle;
pub use core::namespace::Namespace;
pub use core::registry::RegistrationError;
pub use core::tree::{CommandDescriptor, CommandTree, LoadError};
pub use models::{Action, ArgumentSpec, Arity, CommandName, Value};
