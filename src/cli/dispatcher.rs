// src/cli/dispatcher.rs

use crate::constants::{
    FAILURE_EXIT_CODE, HELP_COMMAND, LOG_LEVEL_ARGUMENT, PROGRAM_NAME, USAGE_EXIT_CODE,
};
use crate::core::actions::{check_choices, coerce_declared};
use crate::core::assembler::{assemble, render_help};
use crate::core::command::{Command, Invocation};
use crate::core::namespace::Namespace;
use crate::core::tree::{CommandNode, CommandTree, NodeKind};
use crate::models::{Action, ArgumentSpec, Arity, CommandName, Value};
use crate::system::logging;
use clap::ArgMatches;
use clap::error::{ContextKind, ContextValue, ErrorKind};
use clap::parser::ValueSource;
use log::debug;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;

// --- ERRORS ---

/// Bad user input. Raised before any command is constructed.
#[derive(Error, Debug)]
pub enum ParseError {
    /// A grammar error, or a request for help, as reported by the parser.
    #[error("{0}")]
    Usage(clap::Error),
    #[error("Unknown argument '{argument}' for command '{command}'")]
    UnknownArgument { command: String, argument: String },
    #[error("Missing value for required argument '{argument}' of command '{command}'")]
    MissingArgument { command: String, argument: String },
    #[error("Invalid value for argument '{argument}': {message}")]
    InvalidValue { argument: String, message: String },
    #[error("Arguments {} are mutually exclusive and exactly one of them is required", .0.join(", "))]
    ExclusiveArguments(Vec<String>),
    #[error("Cannot split command line '{0}': unbalanced quotes or trailing escape")]
    InvalidCommandLine(String),
}

impl ParseError {
    /// 0 for help output, 2 otherwise.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Usage(error) => error.exit_code(),
            _ => USAGE_EXIT_CODE,
        }
    }

    /// Whether this is a help request rather than a failure.
    pub fn is_help(&self) -> bool {
        matches!(self, Self::Usage(error) if error.kind() == ErrorKind::DisplayHelp)
    }
}

/// The requested command does not exist or cannot run.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Command '{name}' not found{}", describe_suggestions(.suggestions))]
    CommandNotFound {
        name: String,
        suggestions: Vec<String>,
        /// The parser's own report, with usage. Absent for programmatic calls.
        #[source]
        source: Option<clap::Error>,
    },
    #[error("Command '{0}' selects a subcommand and cannot be run directly")]
    NotRunnable(String),
}

fn describe_suggestions(suggestions: &[String]) -> String {
    if suggestions.is_empty() {
        String::new()
    } else {
        format!(", did you mean '{}'?", suggestions.join("', '"))
    }
}

/// Everything that can go wrong while dispatching one command line.
#[derive(Error, Debug)]
pub enum InvocationError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    /// An error raised by a command's constructor or `run`, as it was raised.
    #[error(transparent)]
    Command(anyhow::Error),
}

impl InvocationError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Parse(error) => error.exit_code(),
            Self::Dispatch(_) => USAGE_EXIT_CODE,
            Self::Command(_) => FAILURE_EXIT_CODE,
        }
    }

    /// The error raised by the command, if that is what failed.
    pub fn command_error(&self) -> Option<&anyhow::Error> {
        match self {
            Self::Command(error) => Some(error),
            _ => None,
        }
    }
}

fn classify(error: clap::Error) -> InvocationError {
    if error.kind() != ErrorKind::InvalidSubcommand {
        return ParseError::Usage(error).into();
    }
    let name = match error.get(ContextKind::InvalidSubcommand) {
        Some(ContextValue::String(name)) => name.clone(),
        _ => String::new(),
    };
    let suggestions = match error.get(ContextKind::SuggestedSubcommand) {
        Some(ContextValue::String(suggestion)) => vec![suggestion.clone()],
        Some(ContextValue::Strings(suggestions)) => suggestions.clone(),
        _ => Vec::new(),
    };
    DispatchError::CommandNotFound {
        name,
        suggestions,
        source: Some(error),
    }
    .into()
}

// --- DISPATCHER ---

/// The outcome of parsing: the selected commands and their argument values.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    /// Canonical names from below the root down to the leaf.
    pub chain: Vec<String>,
    pub namespace: Namespace,
}

/// Parses command lines against a command tree and runs the selected leaf.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    tree: Arc<CommandTree>,
    grammar: clap::Command,
    program: String,
}

impl Dispatcher {
    pub fn new(tree: CommandTree) -> Self {
        Self::from_shared(Arc::new(tree), PROGRAM_NAME)
    }

    /// A dispatcher over a tree that is already shared, such as the one
    /// handed to commands in their [`Invocation`].
    pub fn from_shared(tree: Arc<CommandTree>, program: &str) -> Self {
        let grammar = assemble(tree.root(), program);
        Self {
            tree,
            grammar,
            program: program.to_string(),
        }
    }

    /// Changes the program name shown in usage lines.
    pub fn with_program(self, program: &str) -> Self {
        Self::from_shared(self.tree, program)
    }

    pub fn tree(&self) -> &Arc<CommandTree> {
        &self.tree
    }

    pub fn grammar(&self) -> &clap::Command {
        &self.grammar
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Full help of the command at `path` (the root when empty).
    pub fn help<S: AsRef<str>>(&self, path: &[S]) -> Option<String> {
        render_help(self.tree.root(), path, &self.program)
    }

    /// Parses `argv` (without the program name) into the chain of selected
    /// commands and a flat namespace. No command is constructed.
    pub fn resolve<S: AsRef<str>>(&self, argv: &[S]) -> Result<Resolution, InvocationError> {
        let argv: Vec<&str> = argv.iter().map(|arg| arg.as_ref()).collect();
        let matches = self
            .grammar
            .clone()
            .try_get_matches_from(argv)
            .map_err(classify)?;

        let mut node = self.tree.root();
        let mut level = &matches;
        let mut chain: Vec<String> = Vec::new();
        let mut namespace = Namespace::new();
        let mut explicit: HashSet<String> = HashSet::new();
        loop {
            collect_level(node, level, &mut namespace, &mut explicit)?;
            let Some((name, next)) = level.subcommand() else {
                break;
            };
            node = node.child(name).ok_or_else(|| DispatchError::CommandNotFound {
                name: name.to_string(),
                suggestions: Vec::new(),
                source: None,
            })?;
            chain.push(node.name().to_string());
            level = next;
        }
        check_exclusive(node, &namespace)?;

        debug!("Resolved command chain {:?}", chain);
        Ok(Resolution { chain, namespace })
    }

    /// Instantiates the commands along a resolution, top-down. The root
    /// applies the verbosity before any child is constructed.
    pub fn instantiate(
        &self,
        resolution: &Resolution,
        argv: &[String],
    ) -> Result<Box<dyn Command>, InvocationError> {
        self.bind(self.tree.root(), resolution, 0, argv)
    }

    fn bind(
        &self,
        node: &CommandNode,
        resolution: &Resolution,
        depth: usize,
        argv: &[String],
    ) -> Result<Box<dyn Command>, InvocationError> {
        match node.kind() {
            NodeKind::Leaf(constructor) => {
                debug!(
                    "Running command '{}' with parsed arguments {}",
                    node.name(),
                    resolution.namespace.to_json()
                );
                let invocation = Invocation {
                    path: node.path().to_vec(),
                    namespace: resolution.namespace.clone(),
                    argv: argv.to_vec(),
                    program: self.program.clone(),
                    tree: Arc::clone(&self.tree),
                };
                constructor(invocation).map_err(InvocationError::Command)
            }
            NodeKind::Dispatcher(registry) => {
                if node.name().is_root() {
                    if let Some(level) = resolution.namespace.str(LOG_LEVEL_ARGUMENT) {
                        logging::apply_name(level);
                    }
                }
                let Some(next) = resolution.chain.get(depth) else {
                    return Err(DispatchError::NotRunnable(node.name().to_string()).into());
                };
                let child = registry
                    .get(next)
                    .ok_or_else(|| DispatchError::CommandNotFound {
                        name: next.clone(),
                        suggestions: Vec::new(),
                        source: None,
                    })?;
                debug!("Dispatcher '{}' selected '{}'", node.name(), child.name());
                let chosen = self.bind(child, resolution, depth + 1, argv)?;
                Ok(Box::new(DispatcherCommand {
                    name: node.name().clone(),
                    namespace: resolution.namespace.clone(),
                    chosen,
                }))
            }
        }
    }

    /// Parses and runs one command line. An empty command line shows the
    /// help command when there is one.
    pub fn dispatch<S: AsRef<str>>(&self, argv: &[S]) -> Result<Value, InvocationError> {
        let argv: Vec<String> = argv.iter().map(|arg| arg.as_ref().to_string()).collect();
        if argv.is_empty() && self.tree.root().child(HELP_COMMAND).is_some() {
            debug!("No command given, falling back to '{HELP_COMMAND}'");
            return self.dispatch(&[HELP_COMMAND]);
        }

        let resolution = self.resolve(argv.as_slice())?;
        let mut command = self.instantiate(&resolution, &argv)?;
        command.run().map_err(InvocationError::Command)
    }

    /// Runs a whole command line, split like a POSIX shell would.
    pub fn run_line(&self, line: &str) -> Result<Value, InvocationError> {
        let argv = shlex::split(line).ok_or_else(|| ParseError::InvalidCommandLine(line.to_string()))?;
        self.dispatch(argv.as_slice())
    }

    /// Runs the command at `path` with the given values, without parsing a
    /// command line. Arguments not given take their defaults; values are
    /// checked the same way parsed ones are.
    pub fn run_with<S, K, V>(
        &self,
        path: &[S],
        values: impl IntoIterator<Item = (K, V)>,
    ) -> Result<Value, InvocationError>
    where
        S: AsRef<str>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let node = self.tree.find(path).ok_or_else(|| DispatchError::CommandNotFound {
            name: path
                .iter()
                .map(|segment| segment.as_ref())
                .collect::<Vec<&str>>()
                .join(" "),
            suggestions: Vec::new(),
            source: None,
        })?;
        if node.is_dispatcher() {
            return Err(DispatchError::NotRunnable(node.name().to_string()).into());
        }

        let mut namespace: Namespace = node
            .arguments()
            .iter()
            .map(|spec| (spec.name.clone(), spec.initial_value()))
            .collect();
        let mut given: HashSet<String> = HashSet::new();
        for (key, value) in values {
            let key = key.as_ref();
            let spec = node.find_argument(key).ok_or_else(|| ParseError::UnknownArgument {
                command: node.name().to_string(),
                argument: key.to_string(),
            })?;
            let value = checked_value(spec, value.into())?;
            check_shape(node, spec, &value)?;
            given.insert(spec.name.clone());
            namespace.insert(spec.name.clone(), value);
        }

        if let Some(missing) = node
            .arguments()
            .iter()
            .find(|spec| spec.is_required() && !given.contains(&spec.name))
        {
            return Err(ParseError::MissingArgument {
                command: node.name().to_string(),
                argument: missing.name.clone(),
            }
            .into());
        }
        check_exclusive(node, &namespace)?;

        let resolution = Resolution {
            chain: node.path().to_vec(),
            namespace,
        };
        let mut command = self.instantiate(&resolution, &[])?;
        command.run().map_err(InvocationError::Command)
    }
}

/// Reads the values of the arguments attached at one grammar level.
///
/// Values given on the command line always win; a deeper level's default
/// replaces a shallower default but never a value given explicitly higher up.
fn collect_level(
    node: &CommandNode,
    matches: &ArgMatches,
    namespace: &mut Namespace,
    explicit: &mut HashSet<String>,
) -> Result<(), ParseError> {
    for spec in node.arguments() {
        if matches.value_source(&spec.name) == Some(ValueSource::CommandLine) {
            namespace.insert(spec.name.clone(), parsed_value(spec, matches)?);
            explicit.insert(spec.name.clone());
        } else if !explicit.contains(&spec.name) {
            namespace.insert(spec.name.clone(), spec.initial_value());
        }
    }
    Ok(())
}

fn parsed_value(spec: &ArgumentSpec, matches: &ArgMatches) -> Result<Value, ParseError> {
    if spec.action == Action::StoreFlag {
        return Ok(spec.flag_value());
    }
    let values: Vec<Value> = matches
        .try_get_many::<Value>(&spec.name)
        .map_err(|error| ParseError::InvalidValue {
            argument: spec.name.clone(),
            message: error.to_string(),
        })?
        .map(|values| values.cloned().collect())
        .unwrap_or_default();
    if spec.arity.is_multiple() {
        Ok(Value::List(values))
    } else {
        Ok(values.into_iter().next().unwrap_or(Value::Null))
    }
}

fn checked_value(spec: &ArgumentSpec, value: Value) -> Result<Value, ParseError> {
    let invalid = |message: String| ParseError::InvalidValue {
        argument: spec.name.clone(),
        message,
    };
    let value = coerce_declared(spec.action, value).map_err(invalid)?;
    check_choices(&value, spec.choices.as_deref()).map_err(invalid)?;
    Ok(value)
}

/// A value given without parsing must have the shape parsing would give it:
/// a list for multi-value arities, of the declared length, and never null
/// for a required argument.
fn check_shape(node: &CommandNode, spec: &ArgumentSpec, value: &Value) -> Result<(), ParseError> {
    if value.is_null() {
        if spec.is_required() {
            return Err(ParseError::MissingArgument {
                command: node.name().to_string(),
                argument: spec.name.clone(),
            });
        }
        return Ok(());
    }
    if !spec.arity.is_multiple() {
        return Ok(());
    }
    let invalid = |message: String| ParseError::InvalidValue {
        argument: spec.name.clone(),
        message,
    };
    let Value::List(items) = value else {
        return Err(invalid(format!("expected a list of values, got {value}")));
    };
    match spec.arity {
        Arity::Exact(count) if items.len() != count => Err(invalid(format!(
            "expected {count} values, got {}",
            items.len()
        ))),
        Arity::OneOrMore if items.is_empty() => Err(invalid("expected at least one value".to_string())),
        _ => Ok(()),
    }
}

fn check_exclusive(node: &CommandNode, namespace: &Namespace) -> Result<(), ParseError> {
    for group in node.exclusive() {
        let given = group
            .iter()
            .filter(|name| namespace.get(name).is_some_and(Value::is_truthy))
            .count();
        if given != 1 {
            return Err(ParseError::ExclusiveArguments(group.clone()));
        }
    }
    Ok(())
}

/// A dispatcher level bound to the child it selected. Running it runs the
/// child.
#[derive(Debug)]
pub struct DispatcherCommand {
    name: CommandName,
    namespace: Namespace,
    chosen: Box<dyn Command>,
}

impl DispatcherCommand {
    pub fn name(&self) -> &CommandName {
        &self.name
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn chosen(&self) -> &dyn Command {
        self.chosen.as_ref()
    }
}

impl Command for DispatcherCommand {
    fn run(&mut self) -> anyhow::Result<Value> {
        debug!("Dispatcher '{}' delegating to its chosen command", self.name);
        self.chosen.run()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::argument::ArgumentDescriptor;
    use crate::core::tree::CommandDescriptor;
    use crate::models::Arity;

    #[derive(Debug)]
    struct Echo(Invocation);

    impl Command for Echo {
        fn run(&mut self) -> anyhow::Result<Value> {
            let mut values = indexmap::IndexMap::new();
            for (name, value) in self.0.namespace.iter() {
                values.insert(name.to_string(), value.clone());
            }
            Ok(Value::Map(values))
        }
    }

    fn echo(invocation: Invocation) -> anyhow::Result<Box<dyn Command>> {
        Ok(Box::new(Echo(invocation)))
    }

    fn dispatcher() -> Dispatcher {
        let root = CommandDescriptor::root().argument(
            "log_level",
            ArgumentDescriptor::string()
                .aliases(["-v", "--log-level"])
                .choices(["INFO", "DEBUG"])
                .default("INFO"),
        );
        let tree = CommandTree::load(
            root,
            [
                CommandDescriptor::leaf(echo)
                    .name("show")
                    .argument("target", ArgumentDescriptor::string().arity(Arity::Optional))
                    .argument("pair", ArgumentDescriptor::integer().aliases(["--pair"]).arity(Arity::Exact(2)))
                    .argument("tags", ArgumentDescriptor::list().aliases(["-t"]).default("a,b")),
                CommandDescriptor::leaf(echo)
                    .name("need")
                    .argument("target", ArgumentDescriptor::string()),
                CommandDescriptor::dispatcher().name("db").argument(
                    "database",
                    ArgumentDescriptor::string().aliases(["-d", "--database"]).default("main"),
                ),
                CommandDescriptor::leaf(echo)
                    .name("backup")
                    .parent("db")
                    .argument("database", ArgumentDescriptor::partial().default("backups"))
                    .argument("full", ArgumentDescriptor::flag().aliases(["--full"]))
                    .argument("incremental", ArgumentDescriptor::flag().aliases(["--incremental"]))
                    .exclusive(["full", "incremental"]),
            ],
        )
        .unwrap();
        Dispatcher::new(tree)
    }

    fn run(dispatcher: &Dispatcher, argv: &[&str]) -> indexmap::IndexMap<String, Value> {
        match dispatcher.dispatch(argv).unwrap() {
            Value::Map(values) => values,
            other => panic!("unexpected result {other}"),
        }
    }

    #[test]
    fn test_resolution_chain_uses_canonical_names() {
        let dispatcher = dispatcher();
        let resolution = dispatcher.resolve(&["db", "backup", "--full"]).unwrap();
        assert_eq!(resolution.chain, ["db", "backup"]);
        assert_eq!(resolution.namespace.str("log_level"), Some("INFO"));
    }

    #[test]
    fn test_dispatcher_options_accepted_on_both_sides() {
        let dispatcher = dispatcher();
        let before = run(&dispatcher, &["db", "-d", "x", "backup", "--full"]);
        let after = run(&dispatcher, &["db", "backup", "--full", "-d", "x"]);
        assert_eq!(before.get("database"), Some(&Value::from("x")));
        assert_eq!(after.get("database"), Some(&Value::from("x")));

        let defaulted = run(&dispatcher, &["-v", "DEBUG", "db", "backup", "--incremental"]);
        assert_eq!(defaulted.get("database"), Some(&Value::from("backups")));
        assert_eq!(defaulted.get("log_level"), Some(&Value::from("DEBUG")));
    }

    #[test]
    fn test_values_follow_arity() {
        let dispatcher = dispatcher();
        let values = run(&dispatcher, &["show", "--pair", "1", "2", "-t", "x,y"]);
        assert_eq!(values.get("pair"), Some(&Value::from(vec![1, 2])));
        assert_eq!(values.get("tags"), Some(&Value::from(vec!["x", "y"])));
        assert_eq!(values.get("target"), Some(&Value::Null));

        let defaults = run(&dispatcher, &["show", "here"]);
        assert_eq!(defaults.get("tags"), Some(&Value::from(vec!["a", "b"])));
        assert_eq!(defaults.get("pair"), Some(&Value::Null));
        assert_eq!(defaults.get("target"), Some(&Value::from("here")));
    }

    #[test]
    fn test_exclusive_groups_need_exactly_one() {
        let dispatcher = dispatcher();
        for argv in [
            &["db", "backup"][..],
            &["db", "backup", "--full", "--incremental"][..],
        ] {
            assert!(matches!(
                dispatcher.dispatch(argv),
                Err(InvocationError::Parse(ParseError::ExclusiveArguments(_)))
            ));
        }
    }

    #[test]
    fn test_unknown_command_suggests_names() {
        let dispatcher = dispatcher();
        let error = dispatcher.dispatch(&["sho"]).unwrap_err();
        assert_eq!(error.exit_code(), USAGE_EXIT_CODE);
        match error {
            InvocationError::Dispatch(DispatchError::CommandNotFound { name, suggestions, .. }) => {
                assert_eq!(name, "sho");
                assert_eq!(suggestions, ["show"]);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_help_requests_exit_zero() {
        let dispatcher = dispatcher();
        let error = dispatcher.dispatch(&["db", "--help"]).unwrap_err();
        assert_eq!(error.exit_code(), 0);
        assert!(matches!(error, InvocationError::Parse(ref parse) if parse.is_help()));
    }

    #[test]
    fn test_run_with_checks_values() {
        let dispatcher = dispatcher();
        let values = dispatcher
            .run_with(&["db", "backup"], [("full", Value::Bool(true)), ("-d", Value::from("x"))])
            .unwrap();
        let Value::Map(values) = values else {
            panic!("unexpected result");
        };
        assert_eq!(values.get("database"), Some(&Value::from("x")));
        assert_eq!(values.get("log_level"), Some(&Value::from("INFO")));

        assert!(matches!(
            dispatcher.run_with(&["db", "backup"], [("nope", Value::Null)]),
            Err(InvocationError::Parse(ParseError::UnknownArgument { .. }))
        ));
        assert!(matches!(
            dispatcher.run_with(&["show"], [("log_level", "LOUD")]),
            Err(InvocationError::Parse(ParseError::InvalidValue { .. }))
        ));
        assert!(matches!(
            dispatcher.run_with(&["db"], Vec::<(&str, Value)>::new()),
            Err(InvocationError::Dispatch(DispatchError::NotRunnable(_)))
        ));
    }

    #[test]
    fn test_run_with_checks_arity() {
        let dispatcher = dispatcher();
        let parsed = dispatcher.dispatch(&["show", "--pair", "1", "2"]).unwrap();
        let direct = dispatcher
            .run_with(&["show"], [("pair", Value::from(vec![1, 2]))])
            .unwrap();
        assert_eq!(parsed, direct);

        for pair in [Value::Int(1), Value::from(vec![1, 2, 3])] {
            assert!(matches!(
                dispatcher.run_with(&["show"], [("pair", pair)]),
                Err(InvocationError::Parse(ParseError::InvalidValue { ref argument, .. })) if argument == "pair"
            ));
        }

        assert!(matches!(
            dispatcher.run_with(&["need"], [("target", Value::Null)]),
            Err(InvocationError::Parse(ParseError::MissingArgument { ref argument, .. })) if argument == "target"
        ));
        assert_eq!(dispatcher.dispatch(&["need"]).unwrap_err().exit_code(), USAGE_EXIT_CODE);
        assert!(dispatcher.run_with(&["need"], [("target", "here")]).is_ok());
    }

    #[test]
    fn test_run_line_splits_like_a_shell() {
        let dispatcher = dispatcher();
        let Value::Map(values) = dispatcher.run_line("show 'two words'").unwrap() else {
            panic!("unexpected result");
        };
        assert_eq!(values.get("target"), Some(&Value::from("two words")));
        assert!(matches!(
            dispatcher.run_line("show 'unbalanced"),
            Err(InvocationError::Parse(ParseError::InvalidCommandLine(_)))
        ));
    }
}
