use odev::cli::builtin_commands;
use odev::{
    Arity, ArgumentDescriptor, Command, CommandDescriptor, CommandTree, DispatchError, Dispatcher,
    Invocation, InvocationError, LoadError, ParseError, RegistrationError, Value, bootstrap,
    root_descriptor,
};
use std::sync::atomic::{AtomicUsize, Ordering};

// --- Test commands ---

/// Returns its namespace, so tests can observe what it was built with.
#[derive(Debug)]
struct Echo(Invocation);

impl Command for Echo {
    fn run(&mut self) -> anyhow::Result<Value> {
        Ok(Value::Map(
            self.0
                .namespace
                .iter()
                .map(|(name, value)| (name.to_string(), value.clone()))
                .collect(),
        ))
    }
}

fn echo(invocation: Invocation) -> anyhow::Result<Box<dyn Command>> {
    Ok(Box::new(Echo(invocation)))
}

static UNKNOWN_CONSTRUCTED: AtomicUsize = AtomicUsize::new(0);

fn counting(invocation: Invocation) -> anyhow::Result<Box<dyn Command>> {
    UNKNOWN_CONSTRUCTED.fetch_add(1, Ordering::SeqCst);
    echo(invocation)
}

#[derive(Debug, thiserror::Error)]
#[error("the disk is full")]
struct DiskFull;

#[derive(Debug)]
struct Failing;

impl Command for Failing {
    fn run(&mut self) -> anyhow::Result<Value> {
        Err(DiskFull.into())
    }
}

fn failing(_: Invocation) -> anyhow::Result<Box<dyn Command>> {
    Ok(Box::new(Failing))
}

fn build_command() -> CommandDescriptor {
    CommandDescriptor::leaf(echo)
        .name("build")
        .aliases(["builds"])
        .module("tests::build")
        .doc("Build the project.")
        .argument(
            "show_count",
            ArgumentDescriptor::integer()
                .aliases(["--show"])
                .description("Number of entries to show"),
        )
        .argument(
            "cache",
            ArgumentDescriptor::flag().aliases(["--no-cache"]).default(true),
        )
        .argument("expression", ArgumentDescriptor::eval().aliases(["-e", "--eval"]))
}

fn dispatcher() -> Dispatcher {
    Dispatcher::new(bootstrap([build_command()]).unwrap())
}

fn values(result: Result<Value, InvocationError>) -> indexmap::IndexMap<String, Value> {
    match result.unwrap() {
        Value::Map(values) => values,
        other => panic!("unexpected result {other}"),
    }
}

// --- Scenarios ---

#[test]
fn scenario_a_build_resolves_with_integer_option() {
    let dispatcher = dispatcher();
    assert!(dispatcher.tree().root().child("help").is_some());

    let resolution = dispatcher.resolve(&["builds", "--show", "2"]).unwrap();
    assert_eq!(resolution.chain, ["build"]);
    assert_eq!(resolution.namespace.int("show_count"), Some(2));

    let result = values(dispatcher.dispatch(&["build", "--show", "2"]));
    assert_eq!(result.get("show_count"), Some(&Value::Int(2)));
}

#[test]
fn scenario_b_unknown_command_never_constructs() {
    let tree = bootstrap([CommandDescriptor::leaf(counting).name("known")]).unwrap();
    let dispatcher = Dispatcher::new(tree);

    let error = dispatcher.dispatch(&["unknown"]).unwrap_err();
    assert!(matches!(
        error,
        InvocationError::Dispatch(DispatchError::CommandNotFound { ref name, .. }) if name == "unknown"
    ));
    assert_eq!(error.exit_code(), 2);
    assert_eq!(UNKNOWN_CONSTRUCTED.load(Ordering::SeqCst), 0);
}

#[test]
fn scenario_c_flag_with_true_default() {
    let dispatcher = dispatcher();
    let absent = values(dispatcher.dispatch(&["build"]));
    assert_eq!(absent.get("cache"), Some(&Value::Bool(true)));

    let present = values(dispatcher.dispatch(&["build", "--no-cache"]));
    assert_eq!(present.get("cache"), Some(&Value::Bool(false)));
}

#[test]
fn scenario_d_sibling_alias_conflict_fails_at_load() {
    let result = bootstrap([
        CommandDescriptor::leaf(echo).name("init").aliases(["i"]),
        CommandDescriptor::leaf(echo).name("install").aliases(["i"]),
    ]);
    match result {
        Err(LoadError::Registration(RegistrationError::Conflict { command, conflicts, .. })) => {
            assert_eq!(command, "install");
            assert_eq!(conflicts, [("i".to_string(), "init".to_string())]);
        }
        other => panic!("expected a conflict, got {other:?}"),
    }
}

#[test]
fn scenario_e_eval_accepts_literals_only() {
    let dispatcher = dispatcher();
    let result = values(dispatcher.dispatch(&["build", "--eval", "[1, 2, 3]"]));
    assert_eq!(result.get("expression"), Some(&Value::from(vec![1, 2, 3])));

    let error = dispatcher
        .dispatch(&["build", "-e", "__import__('os')"])
        .unwrap_err();
    assert!(matches!(error, InvocationError::Parse(ParseError::Usage(_))));
    assert_eq!(error.exit_code(), 2);
}

// --- Properties ---

#[test]
fn uniqueness_covers_names_and_aliases() {
    let result = bootstrap([
        CommandDescriptor::leaf(echo).name("deploy"),
        CommandDescriptor::leaf(echo).name("push").aliases(["deploy"]),
    ]);
    assert!(matches!(
        result,
        Err(LoadError::Registration(RegistrationError::Conflict { .. }))
    ));

    // Same names in different scopes do not clash.
    let nested = bootstrap([
        CommandDescriptor::dispatcher().name("db"),
        CommandDescriptor::leaf(echo).name("list").parent("db"),
        CommandDescriptor::leaf(echo).name("list"),
    ]);
    assert!(nested.is_ok());
}

#[test]
fn merge_overrides_only_restated_fields() {
    let base = CommandDescriptor::abstract_base().module("tests::base").argument(
        "x",
        ArgumentDescriptor::integer().aliases(["-x"]).default(1).choices([1, 2]),
    );
    let tree = bootstrap([CommandDescriptor::leaf(echo)
        .name("sub")
        .extends(&base)
        .argument("x", ArgumentDescriptor::partial().default(2))])
    .unwrap();

    let x = tree.find(&["sub"]).unwrap().find_argument("x").unwrap();
    assert_eq!(x.default, Some(Value::Int(2)));
    assert_eq!(x.choices, Some(vec![Value::Int(1), Value::Int(2)]));
}

#[test]
fn merge_keeps_first_declaration_order() {
    let base = CommandDescriptor::abstract_base()
        .argument("alpha", ArgumentDescriptor::string().aliases(["--alpha"]))
        .argument("beta", ArgumentDescriptor::string().aliases(["--beta"]));
    let tree = bootstrap([CommandDescriptor::leaf(echo)
        .name("ordered")
        .extends(&base)
        .argument("gamma", ArgumentDescriptor::string().aliases(["--gamma"]))
        .argument("alpha", ArgumentDescriptor::partial().description("restated"))])
    .unwrap();

    let names: Vec<&str> = tree
        .find(&["ordered"])
        .unwrap()
        .arguments()
        .iter()
        .map(|spec| spec.name.as_str())
        .collect();
    assert_eq!(names, ["log_level", "alpha", "beta", "gamma"]);
}

#[test]
fn run_with_matches_parsed_command_line() {
    let dispatcher = dispatcher();
    let parsed = dispatcher.dispatch(&["build", "--show", "2", "--no-cache"]).unwrap();
    let direct = dispatcher
        .run_with(
            &["build"],
            [("show_count", Value::Int(2)), ("cache", Value::Bool(false))],
        )
        .unwrap();
    assert_eq!(parsed, direct);

    let coerced = dispatcher.run_with(&["builds"], [("show_count", "2"), ("cache", "false")]);
    assert_eq!(coerced.unwrap(), parsed);
}

#[test]
fn loading_twice_does_not_duplicate_entries() {
    let mut tree = CommandTree::new(root_descriptor()).unwrap();
    let first = tree.register_all(builtin_commands().into_iter().chain([build_command()])).unwrap();
    let second = tree.register_all(builtin_commands().into_iter().chain([build_command()])).unwrap();
    assert_eq!(first, 3);
    assert_eq!(second, 0);
    assert_eq!(tree.root().children().unwrap().len(), 3);
}

#[test]
fn leaf_errors_propagate_unchanged() {
    let tree = bootstrap([CommandDescriptor::leaf(failing).name("fail")]).unwrap();
    let error = Dispatcher::new(tree).dispatch(&["fail"]).unwrap_err();
    assert_eq!(error.exit_code(), 1);
    assert!(error.command_error().unwrap().downcast_ref::<DiskFull>().is_some());
    assert_eq!(error.to_string(), "the disk is full");
}

#[test]
fn remainder_captures_unknown_flags() {
    let tree = bootstrap([CommandDescriptor::leaf(echo)
        .name("exec")
        .argument("program", ArgumentDescriptor::string())
        .argument("arguments", ArgumentDescriptor::string().arity(Arity::Remainder))])
    .unwrap();
    let result = values(Dispatcher::new(tree).dispatch(&["exec", "ls", "-la", "--color=auto"]));
    assert_eq!(result.get("program"), Some(&Value::from("ls")));
    assert_eq!(
        result.get("arguments"),
        Some(&Value::from(vec!["-la", "--color=auto"]))
    );
}

#[test]
fn declaration_errors_fail_at_load() {
    let result = bootstrap([CommandDescriptor::leaf(echo)
        .name("broken")
        .argument("mode", ArgumentDescriptor::string().default("fast").choices(["slow"]))]);
    assert!(matches!(result, Err(LoadError::Declaration { .. })));
}
