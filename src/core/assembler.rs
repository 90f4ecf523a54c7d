// src/core/assembler.rs

use crate::core::actions::{check_choices, convert, format_choices};
use crate::core::tree::CommandNode;
use crate::models::{Action, ArgumentSpec, Arity, Value};
use clap::{Arg, ArgAction};

/// Builds the grammar of a whole (sub)tree, starting at `node`.
///
/// Every node consumes its merged arguments. Options declared on a
/// dispatcher are merged into every descendant as well, so they are accepted
/// on either side of the child's name.
pub fn assemble(node: &CommandNode, program: &str) -> clap::Command {
    build_command(node, program.to_string())
        .bin_name(program.to_string())
        .no_binary_name(true)
}

/// Renders the full help of the command at `path` below `root`, by name or
/// alias. `None` when the path does not resolve.
pub fn render_help<S: AsRef<str>>(root: &CommandNode, path: &[S], program: &str) -> Option<String> {
    let mut grammar = assemble(root, program);
    grammar.build();
    let mut current = &mut grammar;
    for segment in path {
        current = current.find_subcommand_mut(segment.as_ref())?;
    }
    Some(current.render_long_help().to_string())
}

fn build_command(node: &CommandNode, display_name: String) -> clap::Command {
    let mut command = clap::Command::new(display_name)
        .args_override_self(true)
        .disable_version_flag(true);
    if !node.help_short().is_empty() {
        command = command.about(node.help_short().to_string());
    }
    if !node.help().is_empty() {
        command = command.long_about(node.help().to_string());
    }

    for spec in node.arguments() {
        command = command.arg(build_arg(spec));
    }

    if let Some(children) = node.children() {
        command = command
            .subcommand_required(true)
            .disable_help_subcommand(true)
            .subcommand_value_name("COMMAND");
        for child in children.commands() {
            let subcommand = build_command(child, child.name().to_string())
                .visible_aliases(child.aliases().to_vec());
            command = command.subcommand(subcommand);
        }
    }
    command
}

/// Translates one argument into its grammar counterpart.
pub fn build_arg(spec: &ArgumentSpec) -> Arg {
    let mut arg = Arg::new(spec.name.clone());

    if !spec.is_positional() {
        let mut longs = Vec::new();
        let mut shorts = Vec::new();
        for flag in spec.flags() {
            if let Some(long) = flag.strip_prefix("--") {
                longs.push(long.to_string());
            } else if let Some(short) = flag.strip_prefix('-').and_then(|rest| rest.chars().next()) {
                shorts.push(short);
            }
        }
        let mut longs = longs.into_iter();
        if let Some(long) = longs.next() {
            arg = arg.long(long).visible_aliases(longs.collect::<Vec<_>>());
        }
        let mut shorts = shorts.into_iter();
        if let Some(short) = shorts.next() {
            arg = arg.short(short).visible_short_aliases(shorts.collect::<Vec<_>>());
        }
    }

    if let Some(help) = help_text(spec) {
        arg = arg.help(help);
    }

    if spec.action == Action::StoreFlag {
        let action = if spec.flag_value() == Value::Bool(false) {
            ArgAction::SetFalse
        } else {
            ArgAction::SetTrue
        };
        return arg.action(action);
    }

    arg = arg
        .action(ArgAction::Set)
        .value_parser(value_parser(spec.action, spec.choices.clone()));
    if !spec.is_positional() {
        arg = arg.value_name(spec.name.to_uppercase());
    }
    if matches!(spec.action, Action::StoreInt | Action::StoreEval) {
        arg = arg.allow_negative_numbers(true);
    }

    arg = match spec.arity {
        Arity::Single => arg.num_args(1),
        Arity::Exact(count) => arg.num_args(count),
        Arity::Optional if spec.is_positional() => arg.num_args(1),
        Arity::Optional => arg.num_args(0..=1),
        Arity::ZeroOrMore => arg.num_args(0..),
        Arity::OneOrMore => arg.num_args(1..),
        Arity::Remainder => arg
            .num_args(0..)
            .trailing_var_arg(true)
            .allow_hyphen_values(true),
    };
    if spec.is_positional() {
        arg = arg.required(spec.is_required());
    }
    arg
}

fn value_parser(
    action: Action,
    choices: Option<Vec<Value>>,
) -> impl Fn(&str) -> Result<Value, String> + Clone + Send + Sync + 'static {
    move |raw: &str| {
        let value = convert(action, raw)?;
        check_choices(&value, choices.as_deref())?;
        Ok(value)
    }
}

fn help_text(spec: &ArgumentSpec) -> Option<String> {
    let mut parts: Vec<String> = Vec::new();
    if let Some(description) = &spec.description {
        parts.push(description.clone());
    }
    if let Some(choices) = &spec.choices {
        parts.push(format!("[possible values: {}]", format_choices(choices)));
    }
    match &spec.default {
        Some(Value::Null) | None => {}
        Some(_) if spec.action == Action::StoreFlag => {}
        Some(default) => parts.push(format!("[default: {default}]")),
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}
