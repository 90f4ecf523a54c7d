// src/cli/handlers/help.rs

use crate::cli::dispatcher::Dispatcher;
use crate::core::argument::ArgumentDescriptor;
use crate::core::command::{Command, Invocation};
use crate::core::tree::{CommandDescriptor, CommandNode};
use crate::models::{Arity, Value};
use anyhow::{Result, anyhow};
use colored::*;

/// Declares the `help` command.
pub fn descriptor() -> CommandDescriptor {
    CommandDescriptor::leaf(HelpCommand::construct)
        .name("help")
        .aliases(["h", "man"])
        .module(module_path!())
        .doc(
            "Display extensive help about the selected command or a generic help message
            lightly covering all available commands.",
        )
        .argument(
            "command",
            ArgumentDescriptor::string()
                .arity(Arity::ZeroOrMore)
                .description("Get help about a specific command, given as a path for nested commands"),
        )
        .argument(
            "names_only",
            ArgumentDescriptor::flag()
                .aliases(["-1", "--one-column", "--names-only"])
                .description("List command names one per line, useful for parsing"),
        )
}

#[derive(Debug)]
pub struct HelpCommand {
    invocation: Invocation,
}

impl HelpCommand {
    fn construct(invocation: Invocation) -> Result<Box<dyn Command>> {
        Ok(Box::new(Self { invocation }))
    }

    /// Every top-level name and alias, sorted, one per line.
    fn command_names(&self) -> String {
        let mut names: Vec<&str> = self
            .invocation
            .tree
            .root()
            .children()
            .map(|registry| registry.names().collect())
            .unwrap_or_default();
        names.sort_unstable();
        names.join("\n")
    }

    fn single_command_help(&self, path: &[String]) -> Result<String> {
        let node = self
            .invocation
            .tree
            .find(path)
            .ok_or_else(|| anyhow!("Command {} not found.", path.join(" ")))?;
        let dispatcher = Dispatcher::from_shared(self.invocation.tree.clone(), &self.invocation.program);
        let mut text = dispatcher
            .help(path)
            .ok_or_else(|| anyhow!("Command {} not found.", path.join(" ")))?;
        if !node.aliases().is_empty() {
            text.push_str(&format!("\n{} {}\n", "Aliases:".bold(), node.aliases().join(", ")));
        }
        Ok(text)
    }

    fn all_commands_help(&self) -> String {
        let program = &self.invocation.program;
        let mut text = format!(
            "{}\n\n{} {}\n\nFor help on a specific command, use {}\n",
            format!("{} {}", program.to_uppercase(), clap::crate_version!()).purple().bold(),
            "Usage:".bold().underline(),
            format!("{program} <command> <args>").cyan().bold(),
            format!("{program} <command> --help").cyan().bold(),
        );

        let commands: Vec<&CommandNode> = self
            .invocation
            .tree
            .root()
            .children()
            .map(|registry| registry.commands().collect())
            .unwrap_or_default();
        if commands.is_empty() {
            return text;
        }

        let width = commands
            .iter()
            .map(|command| command.name().as_str().len())
            .max()
            .unwrap_or(0);
        text.push_str(&format!("\n{}\n\n", "The following commands are provided:".bold().underline()));
        for command in commands {
            let name = command.name().as_str();
            text.push_str(&format!(
                "{}{}    {}\n",
                name.bold(),
                " ".repeat(width - name.len()),
                command.help_short()
            ));
        }
        text
    }
}

impl Command for HelpCommand {
    fn run(&mut self) -> Result<Value> {
        let namespace = &self.invocation.namespace;
        let path = namespace.strings("command");
        let text = if namespace.flag("names_only") {
            self.command_names()
        } else if !path.is_empty() {
            self.single_command_help(&path)?
        } else {
            self.all_commands_help()
        };
        println!("{}", text.trim_end());
        Ok(Value::Str(text))
    }
}
