// src/cli/handlers/version.rs

use crate::core::command::{Command, Invocation};
use crate::core::tree::CommandDescriptor;
use crate::models::Value;
use anyhow::Result;

pub fn descriptor() -> CommandDescriptor {
    CommandDescriptor::leaf(VersionCommand::construct)
        .name("version")
        .module(module_path!())
        .help_short("Print the program name and version.")
}

#[derive(Debug)]
pub struct VersionCommand {
    program: String,
}

impl VersionCommand {
    fn construct(invocation: Invocation) -> Result<Box<dyn Command>> {
        Ok(Box::new(Self {
            program: invocation.program,
        }))
    }
}

impl Command for VersionCommand {
    fn run(&mut self) -> Result<Value> {
        let text = format!("{} {}", self.program, clap::crate_version!());
        println!("{text}");
        Ok(Value::Str(text))
    }
}
