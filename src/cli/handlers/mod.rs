// src/cli/handlers/mod.rs

// Built-in commands, available in every command tree.

pub mod help;
pub mod version;
