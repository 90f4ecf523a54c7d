// src/core/mod.rs

//! # Command Framework Core
//!
//! Declaring arguments (`argument`, `actions`, `literal`), merging them along
//! a command's ancestry (`merger`), registering commands per dispatcher level
//! (`registry`, `tree`) and assembling the parser grammar (`assembler`).

pub mod actions;
pub mod argument;
pub mod assembler;
pub mod command;
pub mod commons;
pub mod literal;
pub mod merger;
pub mod namespace;
pub mod registry;
pub mod tree;
