// src/bin/odev.rs

use colored::*;
use odev::cli::{bootstrap, dispatcher::Dispatcher};
use odev::{InvocationError, system::logging};
use std::process::exit;

/// Entry point: installs logging, builds the command tree, dispatches the
/// command line and turns the outcome into an exit code.
fn main() {
    logging::init();

    let tree = match bootstrap(Vec::new()) {
        Ok(tree) => tree,
        Err(e) => {
            // A broken command definition; nothing can run.
            eprintln!("\n{}: {}", "Error".red().bold(), e);
            exit(1);
        }
    };

    let argv: Vec<String> = std::env::args().skip(1).collect();
    match Dispatcher::new(tree).dispatch(argv.as_slice()) {
        Ok(value) => exit(value.exit_code()),
        Err(InvocationError::Parse(odev::ParseError::Usage(e))) => {
            // Help and usage errors come formatted by the parser.
            let _ = e.print();
            exit(e.exit_code());
        }
        Err(e) => {
            log::debug!("{e:?}");
            eprintln!("\n{}: {}", "Error".red().bold(), e);
            exit(e.exit_code());
        }
    }
}
