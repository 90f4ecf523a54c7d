// src/constants.rs

/// The name of the executable, used in usage lines and help output.
pub const PROGRAM_NAME: &str = "odev";

/// Display name of the ROOT sentinel (the top-level dispatcher).
pub const ROOT_NAME: &str = "<root>";

/// Arguments with at least one alias starting with this marker are options.
pub const FLAG_PREFIX: char = '-';

/// Flags reserved at every command node for displaying help.
pub const HELP_FLAGS: [&str; 2] = ["-h", "--help"];

/// Argument name reserved by the help flag.
pub const HELP_ARGUMENT: &str = "help";

/// Name of the built-in help command, also used when no command is given.
pub const HELP_COMMAND: &str = "help";

/// Name of the framework-wide verbosity argument declared on the root.
pub const LOG_LEVEL_ARGUMENT: &str = "log_level";

/// Environment variable overriding the default verbosity.
pub const LOG_LEVEL_ENV: &str = "ODEV_LOG_LEVEL";

/// Exit code for usage, argument and command resolution errors.
pub const USAGE_EXIT_CODE: i32 = 2;

/// Exit code for errors raised while a command runs.
pub const FAILURE_EXIT_CODE: i32 = 1;

/// Maximum nesting of arrays and mappings accepted by `store_eval` literals.
pub const MAX_LITERAL_DEPTH: usize = 64;
