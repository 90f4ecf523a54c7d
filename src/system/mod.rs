//! # System Interaction Layer
//!
//! - **`logging`**: installs the `env_logger` backend and maps the framework's
//!   verbosity levels onto `log` filters.

pub mod logging;
