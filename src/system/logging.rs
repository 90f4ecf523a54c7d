// src/system/logging.rs

use crate::constants::LOG_LEVEL_ENV;
use log::LevelFilter;
use std::fmt;
use std::io::Write;

/// Verbosity levels accepted by `-v/--log-level`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Critical,
    Error,
    Warning,
    #[default]
    Info,
    Debug,
    NotSet,
}

impl LogLevel {
    pub const NAMES: [&'static str; 6] = ["CRITICAL", "ERROR", "WARNING", "INFO", "DEBUG", "NOTSET"];

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "CRITICAL" => Some(Self::Critical),
            "ERROR" => Some(Self::Error),
            "WARNING" => Some(Self::Warning),
            "INFO" => Some(Self::Info),
            "DEBUG" => Some(Self::Debug),
            "NOTSET" => Some(Self::NotSet),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Critical => "CRITICAL",
            Self::Error => "ERROR",
            Self::Warning => "WARNING",
            Self::Info => "INFO",
            Self::Debug => "DEBUG",
            Self::NotSet => "NOTSET",
        }
    }

    /// The `log` filter this level maps to. `log` has no level above
    /// errors, so CRITICAL shares it with ERROR.
    pub fn filter(self) -> LevelFilter {
        match self {
            Self::Critical | Self::Error => LevelFilter::Error,
            Self::Warning => LevelFilter::Warn,
            Self::Info => LevelFilter::Info,
            Self::Debug => LevelFilter::Debug,
            Self::NotSet => LevelFilter::Trace,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The default verbosity: `ODEV_LOG_LEVEL` when it names a valid level,
/// else INFO.
pub fn level_from_env() -> LogLevel {
    std::env::var(LOG_LEVEL_ENV)
        .ok()
        .and_then(|name| LogLevel::from_name(name.trim()))
        .unwrap_or_default()
}

/// Installs the logger. `RUST_LOG` directives decide which modules may log;
/// the global maximum level then follows the verbosity in effect.
pub fn init() {
    let result = env_logger::Builder::new()
        .filter_level(LevelFilter::Trace)
        .parse_default_env()
        .format(|buf, record| {
            let level = record.level();
            let style = buf.default_level_style(level);
            writeln!(buf, "{style}{level:<5}{style:#} {}", record.args())
        })
        .try_init();
    if result.is_ok() {
        apply(level_from_env());
    }
}

/// Raises or lowers the global verbosity.
pub fn apply(level: LogLevel) {
    log::set_max_level(level.filter());
}

/// Applies a level given by name; unknown names are ignored.
pub fn apply_name(name: &str) {
    match LogLevel::from_name(name) {
        Some(level) => {
            apply(level);
            log::debug!("Log level set to {level}");
        }
        None => log::warn!("Ignoring unknown log level '{name}'"),
    }
}
