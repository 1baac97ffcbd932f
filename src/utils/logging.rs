//! Logging infrastructure for blobsniff.

use crate::core::config::Config;
use crate::core::error::{Error, Result};
use chrono::Local;
use env_logger::{Builder, Target};
use log::LevelFilter;
use std::io::Write;

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level
    pub level: LevelFilter,
    /// Show timestamps
    pub timestamps: bool,
    /// Show module path
    pub module_path: bool,
    /// Colour the level tag
    pub color: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LevelFilter::Warn,
            timestamps: true,
            module_path: false,
            color: true,
        }
    }
}

impl LogConfig {
    /// Create a log config from application config.
    pub fn from_config(config: &Config) -> Self {
        if config.logging.verbose_console {
            return Self::verbose();
        }

        let level = parse_level(&config.logging.log_level);
        Self {
            level,
            module_path: level >= LevelFilter::Debug,
            ..Self::default()
        }
    }

    /// Create a verbose log config for CLI.
    pub fn verbose() -> Self {
        Self {
            level: LevelFilter::Debug,
            timestamps: true,
            module_path: true,
            color: true,
        }
    }

    /// Create a quiet log config (errors only).
    pub fn quiet() -> Self {
        Self {
            level: LevelFilter::Error,
            timestamps: false,
            module_path: false,
            color: false,
        }
    }
}

/// Parse a level name, falling back to `warn`.
pub fn parse_level(name: &str) -> LevelFilter {
    match name.to_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "trace" => LevelFilter::Trace,
        "debug" => LevelFilter::Debug,
        "info" => LevelFilter::Info,
        "warn" | "warning" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        _ => LevelFilter::Warn,
    }
}

/// Initialize the logging system.
///
/// Logs go to stderr so JSON reports on stdout stay clean.
pub fn init_logging(config: LogConfig) -> Result<()> {
    let mut builder = Builder::new();
    builder.filter_level(config.level);
    builder.target(Target::Stderr);

    let LogConfig {
        timestamps,
        module_path,
        color,
        ..
    } = config;

    builder.format(move |buf, record| {
        let mut output = String::new();

        if timestamps {
            output.push_str(&format!("{} ", Local::now().format("%Y-%m-%d %H:%M:%S")));
        }

        let level_str = match (record.level(), color) {
            (log::Level::Error, true) => "\x1b[31mERROR\x1b[0m",
            (log::Level::Warn, true) => "\x1b[33mWARN\x1b[0m ",
            (log::Level::Info, true) => "\x1b[32mINFO\x1b[0m ",
            (log::Level::Debug, true) => "\x1b[34mDEBUG\x1b[0m",
            (log::Level::Trace, true) => "\x1b[35mTRACE\x1b[0m",
            (log::Level::Error, false) => "ERROR",
            (log::Level::Warn, false) => "WARN ",
            (log::Level::Info, false) => "INFO ",
            (log::Level::Debug, false) => "DEBUG",
            (log::Level::Trace, false) => "TRACE",
        };
        output.push_str(&format!("[{}] ", level_str));

        if module_path {
            if let Some(path) = record.module_path() {
                output.push_str(&format!("{}: ", path));
            }
        }

        output.push_str(&format!("{}", record.args()));

        writeln!(buf, "{}", output)
    });

    builder
        .try_init()
        .map_err(|e| Error::Internal(format!("Failed to initialize logger: {}", e)))?;

    log::debug!("Logging initialized with level: {:?}", config.level);
    Ok(())
}
