//! Logging setup shared by the library consumers
//!
//! Output goes to stderr so rendered feeds on stdout stay pipeable.
//!
//! ```no_run
//! use libtusk::logging::{LoggingConfig, LogFormat};
//!
//! LoggingConfig::new(LogFormat::Json, "info".to_string(), false).init();
//! ```

use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Plain text, no colors
    Text,
    /// One JSON object per line
    Json,
    /// Multi-line colored output for development
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            _ => Err(format!(
                "Invalid log format: '{}'. Valid options: text, json, pretty",
                s
            )),
        }
    }
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LogFormat::Text => "text",
            LogFormat::Json => "json",
            LogFormat::Pretty => "pretty",
        };
        f.write_str(name)
    }
}

pub struct LoggingConfig {
    pub format: LogFormat,
    pub level: String,
    pub verbose: bool,
}

impl LoggingConfig {
    pub fn new(format: LogFormat, level: String, verbose: bool) -> Self {
        Self {
            format,
            level,
            verbose,
        }
    }

    /// The filter directive used when `RUST_LOG` is not set.
    pub fn directive(&self) -> &str {
        if self.verbose {
            "debug"
        } else {
            &self.level
        }
    }

    /// Install the global subscriber.
    ///
    /// Uses `try_init` so a second call (tests, embedding) is a no-op.
    pub fn init(&self) {
        use tracing_subscriber::EnvFilter;

        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.directive()));

        let installed = match self.format {
            LogFormat::Json => tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_current_span(true)
                .flatten_event(true)
                .with_target(true)
                .try_init(),
            LogFormat::Pretty => tracing_subscriber::fmt()
                .pretty()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_line_number(true)
                .try_init(),
            LogFormat::Text => tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_ansi(false)
                .try_init(),
        };

        if installed.is_err() {
            tracing::debug!("tracing subscriber already installed");
        }
    }
}

/// Initialize logging from `TUSK_LOG_FORMAT` and `TUSK_LOG_LEVEL`.
///
/// Falls back to text at `info`.
pub fn init_default() {
    let format = std::env::var("TUSK_LOG_FORMAT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(LogFormat::Text);

    let level = std::env::var("TUSK_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

    LoggingConfig::new(format, level, false).init();
}
