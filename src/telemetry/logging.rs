//! Logging
//!
//! Subscriber setup for the `tracing` events emitted by the token engine.
//! Events carry `scene`, `jti` and `reason` fields; token strings and key
//! material are never logged.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::JwtAuthError;

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// The minimum log level to capture
    pub level: LogLevel,
    /// The output format for log messages
    pub format: LogFormat,
    /// Whether to include the module target in log output
    pub include_target: bool,
    /// Whether to include file and line number in log output
    pub include_file_line: bool,
}

/// Log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "TRACE"),
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warn => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable format with colors (for development)
    Pretty,
    /// JSON format (for structured logging in production)
    Json,
    /// Compact single-line format
    Compact,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Pretty,
            include_target: true,
            include_file_line: false,
        }
    }
}

impl LoggingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_target(mut self, include: bool) -> Self {
        self.include_target = include;
        self
    }

    pub fn with_file_line(mut self, include: bool) -> Self {
        self.include_file_line = include;
        self
    }

    /// Install a global subscriber with this configuration.
    ///
    /// `RUST_LOG` directives are honoured on top of the configured level.
    ///
    /// # Errors
    ///
    /// Returns an error if a global subscriber is already installed.
    pub fn init(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let filter = EnvFilter::from_default_env().add_directive(LevelFilter::from(self.level).into());

        match self.format {
            LogFormat::Pretty => tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .with_ansi(true)
                        .with_target(self.include_target)
                        .with_file(self.include_file_line)
                        .with_line_number(self.include_file_line),
                )
                .try_init()?,
            LogFormat::Json => tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_target(self.include_target))
                .try_init()?,
            LogFormat::Compact => tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().compact().with_target(self.include_target))
                .try_init()?,
        }

        Ok(())
    }
}

/// Install a global subscriber.
pub fn init_logging(config: &LoggingConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    config.init()
}

/// Log a rejected token with its preserved reason.
pub fn log_rejection(scene: &str, jti: Option<&str>, error: &JwtAuthError) {
    if error.is_store_unavailable() {
        tracing::warn!(
            scene = scene,
            jti = jti.unwrap_or("-"),
            reason = error.reason(),
            error = %error,
            "Revocation store unavailable, rejecting token"
        );
    } else {
        tracing::warn!(
            scene = scene,
            jti = jti.unwrap_or("-"),
            reason = error.reason(),
            "Token rejected"
        );
    }
}
