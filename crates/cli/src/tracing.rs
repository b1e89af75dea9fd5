//! Tracing setup for the bootkit CLI.
//!
//! Logs go to stderr so stdout stays reserved for command output. Every run
//! gets a correlation id that is attached to the startup event and to the
//! command span.

use std::io;
pub use tracing::Level;
use tracing_subscriber::{filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

/// Crates whose events pass the level filter when `RUST_LOG` is unset.
const LOG_TARGETS: [&str; 8] = [
    "bootkit",
    "bootkit_core",
    "bootkit_deps",
    "bootkit_provision",
    "bootkit_build",
    "bootkit_tools_archive",
    "bootkit_tools_cipd",
    "bootkit_tools_gcs",
];

/// Tracing output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum TracingFormat {
    /// Pretty-printed human-readable format
    Pretty,
    /// Compact single-line format
    Compact,
    /// Structured JSON format
    Json,
}

/// Log level options for CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LogLevel {
    /// Show all logs (trace level)
    Trace,
    /// Show debug and above
    Debug,
    /// Show info and above
    Info,
    /// Show warnings and above (default)
    Warn,
    /// Show errors only
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Self::TRACE,
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Info => Self::INFO,
            LogLevel::Warn => Self::WARN,
            LogLevel::Error => Self::ERROR,
        }
    }
}

/// Tracing configuration
#[derive(Debug, Clone)]
pub struct TracingConfig {
    pub format: TracingFormat,
    pub level: Level,
    /// Explicit filter directive; overrides `RUST_LOG` and `level`.
    pub filter: Option<String>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            format: TracingFormat::Compact,
            level: Level::WARN,
            filter: None,
        }
    }
}

static CORRELATION_ID: std::sync::OnceLock<Uuid> = std::sync::OnceLock::new();

/// Get or create the correlation id of this run
pub fn correlation_id() -> Uuid {
    *CORRELATION_ID.get_or_init(Uuid::new_v4)
}

/// Filter directive enabling `level` for every bootkit crate.
#[must_use]
pub fn default_directive(level: Level) -> String {
    let level = level.as_str().to_ascii_lowercase();
    LOG_TARGETS
        .iter()
        .map(|target| format!("{target}={level}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Initialize tracing with the given configuration
///
/// # Errors
///
/// Fails when the filter directive is invalid or a global subscriber is
/// already installed.
pub fn init_tracing(config: TracingConfig) -> miette::Result<()> {
    let correlation_id = correlation_id();

    let env_filter = if let Some(filter) = config.filter {
        EnvFilter::try_new(filter)
    } else {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(default_directive(config.level)))
    }
    .map_err(|e| miette::miette!("Failed to create tracing filter: {e}"))?;

    let registry = tracing_subscriber::registry().with(env_filter);

    let installed = match config.format {
        TracingFormat::Pretty => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_writer(io::stderr)
                    .with_target(true),
            )
            .try_init(),
        TracingFormat::Compact => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_writer(io::stderr)
                    .with_target(false),
            )
            .try_init(),
        TracingFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(io::stderr)
                    .with_current_span(true)
                    .with_span_list(true),
            )
            .try_init(),
    };
    installed.map_err(|e| miette::miette!("Failed to install tracing subscriber: {e}"))?;

    tracing::info!(
        correlation_id = %correlation_id,
        version = env!("CARGO_PKG_VERSION"),
        format = ?config.format,
        "Tracing initialized"
    );

    Ok(())
}

/// Span wrapping one command, tagged with the correlation id.
#[macro_export]
macro_rules! command_span {
    ($command:expr) => {
        tracing::info_span!(
            "command",
            command = %$command,
            correlation_id = %$crate::tracing::correlation_id(),
            start_time = %chrono::Utc::now().to_rfc3339(),
        )
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive_covers_every_crate() {
        let directive = default_directive(Level::DEBUG);
        assert!(directive.starts_with("bootkit=debug,bootkit_core=debug"));
        assert_eq!(directive.matches("=debug").count(), LOG_TARGETS.len());
    }

    #[test]
    fn test_log_level_conversion() {
        assert_eq!(Level::from(LogLevel::Trace), Level::TRACE);
        assert_eq!(Level::from(LogLevel::Warn), Level::WARN);
    }

    #[test]
    fn test_correlation_id_is_stable() {
        assert_eq!(correlation_id(), correlation_id());
    }
}
