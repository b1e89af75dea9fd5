use clap::{Args, Parser, Subcommand};
use miette::{Diagnostic, Report};
use serde::Serialize;
use std::io::{self, Write};
use std::path::PathBuf;
use thiserror::Error;

use bootkit_build::BuildConfig;
use bootkit_core::{Cpu, Os};

use crate::tracing::{LogLevel, TracingFormat};

/// Exit codes for the CLI application
pub const EXIT_OK: i32 = 0;
/// CLI or configuration error exit code
pub const EXIT_CLI: i32 = 2;
/// Provisioning or tool failure exit code
pub const EXIT_FAILED: i32 = 3;

/// CLI-specific error types with proper exit code mapping
#[derive(Error, Debug, Clone, Diagnostic)]
pub enum CliError {
    /// CLI or configuration error (exit code 2)
    #[error("Configuration error: {message}")]
    #[diagnostic(code(bootkit::cli::config))]
    Config {
        /// The error message
        message: String,
        /// Optional help text
        #[help]
        help: Option<String>,
    },
    /// Provisioning failure (exit code 3)
    #[error("{message}")]
    #[diagnostic(code(bootkit::cli::failed))]
    Failed {
        /// The error message
        message: String,
        /// Optional help text
        #[help]
        help: Option<String>,
    },
    /// A downstream build tool exited unsuccessfully; its exit code is kept
    #[error("{message}")]
    #[diagnostic(code(bootkit::cli::tool))]
    Tool {
        /// The error message
        message: String,
        /// Exit code to terminate with
        code: i32,
    },
}

impl CliError {
    /// Create a new configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: None,
        }
    }

    /// Create a new configuration error with help text
    #[must_use]
    pub fn config_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    /// Create a new failure
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
            help: None,
        }
    }
}

/// Convert `bootkit_core::Error` to the matching `CliError` variant, keeping
/// the diagnostic help text.
impl From<bootkit_core::Error> for CliError {
    fn from(err: bootkit_core::Error) -> Self {
        let help = err.help().map(|h| h.to_string());
        match err {
            bootkit_core::Error::Configuration { message, help } => Self::Config { message, help },
            bootkit_core::Error::UnsupportedPlatform { .. }
            | bootkit_core::Error::UnrecognizedArchitecture { .. } => Self::Config {
                message: err.to_string(),
                help,
            },
            bootkit_core::Error::BuildToolFailed { code, .. } => Self::Tool {
                message: err.to_string(),
                code: code.unwrap_or(EXIT_FAILED),
            },
            other => Self::Failed {
                message: other.to_string(),
                help,
            },
        }
    }
}

/// Map CLI error to appropriate exit code
#[must_use]
pub const fn exit_code_for(err: &CliError) -> i32 {
    match err {
        CliError::Config { .. } => EXIT_CLI,
        CliError::Failed { .. } => EXIT_FAILED,
        CliError::Tool { code, .. } => *code,
    }
}

/// Render error appropriately based on JSON flag
#[allow(clippy::print_stdout, clippy::print_stderr)]
pub fn render_error(err: &CliError, json_mode: bool) {
    if json_mode {
        let error_envelope = ErrorEnvelope::new(serde_json::json!({
            "code": match err {
                CliError::Config { .. } => "config",
                CliError::Failed { .. } => "failed",
                CliError::Tool { .. } => "tool",
            },
            "message": err.to_string()
        }));

        match serde_json::to_string(&error_envelope) {
            Ok(json) => println!("{json}"),
            Err(_) => eprintln!("Error serializing error response"),
        }
    } else {
        let report = Report::new(err.clone());
        eprintln!("{report:?}");
        let _ = io::stderr().flush();
    }
}

/// Success response envelope for JSON output
#[derive(Debug, Clone, Serialize)]
pub struct OkEnvelope<T> {
    /// Status indicator - always "ok" for success
    pub status: &'static str,
    /// The actual data payload
    pub data: T,
}

impl<T> OkEnvelope<T> {
    /// Create a new success envelope
    #[must_use]
    pub const fn new(data: T) -> Self {
        Self { status: "ok", data }
    }
}

/// Error response envelope for JSON output
#[derive(Debug, Clone, Serialize)]
pub struct ErrorEnvelope<E> {
    /// Status indicator - always "error" for failures
    pub status: &'static str,
    /// The error details
    pub error: E,
}

impl<E> ErrorEnvelope<E> {
    /// Create a new error envelope
    #[must_use]
    pub const fn new(error: E) -> Self {
        Self {
            status: "error",
            error,
        }
    }
}

/// Provision a source tree and hand it to the build tools.
#[derive(Parser, Debug)]
#[command(name = "bootkit")]
#[command(about = "Provision a build environment for a source tree and drive gn and autoninja")]
#[command(version)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Logging verbosity level.
    #[arg(
        short = 'L',
        long,
        global = true,
        help = "Set logging level",
        default_value = "warn",
        value_enum
    )]
    pub level: LogLevel,

    /// Log format on stderr.
    #[arg(long, global = true, value_enum, default_value = "compact")]
    pub log_format: TracingFormat,

    /// Emit JSON envelope instead of text.
    #[arg(long, global = true, help = "Emit JSON envelope instead of text")]
    pub json: bool,

    /// Configuration file; defaults to `<root>/bootkit.toml` when present.
    #[arg(long, global = true, value_name = "FILE")]
    pub config_file: Option<PathBuf>,
}

/// Where the checkout lives.
#[derive(Args, Debug, Clone)]
pub struct LayoutArgs {
    /// Checkout root holding `vendor/` and the source directory.
    #[arg(long, default_value = ".")]
    pub root: PathBuf,
    /// Source directory; defaults to `<root>/src`.
    #[arg(long = "src-dir")]
    pub src_dir: Option<PathBuf>,
}

/// Platform the build targets. Missing parts default to the host.
#[derive(Args, Debug, Clone, Default)]
pub struct TargetArgs {
    /// Target operating system (linux, mac, win).
    #[arg(long)]
    pub target_os: Option<Os>,
    /// Target CPU (x64, arm64, arm).
    #[arg(long)]
    pub target_cpu: Option<Cpu>,
}

/// Source tree selection shared by `bootstrap` and `plan`.
#[derive(Args, Debug, Clone)]
pub struct SelectionArgs {
    /// Source revision; the tarball URL is derived from the configuration.
    #[arg(long, conflicts_with = "tarball_url")]
    pub revision: Option<String>,
    /// Explicit tarball URL or local path.
    #[arg(long)]
    pub tarball_url: Option<String>,
    #[command(flatten)]
    pub layout: LayoutArgs,
    #[command(flatten)]
    pub target: TargetArgs,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download the source tree and provision every build dependency.
    Bootstrap {
        #[command(flatten)]
        selection: SelectionArgs,
        /// Ignore completion stamps and cached pins.
        #[arg(long)]
        force: bool,
        /// Report what would run without running it.
        #[arg(long)]
        dry_run: bool,
    },
    /// Print the provisioning plan.
    Plan {
        #[command(flatten)]
        selection: SelectionArgs,
    },
    /// Print the environment handed to every spawned tool.
    Env {
        #[command(flatten)]
        layout: LayoutArgs,
    },
    /// Generate build directories with gn.
    Gen {
        /// Predefined configuration (repeatable). All three when omitted.
        #[arg(long = "config", value_name = "CONFIG")]
        configs: Vec<BuildConfig>,
        /// Custom output directory under out/, with only the base arguments.
        #[arg(long)]
        custom_config: Option<String>,
        /// Extra gn argument as key=value (repeatable).
        #[arg(long = "arg", value_name = "K=V")]
        args: Vec<String>,
        /// Compile with remote execution.
        #[arg(long)]
        reclient: bool,
        #[command(flatten)]
        layout: LayoutArgs,
        #[command(flatten)]
        target: TargetArgs,
    },
    /// Build targets in a generated directory with autoninja.
    Build {
        /// Output directory to build.
        #[arg(short = 'C', default_value = bootkit_build::DEFAULT_OUT_DIR)]
        out_dir: PathBuf,
        /// Targets to build.
        #[arg(value_name = "TARGETS")]
        targets: Vec<String>,
        /// Arguments passed through to autoninja.
        #[arg(last = true)]
        extra: Vec<String>,
        #[command(flatten)]
        layout: LayoutArgs,
    },
}

impl Commands {
    /// Name used in logs and spans.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Bootstrap { .. } => "bootstrap",
            Self::Plan { .. } => "plan",
            Self::Env { .. } => "env",
            Self::Gen { .. } => "gen",
            Self::Build { .. } => "build",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_revision_conflicts_with_tarball() {
        let result = Cli::try_parse_from([
            "bootkit",
            "bootstrap",
            "--revision",
            "1.0",
            "--tarball-url",
            "https://example.com/x.tar.xz",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_gen_parses_configs_and_target() {
        let cli = Cli::try_parse_from([
            "bootkit",
            "gen",
            "--config",
            "release",
            "--target-os",
            "win",
            "--target-cpu",
            "arm64",
        ])
        .unwrap();
        match cli.command {
            Commands::Gen {
                configs, target, ..
            } => {
                assert_eq!(configs, [BuildConfig::Release]);
                assert_eq!(target.target_os, Some(Os::Win));
                assert_eq!(target.target_cpu, Some(Cpu::Arm64));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_build_splits_targets_and_extra_args() {
        let cli =
            Cli::try_parse_from(["bootkit", "build", "-C", "out/Debug", "chrome", "--", "-k", "0"])
                .unwrap();
        match cli.command {
            Commands::Build {
                out_dir,
                targets,
                extra,
                ..
            } => {
                assert_eq!(out_dir, PathBuf::from("out/Debug"));
                assert_eq!(targets, ["chrome"]);
                assert_eq!(extra, ["-k", "0"]);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_core_errors_map_to_exit_codes() {
        let config: CliError = bootkit_core::Error::configuration("bad").into();
        assert_eq!(exit_code_for(&config), EXIT_CLI);

        let tool: CliError = bootkit_core::Error::BuildToolFailed {
            tool: "autoninja".to_string(),
            status: "exit code 7".to_string(),
            code: Some(7),
        }
        .into();
        assert_eq!(exit_code_for(&tool), 7);

        let failed: CliError = bootkit_core::Error::archive("x.tar.xz", "truncated").into();
        assert_eq!(exit_code_for(&failed), EXIT_FAILED);
    }
}
