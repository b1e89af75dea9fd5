//! Command implementations. Each returns the text printed on stdout.

mod bootstrap;
mod build;
mod env;

pub use bootstrap::{execute_bootstrap, execute_plan, format_plan, format_report};
pub use build::{GenArgs, execute_build, execute_gen};
pub use env::execute_env;

use serde::Serialize;
use std::path::PathBuf;

use bootkit_core::{ArchiveSource, BootkitConfig, Layout, Platform};

use crate::cli::{CliError, LayoutArgs, OkEnvelope, SelectionArgs, TargetArgs};

/// Options shared by every command.
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    /// Print JSON envelopes instead of text.
    pub json: bool,
    /// Explicit configuration file.
    pub config_file: Option<PathBuf>,
}

/// Layout and configuration resolved from the command line.
#[derive(Debug, Clone)]
pub(crate) struct Workspace {
    pub layout: Layout,
    pub config: BootkitConfig,
    pub host: Platform,
}

impl Workspace {
    pub(crate) fn resolve(args: &LayoutArgs, global: &GlobalOptions) -> Result<Self, CliError> {
        let layout = Layout::new(&args.root, args.src_dir.as_deref())?;
        let config = BootkitConfig::discover(&layout.root, global.config_file.as_deref())?;
        let host = Platform::host()?;
        tracing::debug!(
            root = %layout.root.display(),
            src = %layout.src.display(),
            %host,
            "Resolved workspace"
        );
        Ok(Self {
            layout,
            config,
            host,
        })
    }

    pub(crate) fn target(&self, args: &TargetArgs) -> Platform {
        Platform::new(
            args.target_os.unwrap_or(self.host.os),
            args.target_cpu.unwrap_or(self.host.cpu),
        )
    }
}

/// The tarball named by `--revision` or `--tarball-url`, if any.
pub(crate) fn selected_source(
    selection: &SelectionArgs,
    config: &BootkitConfig,
) -> Option<ArchiveSource> {
    match (&selection.revision, &selection.tarball_url) {
        (Some(revision), _) => Some(ArchiveSource::parse(&config.tarball_url(revision))),
        (None, Some(url)) => Some(ArchiveSource::parse(url)),
        (None, None) => None,
    }
}

/// Text, or `data` wrapped in an [`OkEnvelope`] in JSON mode.
pub(crate) fn render<T: Serialize>(
    global: &GlobalOptions,
    data: &T,
    text: impl FnOnce(&T) -> String,
) -> Result<String, CliError> {
    if global.json {
        serde_json::to_string_pretty(&OkEnvelope::new(data))
            .map_err(|e| CliError::failed(format!("Failed to serialize output: {e}")))
    } else {
        Ok(text(data))
    }
}
