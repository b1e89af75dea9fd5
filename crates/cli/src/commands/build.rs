use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;

use bootkit_build::{BuildConfig, BuildRequest, DEFAULT_TARGET, GenRequest, GnGenerator, NinjaBuilder};
use bootkit_core::{EnvironmentOverlay, SystemRunner};

use super::{GlobalOptions, Workspace, render};
use crate::cli::{CliError, LayoutArgs, TargetArgs};

/// Arguments of the `gen` command.
#[derive(Debug, Clone)]
pub struct GenArgs<'a> {
    pub configs: &'a [BuildConfig],
    pub custom_config: Option<&'a str>,
    pub args: &'a [String],
    pub reclient: bool,
    pub layout: &'a LayoutArgs,
    pub target: &'a TargetArgs,
}

/// Run `gn gen` for each requested output directory.
///
/// # Errors
///
/// Fails on a malformed `--arg`, a missing source directory, or the first
/// unsuccessful gn run.
pub async fn execute_gen(args: GenArgs<'_>, global: &GlobalOptions) -> Result<String, CliError> {
    if let Some(bad) = args.args.iter().find(|arg| !arg.contains('=')) {
        return Err(CliError::config_with_help(
            format!("gn argument '{bad}' is not key=value"),
            "Pass gn arguments as --arg is_debug=false",
        ));
    }
    let workspace = Workspace::resolve(args.layout, global)?;
    require_src(&workspace)?;

    let request = GenRequest {
        target: Some(workspace.target(args.target)),
        configs: args.configs.to_vec(),
        custom_config: args.custom_config.map(str::to_string),
        extra_args: args.args.to_vec(),
        reclient: args.reclient,
    };
    let env =
        EnvironmentOverlay::materialize(&workspace.layout, &workspace.config, workspace.host.os)?;
    let generator = GnGenerator::new(Arc::new(SystemRunner::new()), workspace.host.os);
    let results = generator
        .generate(&request, &workspace.layout.src, &env)
        .await?;

    let outputs: Vec<_> = results.iter().map(|(output, _)| output.clone()).collect();
    render(global, &outputs, |_| {
        let mut text = String::new();
        for (output, log) in &results {
            let _ = writeln!(text, "{}: {log}", output.out_dir);
        }
        text
    })
}

/// Build targets with autoninja. Output streams to the terminal.
///
/// # Errors
///
/// Fails when the output directory was never generated, or with the build
/// tool's exit code.
pub async fn execute_build(
    out_dir: PathBuf,
    targets: Vec<String>,
    extra: Vec<String>,
    layout: &LayoutArgs,
    global: &GlobalOptions,
) -> Result<String, CliError> {
    let workspace = Workspace::resolve(layout, global)?;
    require_src(&workspace)?;

    let targets = if targets.is_empty() {
        vec![DEFAULT_TARGET.to_string()]
    } else {
        targets
    };
    let request = BuildRequest {
        out_dir,
        targets,
        extra_args: extra,
    };
    let env =
        EnvironmentOverlay::materialize(&workspace.layout, &workspace.config, workspace.host.os)?;
    NinjaBuilder::new(Arc::new(SystemRunner::new()), workspace.host.os)
        .build(&request, &workspace.layout.src, &env)
        .await?;

    render(global, &request.targets, |targets| {
        format!("Built {}\n", targets.join(" "))
    })
}

fn require_src(workspace: &Workspace) -> Result<(), CliError> {
    if workspace.layout.src.is_dir() {
        Ok(())
    } else {
        Err(CliError::config_with_help(
            format!(
                "Source directory {} does not exist",
                workspace.layout.src.display()
            ),
            "Run bootkit bootstrap first, or pass --src-dir",
        ))
    }
}
