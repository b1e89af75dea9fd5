use std::fmt::Write as _;
use std::sync::Arc;
use tracing::info;

use bootkit_core::{EnvironmentOverlay, SystemRunner};
use bootkit_provision::{Orchestrator, Plan, ProvisionReport, StepOutcome};
use bootkit_tools_archive::ArchiveFetcher;

use super::{GlobalOptions, Workspace, render, selected_source};
use crate::cli::{CliError, SelectionArgs};
use crate::progress::ExtractionSpinner;

/// Provision the tree, or preview the run with `dry_run`.
///
/// # Errors
///
/// Fails with a configuration error unless exactly one of `--revision` and
/// `--tarball-url` is given, and with the first failing step otherwise.
pub async fn execute_bootstrap(
    selection: &SelectionArgs,
    force: bool,
    dry_run: bool,
    global: &GlobalOptions,
) -> Result<String, CliError> {
    let workspace = Workspace::resolve(&selection.layout, global)?;
    let Some(source) = selected_source(selection, &workspace.config) else {
        return Err(CliError::config_with_help(
            "bootstrap needs a source tarball",
            "Pass either --revision or --tarball-url",
        ));
    };
    let target = workspace.target(&selection.target);
    let plan = Plan::build(workspace.host, target, Some(&source), &workspace.config)?;

    let env = EnvironmentOverlay::materialize(
        &workspace.layout,
        &workspace.config,
        workspace.host.os,
    )?;
    let spinner = ExtractionSpinner::new(global.json || dry_run);
    let archive = ArchiveFetcher::new()?
        .with_progress(workspace.config.progress_interval, spinner.callback());
    let orchestrator = Orchestrator::new(
        workspace.layout,
        workspace.config,
        env,
        workspace.host.os,
        Arc::new(SystemRunner::new()),
        archive,
    )
    .with_force(force);

    let report = if dry_run {
        orchestrator.preview(&plan)
    } else {
        orchestrator.run(&plan).await
    };
    spinner.finish();
    let report = report?;

    info!(
        executed = report.count(StepOutcome::Executed),
        pending = report.count(StepOutcome::Pending),
        "Bootstrap finished"
    );
    render(global, &report, format_report)
}

/// Show the plan for the selected platforms.
///
/// # Errors
///
/// Fails when the layout, configuration or host platform cannot be resolved,
/// or the tarball name has no recognised archive suffix.
pub fn execute_plan(selection: &SelectionArgs, global: &GlobalOptions) -> Result<String, CliError> {
    let workspace = Workspace::resolve(&selection.layout, global)?;
    let source = selected_source(selection, &workspace.config);
    let target = workspace.target(&selection.target);
    let plan = Plan::build(workspace.host, target, source.as_ref(), &workspace.config)?;
    render(global, &plan, format_plan)
}

/// One line per step, grouped under stage headings.
#[must_use]
pub fn format_plan(plan: &Plan) -> String {
    let mut out = format!("Plan for host {} targeting {}\n", plan.host, plan.target);
    let mut current = None;
    for step in &plan.steps {
        if current != Some(step.stage) {
            let _ = writeln!(out, "{}:", step.stage);
            current = Some(step.stage);
        }
        let _ = writeln!(out, "  {step}");
    }
    out
}

/// One line per step with its outcome, plus a summary line.
#[must_use]
pub fn format_report(report: &ProvisionReport) -> String {
    let mut out = String::new();
    for step in &report.steps {
        let outcome = match step.outcome {
            StepOutcome::Executed => "done",
            StepOutcome::Pending => "pending",
            StepOutcome::AlreadySatisfied => "present",
            StepOutcome::NotApplicable => "skipped",
        };
        let _ = writeln!(
            out,
            "{outcome:>8}  {:<26} {}",
            step.stage.as_str(),
            step.description
        );
    }
    let _ = writeln!(
        out,
        "{} -> {}: {} done, {} pending, {} already present, {} not applicable",
        report.host,
        report.target,
        report.count(StepOutcome::Executed),
        report.count(StepOutcome::Pending),
        report.count(StepOutcome::AlreadySatisfied),
        report.count(StepOutcome::NotApplicable),
    );
    out
}
