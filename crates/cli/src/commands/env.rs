use std::collections::BTreeMap;

use bootkit_core::EnvironmentOverlay;

use super::{GlobalOptions, Workspace, render};
use crate::cli::{CliError, LayoutArgs};

/// Print the overlay as `KEY=VALUE` lines, or as a JSON object.
///
/// # Errors
///
/// Fails when the layout or configuration cannot be resolved or the search
/// path cannot be joined.
pub fn execute_env(layout: &LayoutArgs, global: &GlobalOptions) -> Result<String, CliError> {
    let workspace = Workspace::resolve(layout, global)?;
    let overlay =
        EnvironmentOverlay::materialize(&workspace.layout, &workspace.config, workspace.host.os)?;
    let vars: BTreeMap<&str, &str> = overlay.iter().collect();
    render(global, &vars, |_| overlay.to_env_lines())
}
