//! Build directory generation with `gn gen`.

use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info, instrument};

use bootkit_core::{CommandRunner, EnvironmentOverlay, Error, Invocation, Os, Platform, Result};

/// Noise printed by gn in trees that were not synced with gclient.
const GCLIENT_ENTRIES_NOISE: &str = ".gclient_entries missing";

/// Predefined build configurations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BuildConfig {
    Component,
    Release,
    Debug,
}

impl BuildConfig {
    /// Every predefined configuration, in generation order.
    pub const ALL: [Self; 3] = [Self::Component, Self::Release, Self::Debug];

    /// Output directory relative to the source directory.
    #[must_use]
    pub fn out_dir(self) -> String {
        format!("out/{self}")
    }

    /// gn arguments specific to this configuration.
    #[must_use]
    pub fn args(self) -> &'static [&'static str] {
        match self {
            Self::Component => &["is_component_build=true", "is_debug=false"],
            Self::Release => &[
                "is_component_build=false",
                "is_debug=false",
                "chrome_pgo_phase=0",
                "is_official_build=true",
            ],
            Self::Debug => &["is_component_build=true", "is_debug=true"],
        }
    }
}

impl fmt::Display for BuildConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Component => f.write_str("Component"),
            Self::Release => f.write_str("Release"),
            Self::Debug => f.write_str("Debug"),
        }
    }
}

impl FromStr for BuildConfig {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|config| config.to_string().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                Error::configuration_with_help(
                    format!("Unknown build config '{s}'"),
                    "Use Component, Release or Debug, or --custom-config for anything else",
                )
            })
    }
}

/// What to generate.
#[derive(Debug, Clone, Default)]
pub struct GenRequest {
    /// Platform the build targets.
    pub target: Option<Platform>,
    /// Predefined configurations to generate.
    pub configs: Vec<BuildConfig>,
    /// A custom output directory name under `out/`.
    pub custom_config: Option<String>,
    /// Extra `key=value` gn arguments, placed first.
    pub extra_args: Vec<String>,
    /// Build with remote execution.
    pub reclient: bool,
}

/// One `gn gen` run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenOutput {
    pub out_dir: String,
    pub args: Vec<String>,
}

impl GenRequest {
    /// Arguments shared by every output directory.
    #[must_use]
    pub fn base_args(&self) -> Vec<String> {
        let mut args = self.extra_args.clone();
        if let Some(target) = self.target {
            args.push(format!("target_cpu=\"{}\"", target.cpu));
            args.push(format!("target_os=\"{}\"", target.os));
        }
        if self.custom_config.is_none() {
            args.push("enable_nacl=false".to_string());
        }
        if self.reclient {
            args.push("use_remoteexec=true".to_string());
        }
        args
    }

    /// Output directories to generate. Without any selection all predefined
    /// configurations are generated.
    #[must_use]
    pub fn outputs(&self) -> Vec<GenOutput> {
        let base = self.base_args();
        let configs: &[BuildConfig] = if self.configs.is_empty() && self.custom_config.is_none() {
            &BuildConfig::ALL
        } else {
            &self.configs
        };

        let mut outputs: Vec<GenOutput> = configs
            .iter()
            .map(|config| GenOutput {
                out_dir: config.out_dir(),
                args: base
                    .iter()
                    .cloned()
                    .chain(config.args().iter().map(|a| (*a).to_string()))
                    .collect(),
            })
            .collect();
        if let Some(name) = &self.custom_config {
            outputs.push(GenOutput {
                out_dir: format!("out/{name}"),
                args: base,
            });
        }
        outputs
    }
}

/// Runs `gn gen` from the source directory.
pub struct GnGenerator {
    runner: Arc<dyn CommandRunner>,
    host_os: Os,
}

impl GnGenerator {
    #[must_use]
    pub fn new(runner: Arc<dyn CommandRunner>, host_os: Os) -> Self {
        Self { runner, host_os }
    }

    /// The `gn gen` invocation for one output directory.
    #[must_use]
    pub fn invocation(&self, output: &GenOutput, src: &Path) -> Invocation {
        Invocation::new(self.host_os.wrapper("gn"))
            .arg("gen")
            .arg(&output.out_dir)
            .arg(format!("--args={}", output.args.join(" ")))
            .current_dir(src)
    }

    /// Generate every output of `request`, returning gn's output per
    /// directory with gclient noise removed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BuildToolFailed`] at the first unsuccessful run.
    #[instrument(skip_all, fields(src = %src.display()))]
    pub async fn generate(
        &self,
        request: &GenRequest,
        src: &Path,
        env: &EnvironmentOverlay,
    ) -> Result<Vec<(GenOutput, String)>> {
        let mut results = Vec::new();
        for output in request.outputs() {
            let invocation = self.invocation(&output, src);
            info!(out_dir = %output.out_dir, "Generating build directory");
            let result = self.runner.run(&invocation, env).await?;
            let text = filter_noise(&result.transcript());
            if !result.succeeded() {
                error!(out_dir = %output.out_dir, output = %text, "gn gen failed");
                return Err(Error::BuildToolFailed {
                    tool: format!("gn gen {}", output.out_dir),
                    status: result.status_description(),
                    code: result.exit_code,
                });
            }
            results.push((output, text));
        }
        Ok(results)
    }
}

fn filter_noise(text: &str) -> String {
    text.lines()
        .filter(|line| !line.contains(GCLIENT_ENTRIES_NOISE))
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n")
}
