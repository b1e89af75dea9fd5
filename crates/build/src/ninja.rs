//! Compiling a generated build directory with `autoninja`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, instrument};

use bootkit_core::{CommandRunner, EnvironmentOverlay, Error, Invocation, Os, Result};

/// Target built when none is named.
pub const DEFAULT_TARGET: &str = "views_examples";

/// Output directory built when none is named.
pub const DEFAULT_OUT_DIR: &str = "out/Component";

/// Parallelism used when compilation happens remotely.
pub const REMOTE_JOBS: u32 = 200;

const REMOTE_MARKERS: [&str; 2] = ["use_remoteexec = true", "goma.gn"];

/// What to build.
#[derive(Debug, Clone)]
pub struct BuildRequest {
    /// Output directory, relative to the source directory or absolute.
    pub out_dir: PathBuf,
    /// Targets to build.
    pub targets: Vec<String>,
    /// Arguments passed through to autoninja before the targets.
    pub extra_args: Vec<String>,
}

impl Default for BuildRequest {
    fn default() -> Self {
        Self {
            out_dir: PathBuf::from(DEFAULT_OUT_DIR),
            targets: vec![DEFAULT_TARGET.to_string()],
            extra_args: Vec::new(),
        }
    }
}

/// Whether the `args.gn` text enables remote compilation.
#[must_use]
pub fn uses_remote_execution(args_gn: &str) -> bool {
    REMOTE_MARKERS.iter().any(|marker| args_gn.contains(marker))
}

/// Runs `autoninja` from the source directory.
pub struct NinjaBuilder {
    runner: Arc<dyn CommandRunner>,
    host_os: Os,
}

impl NinjaBuilder {
    #[must_use]
    pub fn new(runner: Arc<dyn CommandRunner>, host_os: Os) -> Self {
        Self { runner, host_os }
    }

    /// The autoninja invocation. Output streams straight to the terminal.
    #[must_use]
    pub fn invocation(&self, request: &BuildRequest, src: &Path, remote: bool) -> Invocation {
        let mut invocation = Invocation::new(self.host_os.wrapper("autoninja"))
            .arg("-C")
            .path_arg(&request.out_dir);
        if remote {
            invocation = invocation.arg("-j").arg(REMOTE_JOBS.to_string());
        }
        invocation
            .args(&request.extra_args)
            .args(&request.targets)
            .current_dir(src)
            .inherit_output()
    }

    /// Build the requested targets.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::Io`] when `args.gn` is unreadable (the directory
    /// was never generated) and [`Error::BuildToolFailed`] carrying
    /// autoninja's exit code when the build fails.
    #[instrument(skip_all, fields(out_dir = %request.out_dir.display()))]
    pub async fn build(
        &self,
        request: &BuildRequest,
        src: &Path,
        env: &EnvironmentOverlay,
    ) -> Result<()> {
        let args_path = src.join(&request.out_dir).join("args.gn");
        let args_gn = tokio::fs::read_to_string(&args_path)
            .await
            .map_err(|e| Error::io(e, Some(&args_path), "read gn arguments"))?;
        let remote = uses_remote_execution(&args_gn);

        let invocation = self.invocation(request, src, remote);
        info!(command = %invocation.display_command(), remote, "Building");
        let result = self.runner.run(&invocation, env).await?;
        if !result.succeeded() {
            return Err(Error::BuildToolFailed {
                tool: format!("autoninja -C {}", request.out_dir.display()),
                status: result.status_description(),
                code: result.exit_code,
            });
        }
        Ok(())
    }
}
