//! Pinned package installer for bootkit.
//!
//! Installs a named package at an exact version into a root directory by
//! piping a one-line ensure file into `cipd ensure`. The package name may
//! carry the `${platform}` placeholder; the package manager expands it.

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use bootkit_core::{
    CommandRunner, Error, FetchContext, Fetcher, Invocation, Os, PackageRequest, Result,
};

/// Installs packages through the `cipd` wrapper shipped in depot_tools.
pub struct PackageInstaller {
    runner: Arc<dyn CommandRunner>,
    host_os: Os,
}

impl PackageInstaller {
    #[must_use]
    pub fn new(runner: Arc<dyn CommandRunner>, host_os: Os) -> Self {
        Self { runner, host_os }
    }

    /// The `ensure` invocation for one package, run from `work_dir`.
    #[must_use]
    pub fn invocation(&self, root: &Path, package: &str, version: &str, work_dir: &Path) -> Invocation {
        Invocation::new(self.host_os.wrapper("cipd"))
            .arg("ensure")
            .arg("-root")
            .path_arg(root)
            .arg("-ensure-file")
            .arg("-")
            .current_dir(work_dir)
            .stdin(format!("{package} {version}"))
    }

    /// Install `package` at `version` under `root`.
    ///
    /// Always invokes the package manager; it is itself idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PackageInstallFailed`] with the tool's output on a
    /// non-zero exit, [`Error::Spawn`] if the tool cannot be started.
    #[instrument(skip(self, ctx), fields(root = %root.display()))]
    pub async fn ensure_package(
        &self,
        root: &Path,
        package: &str,
        version: &str,
        ctx: FetchContext<'_>,
    ) -> Result<()> {
        let invocation = self.invocation(root, package, version, ctx.work_dir);
        debug!(command = %invocation.display_command(), "Ensuring package");

        let output = self.runner.run(&invocation, ctx.env).await?;
        if !output.succeeded() {
            return Err(Error::PackageInstallFailed {
                package: package.to_string(),
                version: version.to_string(),
                root: root.to_path_buf().into_boxed_path(),
                status: output.status_description(),
                output: output.transcript(),
            });
        }

        info!("Package installed");
        Ok(())
    }
}

#[async_trait]
impl Fetcher for PackageInstaller {
    type Request = PackageRequest;
    type Output = ();

    fn name(&self) -> &'static str {
        "cipd"
    }

    async fn fetch(&self, request: &PackageRequest, ctx: FetchContext<'_>) -> Result<()> {
        self.ensure_package(&request.root, &request.package, &request.version, ctx)
            .await
    }
}
