//! Bucket blob fetcher for bootkit.
//!
//! Retrieves one content-addressed object from a storage bucket using the
//! `download_from_google_storage.py` helper from depot_tools. An object is
//! named either by its hash directly or by a `.sha1` file holding it.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument};

use bootkit_core::{
    BlobIdentity, BlobOptions, BlobRequest, CommandRunner, Error, FetchContext, Fetcher,
    Invocation, Result,
};

/// Fetches blobs through the depot_tools download helper.
pub struct BlobFetcher {
    runner: Arc<dyn CommandRunner>,
    python: String,
    script: PathBuf,
}

impl BlobFetcher {
    /// Create a fetcher that runs the helper from the source tree's depot_tools.
    #[must_use]
    pub fn new(runner: Arc<dyn CommandRunner>, python: impl Into<String>) -> Self {
        Self {
            runner,
            python: python.into(),
            script: Path::new("third_party")
                .join("depot_tools")
                .join("download_from_google_storage.py"),
        }
    }

    /// Use a different helper script, relative to the working directory.
    #[must_use]
    pub fn with_script(mut self, script: impl Into<PathBuf>) -> Self {
        self.script = script.into();
        self
    }

    /// The helper invocation for `request`, run from `work_dir`.
    #[must_use]
    pub fn invocation(&self, request: &BlobRequest, work_dir: &Path) -> Invocation {
        let mut inv = Invocation::new(&self.python)
            .path_arg(&self.script)
            .args(["--no_resume", "--no_auth", "--bucket"])
            .arg(&request.bucket);
        inv = match &request.identity {
            BlobIdentity::ObjectId(id) => inv.arg(id),
            BlobIdentity::HashFile(file) => inv.arg("-s").path_arg(file),
        };
        if request.options.extract {
            inv = inv.arg("--extract");
        }
        if let Some(output) = &request.options.output {
            inv = inv.arg("-o").path_arg(output);
        }
        inv.current_dir(work_dir)
    }

    /// Fetch one blob named by exactly one of `object_id` or `hash_file`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BlobContractViolation`] before anything is spawned
    /// unless exactly one identity is given, [`Error::BlobFetchFailed`] when the
    /// helper exits unsuccessfully.
    pub async fn fetch_blob(
        &self,
        bucket: &str,
        object_id: Option<String>,
        hash_file: Option<PathBuf>,
        options: BlobOptions,
        ctx: FetchContext<'_>,
    ) -> Result<()> {
        let identity = BlobIdentity::from_parts(bucket, object_id, hash_file)?;
        let request = BlobRequest {
            bucket: bucket.to_string(),
            identity,
            options,
        };
        self.fetch_request(&request, ctx).await
    }

    #[instrument(
        name = "fetch_blob",
        skip(self, request, ctx),
        fields(bucket = %request.bucket, object = %request.identity)
    )]
    async fn fetch_request(&self, request: &BlobRequest, ctx: FetchContext<'_>) -> Result<()> {
        let invocation = self.invocation(request, ctx.work_dir);
        debug!(command = %invocation.display_command(), "Fetching blob");

        let output = self.runner.run(&invocation, ctx.env).await?;
        if !output.succeeded() {
            return Err(Error::BlobFetchFailed {
                bucket: request.bucket.clone(),
                object: request.identity.to_string(),
                status: output.status_description(),
                output: output.transcript(),
            });
        }

        info!(extract = request.options.extract, "Blob fetched");
        Ok(())
    }
}

#[async_trait]
impl Fetcher for BlobFetcher {
    type Request = BlobRequest;
    type Output = ();

    fn name(&self) -> &'static str {
        "gcs"
    }

    async fn fetch(&self, request: &BlobRequest, ctx: FetchContext<'_>) -> Result<()> {
        self.fetch_request(request, ctx).await
    }
}
