//! Routes a [`FetchRequest`] to the fetcher implementing its strategy.

use bootkit_core::{FetchContext, FetchRequest, Fetcher, Result};
use bootkit_tools_archive::{ArchiveFetcher, ExtractionSummary};
use bootkit_tools_cipd::PackageInstaller;
use bootkit_tools_gcs::BlobFetcher;
use tracing::debug;

/// Result of a dispatched fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Extracted(ExtractionSummary),
    Installed,
    Fetched,
}

/// Owns one fetcher per strategy.
pub struct Dispatcher {
    archive: ArchiveFetcher,
    packages: PackageInstaller,
    blobs: BlobFetcher,
}

impl Dispatcher {
    #[must_use]
    pub fn new(archive: ArchiveFetcher, packages: PackageInstaller, blobs: BlobFetcher) -> Self {
        Self {
            archive,
            packages,
            blobs,
        }
    }

    /// Perform `request` with the matching fetcher.
    ///
    /// # Errors
    ///
    /// Propagates the fetcher's failure unchanged.
    pub async fn dispatch(&self, request: &FetchRequest, ctx: FetchContext<'_>) -> Result<FetchOutcome> {
        debug!(kind = request.kind(), %request, "Dispatching fetch");
        match request {
            FetchRequest::Archive(req) => self.archive.fetch(req, ctx).await.map(FetchOutcome::Extracted),
            FetchRequest::Package(req) => self.packages.fetch(req, ctx).await.map(|()| FetchOutcome::Installed),
            FetchRequest::Blob(req) => self.blobs.fetch(req, ctx).await.map(|()| FetchOutcome::Fetched),
        }
    }
}
