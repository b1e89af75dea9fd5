//! Streaming archive fetcher for bootkit.
//!
//! Reads a tarball from a URL or a local path and unpacks it while the bytes
//! arrive. Remote archives are piped from the HTTP response straight into the
//! decoder on a blocking thread.

mod extract;

use async_trait::async_trait;
use futures::TryStreamExt;
use std::path::Path;
use tokio_util::io::{StreamReader, SyncIoBridge};
use tracing::{info, instrument};

use bootkit_core::{ArchiveRequest, ArchiveSource, Error, FetchContext, Fetcher, Result};

pub use extract::{Compression, ExtractionSummary, Progress, ProgressFn, extract_stream};

/// Entries between progress reports unless configured otherwise.
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 5000;

/// Fetches and unpacks tarballs.
#[derive(Debug, Clone)]
pub struct ArchiveFetcher {
    client: reqwest::Client,
    progress: Progress,
}

impl ArchiveFetcher {
    /// Create a fetcher with its own HTTP client.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the HTTP client cannot be built.
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("bootkit/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::configuration(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self::with_client(client))
    }

    /// Create a fetcher around an existing client.
    #[must_use]
    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            progress: Progress {
                interval: DEFAULT_PROGRESS_INTERVAL,
                callback: None,
            },
        }
    }

    /// Report progress to `callback` every `interval` entries.
    #[must_use]
    pub fn with_progress(mut self, interval: u64, callback: ProgressFn) -> Self {
        self.progress = Progress {
            interval,
            callback: Some(callback),
        };
        self
    }

    /// Stream `source` and unpack it under `destination`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ArchiveExtractionFailed`] if the archive cannot be
    /// opened or downloaded, or its stream is corrupt.
    #[instrument(name = "fetch_archive", skip(self, source), fields(source = %source))]
    pub async fn fetch_archive(
        &self,
        source: &ArchiveSource,
        destination: &Path,
    ) -> Result<ExtractionSummary> {
        let location = source.to_string();
        let compression = source
            .file_name()
            .map_or(Compression::Xz, |name| Compression::from_file_name(&name));
        let dest = destination.to_path_buf();
        let progress = self.progress.clone();

        info!(destination = %dest.display(), "Extracting archive");

        let summary = match source {
            ArchiveSource::Url(url) => {
                let response = self
                    .client
                    .get(url)
                    .send()
                    .await
                    .map_err(|e| Error::archive(&location, format!("request failed: {e}")))?;
                let status = response.status();
                if !status.is_success() {
                    return Err(Error::archive(&location, format!("HTTP {status}")));
                }

                let stream = Box::pin(response.bytes_stream().map_err(std::io::Error::other));
                let reader = SyncIoBridge::new(StreamReader::new(stream));
                tokio::task::spawn_blocking(move || {
                    extract_stream(reader, compression, &dest, &location, &progress)
                })
                .await
                .map_err(|e| Error::archive(source.to_string(), format!("extraction task failed: {e}")))??
            }
            ArchiveSource::Path(path) => {
                let file = std::fs::File::open(path)
                    .map_err(|e| Error::archive(&location, format!("cannot open archive: {e}")))?;
                tokio::task::spawn_blocking(move || {
                    extract_stream(file, compression, &dest, &location, &progress)
                })
                .await
                .map_err(|e| Error::archive(source.to_string(), format!("extraction task failed: {e}")))??
            }
        };

        info!(
            extracted = summary.extracted,
            skipped = summary.skipped,
            "Archive extracted"
        );
        Ok(summary)
    }
}

#[async_trait]
impl Fetcher for ArchiveFetcher {
    type Request = ArchiveRequest;
    type Output = ExtractionSummary;

    fn name(&self) -> &'static str {
        "archive"
    }

    async fn fetch(&self, request: &ArchiveRequest, ctx: FetchContext<'_>) -> Result<ExtractionSummary> {
        let source = match &request.source {
            ArchiveSource::Path(path) => ArchiveSource::Path(ctx.work_dir.join(path)),
            url @ ArchiveSource::Url(_) => url.clone(),
        };
        self.fetch_archive(&source, &ctx.work_dir.join(&request.destination))
            .await
    }
}
