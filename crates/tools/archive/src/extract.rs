//! Entry-by-entry tarball extraction.
//!
//! Runs on a blocking thread and pulls bytes from any [`Read`], so a remote
//! archive is unpacked while it downloads and never touches disk whole.

use flate2::read::GzDecoder;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use tar::Archive;
use tracing::{debug, trace, warn};
use xz2::read::XzDecoder;

use bootkit_core::{Error, Result};

/// Callback receiving the number of entries processed so far.
pub type ProgressFn = Arc<dyn Fn(u64) + Send + Sync>;

/// Compression wrapped around the tar stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Xz,
    Gzip,
    None,
}

impl Compression {
    /// Pick the decoder from the archive's file name. Unknown suffixes are
    /// treated as xz, the format source tarballs are published in.
    #[must_use]
    pub fn from_file_name(name: &str) -> Self {
        let lower = name.to_ascii_lowercase();
        if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
            Self::Gzip
        } else if lower.ends_with(".tar") {
            Self::None
        } else {
            Self::Xz
        }
    }
}

/// Counts reported after an extraction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractionSummary {
    /// Entries written under the destination.
    pub extracted: u64,
    /// Entries that could not be written and were skipped.
    pub skipped: u64,
}

impl ExtractionSummary {
    /// Total entries seen in the stream.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.extracted + self.skipped
    }
}

/// Progress reporting settings.
#[derive(Clone)]
pub struct Progress {
    pub interval: u64,
    pub callback: Option<ProgressFn>,
}

impl Progress {
    fn tick(&self, processed: u64) {
        if let Some(callback) = &self.callback
            && self.interval > 0
            && processed % self.interval == 0
        {
            callback(processed);
        }
    }
}

impl std::fmt::Debug for Progress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Progress")
            .field("interval", &self.interval)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

/// Unpack a possibly compressed tar stream under `dest`.
///
/// An entry that cannot be written (bad link target, unsupported special
/// file, path escaping `dest`) is logged and skipped. A stream that cannot be
/// read any further aborts the extraction.
///
/// # Errors
///
/// Returns [`Error::ArchiveExtractionFailed`] when the stream is truncated or
/// corrupt, [`Error::Io`] when `dest` cannot be created.
pub fn extract_stream<R: Read>(
    reader: R,
    compression: Compression,
    dest: &Path,
    location: &str,
    progress: &Progress,
) -> Result<ExtractionSummary> {
    std::fs::create_dir_all(dest)
        .map_err(|e| Error::io(e, Some(dest), "create extraction directory"))?;

    debug!(?compression, ?dest, %location, "Extracting archive");
    match compression {
        Compression::Xz => unpack_entries(XzDecoder::new(reader), dest, location, progress),
        Compression::Gzip => unpack_entries(GzDecoder::new(reader), dest, location, progress),
        Compression::None => unpack_entries(reader, dest, location, progress),
    }
}

fn unpack_entries<R: Read>(
    reader: R,
    dest: &Path,
    location: &str,
    progress: &Progress,
) -> Result<ExtractionSummary> {
    let mut archive = Archive::new(reader);
    archive.set_preserve_permissions(true);
    archive.set_overwrite(true);

    let entries = archive
        .entries()
        .map_err(|e| Error::archive(location, format!("cannot read archive: {e}")))?;

    let mut summary = ExtractionSummary::default();
    for entry in entries {
        let mut entry = entry
            .map_err(|e| Error::archive(location, format!("corrupt archive stream: {e}")))?;
        let entry_path = entry
            .path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|_| "<invalid path>".to_string());

        match entry.unpack_in(dest) {
            Ok(true) => {
                trace!(path = %entry_path, "Extracted entry");
                summary.extracted += 1;
            }
            Ok(false) => {
                warn!(path = %entry_path, "Skipped entry outside the destination");
                summary.skipped += 1;
            }
            Err(e) => {
                warn!(path = %entry_path, error = %e, "Skipped entry that could not be extracted");
                summary.skipped += 1;
            }
        }
        progress.tick(summary.total());
    }

    debug!(
        extracted = summary.extracted,
        skipped = summary.skipped,
        "Archive extraction finished"
    );
    Ok(summary)
}
