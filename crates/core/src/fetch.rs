//! The acquisition contract shared by every artifact fetcher.
//!
//! A [`FetchRequest`] names one of three fetch strategies together with the
//! parameters it needs. Each strategy lives in its own crate and implements
//! [`Fetcher`] for its request type.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::environment::EnvironmentOverlay;
use crate::{Error, Result};

/// Where an archive is read from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "location", rename_all = "lowercase")]
pub enum ArchiveSource {
    /// Remote archive fetched over HTTP(S).
    Url(String),
    /// Archive already on local disk.
    Path(PathBuf),
}

impl ArchiveSource {
    /// Classify a user-supplied location: `http(s)://` is remote, `file://`
    /// and anything else is a local path.
    #[must_use]
    pub fn parse(location: &str) -> Self {
        if location.starts_with("http://") || location.starts_with("https://") {
            Self::Url(location.to_string())
        } else if let Some(path) = location.strip_prefix("file://") {
            Self::Path(PathBuf::from(path))
        } else {
            Self::Path(PathBuf::from(location))
        }
    }

    /// Last path segment of the location, e.g. `chromium-1.2.3.tar.xz`.
    #[must_use]
    pub fn file_name(&self) -> Option<String> {
        match self {
            Self::Url(url) => url
                .split(['?', '#'])
                .next()
                .and_then(|u| u.rsplit('/').next())
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            Self::Path(path) => path
                .file_name()
                .map(|name| name.to_string_lossy().to_string()),
        }
    }
}

impl fmt::Display for ArchiveSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Url(url) => write!(f, "{url}"),
            Self::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Stream an archive and unpack it under a directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveRequest {
    pub source: ArchiveSource,
    pub destination: PathBuf,
}

/// Ensure `package` at `version` is installed under `root`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRequest {
    /// Install root, relative to the fetch working directory.
    pub root: PathBuf,
    pub package: String,
    pub version: String,
}

/// How a blob's content identity is named.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlobIdentity {
    /// The content hash itself.
    ObjectId(String),
    /// A file holding the content hash.
    HashFile(PathBuf),
}

impl BlobIdentity {
    /// Build an identity from the two optional caller inputs.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BlobContractViolation`] unless exactly one is given.
    pub fn from_parts(
        bucket: &str,
        object_id: Option<String>,
        hash_file: Option<PathBuf>,
    ) -> Result<Self> {
        match (object_id, hash_file) {
            (Some(id), None) => Ok(Self::ObjectId(id)),
            (None, Some(file)) => Ok(Self::HashFile(file)),
            (Some(_), Some(_)) => Err(Error::blob_contract(
                bucket,
                "both an object id and a hash file were given",
            )),
            (None, None) => Err(Error::blob_contract(
                bucket,
                "neither an object id nor a hash file was given",
            )),
        }
    }
}

impl fmt::Display for BlobIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ObjectId(id) => write!(f, "{id}"),
            Self::HashFile(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Extraction and placement of a fetched blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobOptions {
    /// Unpack the blob next to its hash file / output.
    pub extract: bool,
    /// Where to write the blob.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
}

impl Default for BlobOptions {
    fn default() -> Self {
        Self {
            extract: true,
            output: None,
        }
    }
}

impl BlobOptions {
    /// Write the blob verbatim instead of unpacking it.
    #[must_use]
    pub fn verbatim() -> Self {
        Self {
            extract: false,
            output: None,
        }
    }

    /// Set the output path.
    #[must_use]
    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = Some(output.into());
        self
    }
}

/// Retrieve a single pinned object from a bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobRequest {
    pub bucket: String,
    pub identity: BlobIdentity,
    pub options: BlobOptions,
}

/// One acquisition, tagged by strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FetchRequest {
    Archive(ArchiveRequest),
    Package(PackageRequest),
    Blob(BlobRequest),
}

impl FetchRequest {
    /// Strategy name.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Archive(_) => "archive",
            Self::Package(_) => "package",
            Self::Blob(_) => "blob",
        }
    }
}

impl fmt::Display for FetchRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Archive(req) => write!(f, "archive {} -> {}", req.source, req.destination.display()),
            Self::Package(req) => write!(
                f,
                "package {} {} -> {}",
                req.package,
                req.version,
                req.root.display()
            ),
            Self::Blob(req) => write!(f, "blob {} from {}", req.identity, req.bucket),
        }
    }
}

/// Per-invocation context handed to fetchers.
#[derive(Debug, Clone, Copy)]
pub struct FetchContext<'a> {
    /// Overlay applied to every spawned helper.
    pub env: &'a EnvironmentOverlay,
    /// Directory relative request paths resolve against.
    pub work_dir: &'a Path,
}

/// An artifact acquisition strategy.
///
/// Fetchers perform the side effect unconditionally; deciding whether the
/// artifact is already present belongs to the caller.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Parameters of one fetch.
    type Request: Send + Sync;
    /// What a successful fetch reports back.
    type Output: Send;

    /// Strategy name (e.g. "archive", "cipd", "gcs").
    fn name(&self) -> &'static str;

    /// Perform the fetch.
    ///
    /// # Errors
    ///
    /// Returns the strategy's failure kind with the helper's captured output.
    async fn fetch(&self, request: &Self::Request, ctx: FetchContext<'_>) -> Result<Self::Output>;
}
