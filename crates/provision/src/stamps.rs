//! Completion records for non-package steps.
//!
//! The store is a JSON file inside the source directory. A step is recorded
//! under the sha256 of its serialized description once it succeeds, so a
//! re-run can skip it. Version pins resolved from a manifest are cached next
//! to the manifest's digest and reused while the manifest is unchanged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use bootkit_core::{Error, Result};

use crate::node::NODE_MARKER;
use crate::plan::{Action, ROOT_MANIFEST, Step};

/// Name of the stamp file inside the source directory.
pub const STAMP_FILE_NAME: &str = ".bootkit-stamps.json";

/// A completed step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StampRecord {
    pub description: String,
    pub completed_at: DateTime<Utc>,
}

/// A version pin read from a manifest with the given digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinRecord {
    pub manifest_sha256: String,
    pub value: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StampFile {
    #[serde(default)]
    steps: BTreeMap<String, StampRecord>,
    #[serde(default)]
    pins: BTreeMap<String, PinRecord>,
}

/// The on-disk stamp store.
#[derive(Debug)]
pub struct StampStore {
    path: PathBuf,
    file: StampFile,
}

impl StampStore {
    /// Open the store in `src`. A missing file is an empty store; an
    /// unreadable one is discarded with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if an existing file cannot be read.
    pub fn open(src: &Path) -> Result<Self> {
        let path = src.join(STAMP_FILE_NAME);
        let file = match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "Ignoring unreadable stamp file");
                StampFile::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StampFile::default(),
            Err(e) => return Err(Error::io(e, Some(&path), "read stamp file")),
        };
        debug!(path = %path.display(), steps = file.steps.len(), "Opened stamp store");
        Ok(Self { path, file })
    }

    /// Location of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stable identity of a step.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`] if the step cannot be encoded.
    pub fn fingerprint(step: &Step) -> Result<String> {
        let bytes = serde_json::to_vec(step)
            .map_err(|e| Error::serialization(format!("Failed to encode step: {e}")))?;
        Ok(hex::encode(Sha256::digest(bytes)))
    }

    /// Key under which completion of `step` is recorded for the tree at `src`.
    ///
    /// The node.js step resolves its builds from the root manifest and the
    /// node marker file when it runs, so their digests are part of its key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`] if the step cannot be encoded.
    pub fn stamp_key(step: &Step, src: &Path) -> Result<String> {
        let fingerprint = Self::fingerprint(step)?;
        if !matches!(step.action, Action::Nodejs) {
            return Ok(fingerprint);
        }
        let mut hasher = Sha256::new();
        hasher.update(fingerprint.as_bytes());
        for input in [ROOT_MANIFEST, NODE_MARKER] {
            hasher.update(input.as_bytes());
            if let Ok(digest) = file_digest(&src.join(input)) {
                hasher.update(digest.as_bytes());
            }
        }
        Ok(hex::encode(hasher.finalize()))
    }

    /// Whether a step with this fingerprint completed before.
    #[must_use]
    pub fn is_stamped(&self, fingerprint: &str) -> bool {
        self.file.steps.contains_key(fingerprint)
    }

    /// Record of a completed step.
    #[must_use]
    pub fn get(&self, fingerprint: &str) -> Option<&StampRecord> {
        self.file.steps.get(fingerprint)
    }

    /// Record a completed step and persist the store.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the store cannot be written.
    pub fn record(&mut self, fingerprint: String, description: String) -> Result<()> {
        self.file.steps.insert(
            fingerprint,
            StampRecord {
                description,
                completed_at: Utc::now(),
            },
        );
        self.save()
    }

    /// Cached value of a pin, if the manifest still has `manifest_sha256`.
    #[must_use]
    pub fn cached_pin(&self, key: &str, manifest_sha256: &str) -> Option<&str> {
        self.file
            .pins
            .get(key)
            .filter(|record| record.manifest_sha256 == manifest_sha256)
            .map(|record| record.value.as_str())
    }

    /// Cache a pin value and persist the store.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the store cannot be written.
    pub fn record_pin(&mut self, key: String, manifest_sha256: String, value: String) -> Result<()> {
        self.file.pins.insert(
            key,
            PinRecord {
                manifest_sha256,
                value,
            },
        );
        self.save()
    }

    /// Number of recorded steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.file.steps.len()
    }

    /// Whether no step has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.file.steps.is_empty()
    }

    fn save(&self) -> Result<()> {
        let json = serde_json::to_vec_pretty(&self.file)
            .map_err(|e| Error::serialization(format!("Failed to encode stamps: {e}")))?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| Error::io(e, Some(&tmp), "write stamp file"))?;
        std::fs::rename(&tmp, &self.path)
            .map_err(|e| Error::io(e, Some(&self.path), "replace stamp file"))
    }
}

/// Hex sha256 of a file's contents.
///
/// # Errors
///
/// Returns [`Error::Io`] if the file cannot be read.
pub fn file_digest(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path).map_err(|e| Error::io(e, Some(path), "read manifest"))?;
    Ok(hex::encode(Sha256::digest(bytes)))
}
