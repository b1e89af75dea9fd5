//! node.js discovery.
//!
//! Source trees name their node.js builds one of two ways. Older trees ship
//! `.sha1` hash files under `third_party/node` and mention the bucket version
//! in `DEPS`; newer trees declare structured bucket pins in `DEPS`. The hash
//! file layout wins whenever its linux marker is present.

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use bootkit_core::{
    BlobIdentity, BlobOptions, BlobRequest, BootkitConfig, FetchContext, Os, Platform, Result,
};
use bootkit_deps::{PinReader, search_manifest};

use crate::plan::ROOT_MANIFEST;

/// Hash file whose presence selects [`NodeStrategy::HashFiles`].
pub const NODE_MARKER: &str = "third_party/node/linux/node-linux-x64.tar.gz.sha1";

/// How node.js builds are located in the source tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStrategy {
    /// `.sha1` files under `third_party/node`, bucket version from `DEPS` text.
    HashFiles,
    /// Structured `src/third_party/node/<dir>` pins in `DEPS`.
    ManifestPins,
}

impl NodeStrategy {
    /// Pick the strategy for the tree at `src`.
    #[must_use]
    pub fn detect(src: &Path) -> Self {
        if src.join(NODE_MARKER).is_file() {
            Self::HashFiles
        } else {
            Self::ManifestPins
        }
    }
}

impl fmt::Display for NodeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HashFiles => f.write_str("hash files"),
            Self::ManifestPins => f.write_str("manifest pins"),
        }
    }
}

/// Blob requests fetching node.js for `host`. The linux build is always
/// included.
///
/// # Errors
///
/// Returns [`bootkit_core::Error::PinNotFound`] if the bucket version or a pin
/// cannot be found, [`bootkit_core::Error::MalformedPinFormat`] if a pin is
/// not an object record.
pub async fn node_requests(
    strategy: NodeStrategy,
    host: Platform,
    config: &BootkitConfig,
    pins: &PinReader,
    ctx: FetchContext<'_>,
) -> Result<Vec<BlobRequest>> {
    let requests = match strategy {
        NodeStrategy::HashFiles => hash_file_requests(host, config, ctx.work_dir).await?,
        NodeStrategy::ManifestPins => manifest_pin_requests(host, config, pins, ctx).await?,
    };
    info!(%strategy, count = requests.len(), "Resolved node.js downloads");
    Ok(requests)
}

async fn hash_file_requests(
    host: Platform,
    config: &BootkitConfig,
    src: &Path,
) -> Result<Vec<BlobRequest>> {
    let pattern = format!("{}/([0-9.]*)", regex::escape(&config.nodejs_bucket));
    let version = search_manifest(&src.join(ROOT_MANIFEST), &pattern).await?;
    let bucket = format!("{}/{version}", config.nodejs_bucket);
    debug!(%bucket, "Found node.js bucket version");

    let request = |hash_file: String, options: BlobOptions| BlobRequest {
        bucket: bucket.clone(),
        identity: BlobIdentity::HashFile(PathBuf::from(hash_file)),
        options,
    };

    let mut requests = vec![request(NODE_MARKER.to_string(), BlobOptions::default())];
    match host.os {
        Os::Mac => requests.push(request(
            format!("third_party/node/mac/node-darwin-{}.tar.gz.sha1", host.cpu),
            BlobOptions::default(),
        )),
        Os::Win => requests.push(request(
            "third_party/node/win/node.exe.sha1".to_string(),
            BlobOptions::verbatim(),
        )),
        Os::Linux => {}
    }
    Ok(requests)
}

async fn manifest_pin_requests(
    host: Platform,
    config: &BootkitConfig,
    pins: &PinReader,
    ctx: FetchContext<'_>,
) -> Result<Vec<BlobRequest>> {
    let dirs: &[&str] = match host.os {
        Os::Linux => &["linux"],
        Os::Mac => &["linux", "mac", "mac_arm64"],
        Os::Win => &["linux", "win"],
    };

    let mut requests = Vec::with_capacity(dirs.len());
    for dir in dirs {
        let name = format!("third_party/node/{dir}");
        let key = format!("src/{name}");
        let object = pins
            .read_pin(Path::new(ROOT_MANIFEST), &key, ctx)
            .await?
            .into_object(&key)?;
        requests.push(BlobRequest {
            bucket: config.nodejs_bucket.clone(),
            identity: BlobIdentity::ObjectId(object.object_name),
            options: BlobOptions::default()
                .with_output(Path::new(&name).join(&object.output_file)),
        });
    }
    Ok(requests)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_prefers_marker() {
        let temp = tempfile::tempdir().unwrap();
        assert_eq!(NodeStrategy::detect(temp.path()), NodeStrategy::ManifestPins);

        let marker = temp.path().join(NODE_MARKER);
        std::fs::create_dir_all(marker.parent().unwrap()).unwrap();
        std::fs::write(&marker, "deadbeef").unwrap();
        assert_eq!(NodeStrategy::detect(temp.path()), NodeStrategy::HashFiles);
    }
}
