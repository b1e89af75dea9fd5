//! Configuration for provisioning runs.
//!
//! Values default to the upstream Chromium layout. A `bootkit.toml` in the
//! checkout root (or a file passed with `--config-file`) overrides any subset.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::{Error, Result};

/// File name looked up in the root directory when no explicit config is given.
pub const CONFIG_FILE_NAME: &str = "bootkit.toml";

/// Tunables for a provisioning run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BootkitConfig {
    /// Base URL source tarballs are published under.
    pub source_base_url: String,
    /// Tarball name prefix; the tarball is `<name>-<revision>.tar.xz`.
    pub source_name: String,
    /// Python interpreter used for depot_tools and toolchain scripts.
    pub python: String,
    /// Vendored depot_tools checkout, relative to the root directory.
    pub depot_tools_dir: PathBuf,
    /// Report archive progress every this many entries.
    pub progress_interval: u64,
    /// Bucket holding node.js builds.
    pub nodejs_bucket: String,
    /// Bucket holding clang helper binaries (dsymutil, rc).
    pub clang_bucket: String,
    /// Windows toolchain download settings.
    pub win_toolchain: WinToolchainConfig,
}

impl Default for BootkitConfig {
    fn default() -> Self {
        Self {
            source_base_url:
                "https://github.com/chrohime/chromium_source_tarball/releases/download".to_string(),
            source_name: "chromium".to_string(),
            python: "python3".to_string(),
            depot_tools_dir: PathBuf::from("vendor").join("depot_tools"),
            progress_interval: 5000,
            nodejs_bucket: "chromium-nodejs".to_string(),
            clang_bucket: "chromium-browser-clang".to_string(),
            win_toolchain: WinToolchainConfig::default(),
        }
    }
}

/// Settings consumed by the Windows toolchain bootstrapper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WinToolchainConfig {
    /// Mirror the packaged Visual Studio toolchain is downloaded from.
    pub base_url: String,
    /// `GYP_MSVS_HASH_<toolchain>` values keyed by toolchain hash.
    pub msvs_hashes: BTreeMap<String, String>,
}

impl Default for WinToolchainConfig {
    fn default() -> Self {
        Self {
            base_url: "https://dev-cdn.electronjs.org/windows-toolchains/_".to_string(),
            msvs_hashes: BTreeMap::from([
                ("27370823e7".to_string(), "28622d16b1".to_string()),
                ("7393122652".to_string(), "3ba76c5c20".to_string()),
            ]),
        }
    }
}

impl BootkitConfig {
    /// Parse a config file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid TOML for
    /// this schema.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::io(e, Some(path), "read config file"))?;
        toml::from_str(&content).map_err(|e| {
            Error::configuration_with_help(
                format!("Invalid config file {}: {e}", path.display()),
                "Check value types; omitted keys fall back to their defaults",
            )
        })
    }

    /// Load `explicit` if given, else `<root>/bootkit.toml` if present, else defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be parsed, or if
    /// `explicit` does not exist.
    pub fn discover(root: &Path, explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            debug!(path = %path.display(), "Loading explicit config");
            return Self::load(path);
        }
        let candidate = root.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            debug!(path = %candidate.display(), "Loading config from root");
            Self::load(&candidate)
        } else {
            Ok(Self::default())
        }
    }

    /// URL of the source tarball for a revision.
    #[must_use]
    pub fn tarball_url(&self, revision: &str) -> String {
        format!(
            "{}/{revision}/{}-{revision}.tar.xz",
            self.source_base_url.trim_end_matches('/'),
            self.source_name
        )
    }
}

/// On-disk layout of a provisioning run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layout {
    /// Checkout root holding `vendor/` and the source directory.
    pub root: PathBuf,
    /// Source tree directory.
    pub src: PathBuf,
}

impl Layout {
    /// Build a layout; `src` defaults to `<root>/src`. Relative paths are
    /// made absolute against the current directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the current directory cannot be determined.
    pub fn new(root: &Path, src: Option<&Path>) -> Result<Self> {
        let cwd = std::env::current_dir()
            .map_err(|e| Error::io(e, None, "determine current directory"))?;
        let root = absolutize(&cwd, root);
        let src = src.map_or_else(|| root.join("src"), |s| absolutize(&cwd, s));
        Ok(Self { root, src })
    }

    /// Path of the vendored depot_tools checkout.
    #[must_use]
    pub fn depot_tools(&self, config: &BootkitConfig) -> PathBuf {
        self.root.join(&config.depot_tools_dir)
    }
}

fn absolutize(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
