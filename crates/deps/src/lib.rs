//! Dependency pin reader for bootkit.
//!
//! Versions and content hashes of pinned artifacts live in the source tree's
//! dependency manifest (`DEPS`). This crate asks gclient's `getdep` command
//! for a single variable and hands back a typed [`Pin`]:
//!
//! - `Pin::Version` for package pins (`version:2@1.12.1`)
//! - `Pin::Object` for bucket objects (`[{'object_name': ..., 'output_file': ...}]`)

mod literal;

use bootkit_core::{CommandRunner, Error, FetchContext, Invocation, Result};
use regex::Regex;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

pub use literal::Literal;

/// A bucket object named by a structured pin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectPin {
    /// Content identity of the object.
    pub object_name: String,
    /// File name the object is written to.
    pub output_file: String,
}

/// A resolved manifest pin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "shape", content = "value", rename_all = "lowercase")]
pub enum Pin {
    /// A single version or tag string.
    Version(String),
    /// A bucket object record.
    Object(ObjectPin),
}

impl Pin {
    /// Require a version-shaped pin.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedPinFormat`] for object pins.
    pub fn into_version(self, key: &str) -> Result<String> {
        match self {
            Self::Version(v) => Ok(v),
            Self::Object(obj) => Err(Error::malformed_pin(
                key,
                obj.object_name,
                "expected a version string, found an object record",
            )),
        }
    }

    /// Require an object-shaped pin.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedPinFormat`] for version pins.
    pub fn into_object(self, key: &str) -> Result<ObjectPin> {
        match self {
            Self::Object(obj) => Ok(obj),
            Self::Version(v) => Err(Error::malformed_pin(
                key,
                v,
                "expected an object record, found a version string",
            )),
        }
    }
}

/// Parse the text a manifest query printed for `key`.
///
/// # Errors
///
/// Returns [`Error::MalformedPinFormat`] when the text is empty, spans several
/// lines without being a literal, or is a record missing `object_name` or
/// `output_file`.
pub fn parse_pin(key: &str, raw: &str) -> Result<Pin> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(Error::malformed_pin(key, raw, "the value is empty"));
    }

    match text.chars().next() {
        Some('[' | '{' | '(') => {
            let value = literal::parse(text).map_err(|msg| Error::malformed_pin(key, text, msg))?;
            let record = match &value {
                Literal::Map(_) => &value,
                Literal::List(items) => items
                    .first()
                    .ok_or_else(|| Error::malformed_pin(key, text, "the object list is empty"))?,
                _ => {
                    return Err(Error::malformed_pin(key, text, "expected a record or list"));
                }
            };
            let field = |name: &str| {
                record
                    .get(name)
                    .and_then(Literal::as_str)
                    .map(str::to_string)
                    .ok_or_else(|| {
                        Error::malformed_pin(key, text, format!("the record has no '{name}'"))
                    })
            };
            Ok(Pin::Object(ObjectPin {
                object_name: field("object_name")?,
                output_file: field("output_file")?,
            }))
        }
        Some('\'' | '"') => match literal::parse(text) {
            Ok(Literal::Str(s)) => Ok(Pin::Version(s)),
            Ok(_) => Err(Error::malformed_pin(key, text, "expected a string")),
            Err(msg) => Err(Error::malformed_pin(key, text, msg)),
        },
        _ if text.lines().count() > 1 => Err(Error::malformed_pin(
            key,
            text,
            "expected a single value, found several lines",
        )),
        _ => Ok(Pin::Version(text.to_string())),
    }
}

/// Reads pins through gclient's `getdep` command.
pub struct PinReader {
    runner: Arc<dyn CommandRunner>,
    python: String,
    gclient_script: PathBuf,
}

impl PinReader {
    /// Create a reader that runs `gclient.py` from the source tree's depot_tools.
    #[must_use]
    pub fn new(runner: Arc<dyn CommandRunner>, python: impl Into<String>) -> Self {
        Self {
            runner,
            python: python.into(),
            gclient_script: Path::new("third_party")
                .join("depot_tools")
                .join("gclient.py"),
        }
    }

    /// Use a different `gclient.py`, relative to the working directory.
    #[must_use]
    pub fn with_gclient_script(mut self, script: impl Into<PathBuf>) -> Self {
        self.gclient_script = script.into();
        self
    }

    /// The invocation that queries `key` from `manifest`.
    #[must_use]
    pub fn invocation(&self, manifest: &Path, key: &str, work_dir: &Path) -> Invocation {
        Invocation::new(&self.python)
            .path_arg(&self.gclient_script)
            .arg("getdep")
            .arg("--deps-file")
            .path_arg(manifest)
            .arg("-r")
            .arg(key)
            .current_dir(work_dir)
    }

    /// Read the value of `key` from `manifest`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PinNotFound`] if the query tool exits unsuccessfully,
    /// [`Error::MalformedPinFormat`] if its output has no recognizable shape.
    pub async fn read_pin(&self, manifest: &Path, key: &str, ctx: FetchContext<'_>) -> Result<Pin> {
        debug!(%key, manifest = %manifest.display(), "Reading dependency pin");
        let invocation = self.invocation(manifest, key, ctx.work_dir);
        let output = self.runner.run(&invocation, ctx.env).await?;

        if !output.succeeded() {
            return Err(Error::PinNotFound {
                key: key.to_string(),
                manifest: manifest.to_path_buf().into_boxed_path(),
                output: output.transcript(),
            });
        }

        let pin = parse_pin(key, &output.stdout)?;
        info!(%key, ?pin, "Resolved dependency pin");
        Ok(pin)
    }
}

/// Return capture group 1 of the first match of `pattern` in `manifest`.
///
/// # Errors
///
/// Returns [`Error::Configuration`] for an invalid pattern or one without a
/// capture group, [`Error::PinNotFound`] when nothing matches.
pub async fn search_manifest(manifest: &Path, pattern: &str) -> Result<String> {
    let regex = Regex::new(pattern)
        .map_err(|e| Error::configuration(format!("Invalid manifest pattern '{pattern}': {e}")))?;
    if regex.captures_len() < 2 {
        return Err(Error::configuration(format!(
            "Manifest pattern '{pattern}' has no capture group"
        )));
    }

    let content = tokio::fs::read_to_string(manifest)
        .await
        .map_err(|e| Error::io(e, Some(manifest), "read manifest"))?;

    regex
        .captures(&content)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| Error::PinNotFound {
            key: pattern.to_string(),
            manifest: manifest.to_path_buf().into_boxed_path(),
            output: format!("No match for pattern {pattern}"),
        })
}
