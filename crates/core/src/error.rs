//! Error types shared by every bootkit crate

use miette::Diagnostic;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Main error type for bootkit operations
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// The host reported an operating system bootkit cannot provision
    #[error("Unsupported platform: {platform}")]
    #[diagnostic(
        code(bootkit::platform::unsupported),
        help("Supported operating systems are linux, mac and win")
    )]
    UnsupportedPlatform {
        /// The platform identifier as reported by the system
        platform: String,
    },

    /// The CPU architecture string could not be normalized
    #[error("Unrecognized CPU architecture: {arch}")]
    #[diagnostic(
        code(bootkit::platform::architecture),
        help("Supported architectures are x64, arm64 and arm")
    )]
    UnrecognizedArchitecture {
        /// The architecture string as reported or requested
        arch: String,
    },

    /// The package store client reported a failure
    #[error("Installing {package} {version} into {} failed ({status})\n{output}", root.display())]
    #[diagnostic(code(bootkit::package::install_failed))]
    PackageInstallFailed {
        /// Package path, e.g. `infra/3pp/tools/ninja/${platform}`
        package: String,
        /// Requested version or tag
        version: String,
        /// Root directory the package was ensured into
        root: Box<Path>,
        /// Exit status description
        status: String,
        /// Captured stdout and stderr of the client
        output: String,
    },

    /// The blob retrieval client reported a failure
    #[error("Fetching {object} from bucket {bucket} failed ({status})\n{output}")]
    #[diagnostic(code(bootkit::blob::fetch_failed))]
    BlobFetchFailed {
        /// Bucket the blob lives in
        bucket: String,
        /// Object identity or hash file that was requested
        object: String,
        /// Exit status description
        status: String,
        /// Captured stdout and stderr of the client
        output: String,
    },

    /// A blob request named both or neither of object id and hash file
    #[error("Invalid blob request for bucket {bucket}: {message}")]
    #[diagnostic(
        code(bootkit::blob::contract),
        help("Pass exactly one of an object id or a hash file")
    )]
    BlobContractViolation {
        /// Bucket of the rejected request
        bucket: String,
        /// What was wrong with the request
        message: String,
    },

    /// The manifest query tool could not resolve a key
    #[error("Pin '{key}' not found in {}\n{output}", manifest.display())]
    #[diagnostic(code(bootkit::deps::pin_not_found))]
    PinNotFound {
        /// Dotted key that was queried
        key: String,
        /// Manifest file that was queried
        manifest: Box<Path>,
        /// Captured output of the query tool, if any
        output: String,
    },

    /// A pin value did not have a recognizable shape
    #[error("Malformed value for pin '{key}': {message}")]
    #[diagnostic(code(bootkit::deps::malformed_pin))]
    MalformedPinFormat {
        /// Dotted key that was queried
        key: String,
        /// The raw value printed by the query tool
        value: String,
        /// Why the value was rejected
        message: String,
    },

    /// The archive stream itself could not be read or decoded
    #[error("Extracting archive {location} failed: {message}")]
    #[diagnostic(code(bootkit::archive::extraction_failed))]
    ArchiveExtractionFailed {
        /// URL or path of the archive
        location: String,
        /// Description of the stream error
        message: String,
    },

    /// The directory the tarball unpacks into is already present
    #[error(
        "Unable to extract source tarball: {} already exists and would not become {}",
        path.display(),
        expected.display()
    )]
    #[diagnostic(
        code(bootkit::archive::destination_conflict),
        help("Remove or rename the existing directory and run bootstrap again")
    )]
    DestinationConflict {
        /// Directory the tarball would unpack into
        path: Box<Path>,
        /// Source directory the tree is expected to end up at
        expected: Box<Path>,
    },

    /// A toolchain or sysroot script exited unsuccessfully
    #[error("Script {script} failed ({status})\n{output}")]
    #[diagnostic(code(bootkit::script::failed))]
    ScriptFailed {
        /// Script path relative to the source tree
        script: String,
        /// Exit status description
        status: String,
        /// Captured stdout and stderr of the script
        output: String,
    },

    /// The build-graph generator or build executor exited unsuccessfully
    #[error("{tool} failed ({status})")]
    #[diagnostic(code(bootkit::build::tool_failed))]
    BuildToolFailed {
        /// Command line that failed
        tool: String,
        /// Exit status description
        status: String,
        /// Exit code, passed through by the CLI
        code: Option<i32>,
    },

    /// An external program could not be started at all
    #[error("Failed to start {program}: {source}")]
    #[diagnostic(
        code(bootkit::process::spawn),
        help("Check that the program is installed and on PATH")
    )]
    Spawn {
        /// Program that failed to start
        program: String,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    #[diagnostic(code(bootkit::config::invalid))]
    Configuration {
        /// The error message describing the configuration issue
        message: String,
        /// Optional help text
        #[help]
        help: Option<String>,
    },

    /// I/O error with path context
    #[error("I/O error during {operation}: {source}")]
    #[diagnostic(code(bootkit::io::error))]
    Io {
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
        /// The path where the I/O error occurred, if applicable
        path: Option<Box<Path>>,
        /// Description of the operation that failed
        operation: String,
    },

    /// Serialization/deserialization error
    #[error("Serialization error: {message}")]
    #[diagnostic(code(bootkit::serialization))]
    Serialization {
        /// The error message describing the serialization issue
        message: String,
    },
}

impl Error {
    /// Create an unsupported platform error
    #[must_use]
    pub fn unsupported_platform(platform: impl Into<String>) -> Self {
        Self::UnsupportedPlatform {
            platform: platform.into(),
        }
    }

    /// Create an unrecognized architecture error
    #[must_use]
    pub fn unrecognized_architecture(arch: impl Into<String>) -> Self {
        Self::UnrecognizedArchitecture { arch: arch.into() }
    }

    /// Create a blob contract violation error
    #[must_use]
    pub fn blob_contract(bucket: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BlobContractViolation {
            bucket: bucket.into(),
            message: message.into(),
        }
    }

    /// Create a malformed pin error
    #[must_use]
    pub fn malformed_pin(
        key: impl Into<String>,
        value: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::MalformedPinFormat {
            key: key.into(),
            value: value.into(),
            message: message.into(),
        }
    }

    /// Create an archive extraction error
    #[must_use]
    pub fn archive(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ArchiveExtractionFailed {
            location: location.into(),
            message: message.into(),
        }
    }

    /// Create a destination conflict error
    #[must_use]
    pub fn destination_conflict(path: impl Into<PathBuf>, expected: impl Into<PathBuf>) -> Self {
        Self::DestinationConflict {
            path: path.into().into_boxed_path(),
            expected: expected.into().into_boxed_path(),
        }
    }

    /// Create a spawn error
    #[must_use]
    pub fn spawn(program: impl Into<String>, source: std::io::Error) -> Self {
        Self::Spawn {
            program: program.into(),
            source,
        }
    }

    /// Create a configuration error with a message
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            help: None,
        }
    }

    /// Create a configuration error with help text
    #[must_use]
    pub fn configuration_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    /// Create an I/O error with context
    #[must_use]
    pub fn io(source: std::io::Error, path: Option<&Path>, operation: impl Into<String>) -> Self {
        Self::Io {
            source,
            path: path.map(|p| p.to_path_buf().into_boxed_path()),
            operation: operation.into(),
        }
    }

    /// Create a serialization error
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string())
    }
}

/// Result type for bootkit operations
pub type Result<T> = std::result::Result<T, Error>;
