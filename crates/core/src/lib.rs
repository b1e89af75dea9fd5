//! Core types for bootkit.
//!
//! bootkit provisions a build environment onto a fresh machine: a source
//! tarball, toolchains, pinned tool packages and single-file blobs. This crate
//! holds what every other crate shares:
//!
//! - [`Error`] / [`Result`] - the error taxonomy
//! - [`platform`] - host and target [`Platform`] tuples
//! - [`config`] - [`BootkitConfig`] and the on-disk [`Layout`]
//! - [`environment`] - the [`EnvironmentOverlay`] passed to every process
//! - [`process`] - the [`CommandRunner`] seam around external tools
//! - [`fetch`] - [`FetchRequest`] and the [`Fetcher`] contract

pub mod config;
pub mod environment;
mod error;
pub mod fetch;
pub mod platform;
pub mod process;

pub use config::{BootkitConfig, Layout};
pub use environment::EnvironmentOverlay;
pub use error::{Error, Result};
pub use fetch::{
    ArchiveRequest, ArchiveSource, BlobIdentity, BlobOptions, BlobRequest, FetchContext,
    FetchRequest, Fetcher, PackageRequest,
};
pub use platform::{Cpu, Os, Platform};
pub use process::{CommandRunner, Invocation, ProcessOutput, SystemRunner};
