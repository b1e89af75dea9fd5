//! Hand-off from a provisioned source tree to the build tools.
//!
//! [`GnGenerator`] writes output directories with `gn gen` and
//! [`NinjaBuilder`] compiles one of them with `autoninja`. Both run inside the
//! source directory with the bootkit environment overlay applied, so the
//! depot_tools wrappers resolve the same way they did during provisioning.

mod gn;
mod ninja;

pub use gn::{BuildConfig, GenOutput, GenRequest, GnGenerator};
pub use ninja::{
    BuildRequest, DEFAULT_OUT_DIR, DEFAULT_TARGET, NinjaBuilder, REMOTE_JOBS,
    uses_remote_execution,
};
