//! Provisioning stages.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordered checkpoints of a provisioning run.
///
/// A stage is entered only after every step of the previous stage succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    SourceAcquired,
    ToolingBootstrapped,
    ToolchainsFetched,
    UtilityBinariesFetched,
    PlatformExtrasFetched,
    Ready,
}

impl Stage {
    /// All stages in execution order.
    pub const ALL: [Self; 6] = [
        Self::SourceAcquired,
        Self::ToolingBootstrapped,
        Self::ToolchainsFetched,
        Self::UtilityBinariesFetched,
        Self::PlatformExtrasFetched,
        Self::Ready,
    ];

    /// The stage that follows, or `None` for [`Stage::Ready`].
    #[must_use]
    pub fn next(self) -> Option<Self> {
        match self {
            Self::SourceAcquired => Some(Self::ToolingBootstrapped),
            Self::ToolingBootstrapped => Some(Self::ToolchainsFetched),
            Self::ToolchainsFetched => Some(Self::UtilityBinariesFetched),
            Self::UtilityBinariesFetched => Some(Self::PlatformExtrasFetched),
            Self::PlatformExtrasFetched => Some(Self::Ready),
            Self::Ready => None,
        }
    }

    /// Snake-case name used in logs and reports.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SourceAcquired => "source_acquired",
            Self::ToolingBootstrapped => "tooling_bootstrapped",
            Self::ToolchainsFetched => "toolchains_fetched",
            Self::UtilityBinariesFetched => "utility_binaries_fetched",
            Self::PlatformExtrasFetched => "platform_extras_fetched",
            Self::Ready => "ready",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
