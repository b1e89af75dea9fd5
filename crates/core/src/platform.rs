//! Host and target platform identification.
//!
//! Every provisioning decision is keyed on a [`Platform`] tuple. The host
//! tuple comes from [`Platform::host`]; the target tuple defaults to the host
//! and can be overridden from the command line.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Platform identifier combining OS and CPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Platform {
    pub os: Os,
    pub cpu: Cpu,
}

impl Platform {
    /// Create a new platform.
    #[must_use]
    pub fn new(os: Os, cpu: Cpu) -> Self {
        Self { os, cpu }
    }

    /// Resolve the platform bootkit is running on.
    ///
    /// # Errors
    ///
    /// Fails when the running OS or architecture is not one bootkit provisions.
    pub fn host() -> Result<Self> {
        Ok(Self {
            os: resolve_host_os()?,
            cpu: resolve_host_cpu()?,
        })
    }

    /// Build a platform from the raw identifiers a system reports.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::UnsupportedPlatform`] or
    /// [`Error::UnrecognizedArchitecture`].
    pub fn from_reported(platform_id: &str, arch: &str) -> Result<Self> {
        Ok(Self {
            os: Os::from_platform_id(platform_id)?,
            cpu: Cpu::normalize(arch)?,
        })
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.os, self.cpu)
    }
}

/// Operating system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Os {
    Linux,
    Mac,
    Win,
}

impl Os {
    /// Map a system platform identifier to an OS token.
    ///
    /// Accepts `std::env::consts::OS` values (`linux`, `macos`, `windows`) as
    /// well as the `linux*` / `win*` / `darwin` spellings other tools report.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedPlatform`] for anything else.
    pub fn from_platform_id(id: &str) -> Result<Self> {
        let lower = id.to_lowercase();
        if lower.starts_with("linux") {
            Ok(Self::Linux)
        } else if lower.starts_with("win") {
            Ok(Self::Win)
        } else if matches!(lower.as_str(), "darwin" | "macos" | "mac") {
            Ok(Self::Mac)
        } else {
            Err(Error::unsupported_platform(id))
        }
    }

    /// Executable suffix for batch wrappers depot_tools ships on this OS.
    #[must_use]
    pub fn script_suffix(self) -> &'static str {
        match self {
            Self::Win => ".bat",
            Self::Linux | Self::Mac => "",
        }
    }

    /// Name of a depot_tools wrapper command on this OS (`cipd` / `cipd.bat`).
    #[must_use]
    pub fn wrapper(self, name: &str) -> String {
        format!("{name}{}", self.script_suffix())
    }
}

impl FromStr for Os {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_platform_id(s)
    }
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Linux => write!(f, "linux"),
            Self::Mac => write!(f, "mac"),
            Self::Win => write!(f, "win"),
        }
    }
}

/// CPU architecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cpu {
    X64,
    Arm64,
    Arm,
}

impl Cpu {
    /// Normalize an architecture string to a CPU token.
    ///
    /// `amd64`, `x86_64` and `x64` become `x64`; `arm64` and `aarch64` become
    /// `arm64`; any other `arm*` string becomes `arm`. Matching is
    /// case-insensitive and normalizing a token's own name returns it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnrecognizedArchitecture`] for anything else.
    pub fn normalize(arch: &str) -> Result<Self> {
        let lower = arch.to_lowercase();
        match lower.as_str() {
            "amd64" | "x86_64" | "x64" => Ok(Self::X64),
            "arm64" | "aarch64" => Ok(Self::Arm64),
            other if other.starts_with("arm") => Ok(Self::Arm),
            _ => Err(Error::unrecognized_architecture(arch)),
        }
    }
}

impl FromStr for Cpu {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::normalize(s)
    }
}

impl fmt::Display for Cpu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::X64 => write!(f, "x64"),
            Self::Arm64 => write!(f, "arm64"),
            Self::Arm => write!(f, "arm"),
        }
    }
}

/// Resolve the OS bootkit is running on.
///
/// # Errors
///
/// Returns [`Error::UnsupportedPlatform`] on hosts other than linux, mac and win.
pub fn resolve_host_os() -> Result<Os> {
    Os::from_platform_id(std::env::consts::OS)
}

/// Resolve the CPU bootkit is running on.
///
/// # Errors
///
/// Returns [`Error::UnrecognizedArchitecture`] on unknown architectures.
pub fn resolve_host_cpu() -> Result<Cpu> {
    Cpu::normalize(std::env::consts::ARCH)
}
