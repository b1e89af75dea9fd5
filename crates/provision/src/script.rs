//! Toolchain scripts shipped inside the source tree.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

use bootkit_core::{BootkitConfig, Cpu, Invocation, Layout};

/// A script step. Everything except the depot_tools bootstrap runs from the
/// source directory with the configured python.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "script", rename_all = "snake_case")]
pub enum ScriptKind {
    /// `bootstrap/win_tools.bat` of the vendored depot_tools.
    WinToolsBootstrap,
    /// `build/vs_toolchain.py update --force`; must precede the clang update.
    VsToolchainUpdate,
    ClangUpdate,
    RustUpdate,
    /// `install-sysroot.py --arch <cpu>`.
    InstallSysroot { cpu: Cpu },
}

impl ScriptKind {
    /// Script path as written in logs, relative to the directory it runs in.
    #[must_use]
    pub fn script_path(self) -> &'static str {
        match self {
            Self::WinToolsBootstrap => "bootstrap/win_tools.bat",
            Self::VsToolchainUpdate => "build/vs_toolchain.py",
            Self::ClangUpdate => "tools/clang/scripts/update.py",
            Self::RustUpdate => "tools/rust/update_rust.py",
            Self::InstallSysroot { .. } => "build/linux/sysroot_scripts/install-sysroot.py",
        }
    }

    /// The process launch for this script.
    #[must_use]
    pub fn invocation(self, layout: &Layout, config: &BootkitConfig) -> Invocation {
        match self {
            Self::WinToolsBootstrap => {
                let script: PathBuf = layout
                    .depot_tools(config)
                    .join("bootstrap")
                    .join("win_tools.bat");
                Invocation::new(script.to_string_lossy()).current_dir(&layout.root)
            }
            Self::VsToolchainUpdate => Invocation::new(&config.python)
                .arg(self.script_path())
                .args(["update", "--force"])
                .current_dir(&layout.src),
            Self::ClangUpdate | Self::RustUpdate => Invocation::new(&config.python)
                .arg(self.script_path())
                .current_dir(&layout.src),
            Self::InstallSysroot { cpu } => Invocation::new(&config.python)
                .arg(self.script_path())
                .arg("--arch")
                .arg(cpu.to_string())
                .current_dir(&layout.src),
        }
    }
}

impl fmt::Display for ScriptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::VsToolchainUpdate => write!(f, "run {} update --force", self.script_path()),
            Self::InstallSysroot { cpu } => write!(f, "run {} --arch {cpu}", self.script_path()),
            _ => write!(f, "run {}", self.script_path()),
        }
    }
}
