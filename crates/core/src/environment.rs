//! Environment overlay handed to every spawned process.
//!
//! The overlay is built once per invocation by [`EnvironmentOverlay::materialize`]
//! and threaded by reference into each spawn. It never touches the
//! environment of the bootkit process itself.

use serde::Serialize;
use std::ffi::OsString;
use std::path::PathBuf;

use crate::config::{BootkitConfig, Layout};
use crate::platform::Os;
use crate::{Error, Result};

/// Ordered set of variables layered over the inherited environment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EnvironmentOverlay {
    vars: Vec<(String, String)>,
}

impl EnvironmentOverlay {
    /// An overlay that sets nothing.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build the overlay for a layout, reading `PATH` from the current process.
    ///
    /// # Errors
    ///
    /// Returns an error if the search path cannot be joined (an entry
    /// contains the platform path separator).
    pub fn materialize(layout: &Layout, config: &BootkitConfig, host_os: Os) -> Result<Self> {
        Self::materialize_with_path(layout, config, host_os, std::env::var_os("PATH"))
    }

    /// Build the overlay against an explicit inherited `PATH`.
    ///
    /// # Errors
    ///
    /// Returns an error if the search path cannot be joined.
    pub fn materialize_with_path(
        layout: &Layout,
        config: &BootkitConfig,
        host_os: Os,
        inherited_path: Option<OsString>,
    ) -> Result<Self> {
        let mut overlay = Self::default();
        overlay.set("DEPOT_TOOLS_UPDATE", "0");
        overlay.set(
            "CHROMIUM_BUILDTOOLS_PATH",
            layout.src.join("buildtools").to_string_lossy(),
        );

        let mut entries: Vec<PathBuf> = vec![
            layout.src.join("third_party").join("ninja"),
            layout.depot_tools(config),
        ];
        if let Some(inherited) = inherited_path {
            entries.extend(std::env::split_paths(&inherited));
        }
        let joined = std::env::join_paths(entries)
            .map_err(|e| Error::configuration(format!("Cannot build PATH: {e}")))?;
        overlay.set("PATH", joined.to_string_lossy());

        if host_os == Os::Win {
            let win = &config.win_toolchain;
            overlay.set("DEPOT_TOOLS_WIN_TOOLCHAIN", "1");
            overlay.set("DEPOT_TOOLS_WIN_TOOLCHAIN_BASE_URL", &win.base_url);
            for (toolchain, hash) in &win.msvs_hashes {
                overlay.set(format!("GYP_MSVS_HASH_{toolchain}"), hash);
            }
        }

        Ok(overlay)
    }

    /// Set a variable, replacing an earlier value for the same name.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        if let Some(slot) = self.vars.iter_mut().find(|(k, _)| *k == name) {
            slot.1 = value;
        } else {
            self.vars.push((name, value));
        }
    }

    /// Look up a variable.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Iterate variables in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of variables in the overlay.
    #[must_use]
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// Whether the overlay sets nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Apply the overlay to a command about to be spawned.
    pub fn apply(&self, cmd: &mut tokio::process::Command) {
        cmd.envs(self.iter());
    }

    /// Render as `KEY=VALUE` lines.
    #[must_use]
    pub fn to_env_lines(&self) -> String {
        self.iter()
            .map(|(k, v)| format!("{k}={v}\n"))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn layout() -> Layout {
        Layout {
            root: PathBuf::from("/checkout"),
            src: PathBuf::from("/checkout/src"),
        }
    }

    #[test]
    fn test_materialize_linux() {
        let overlay = EnvironmentOverlay::materialize_with_path(
            &layout(),
            &BootkitConfig::default(),
            Os::Linux,
            Some(OsString::from("/usr/bin")),
        )
        .unwrap();

        assert_eq!(overlay.get("DEPOT_TOOLS_UPDATE"), Some("0"));
        assert_eq!(
            overlay.get("CHROMIUM_BUILDTOOLS_PATH"),
            Some("/checkout/src/buildtools")
        );
        let path = overlay.get("PATH").unwrap();
        let entries: Vec<PathBuf> = std::env::split_paths(path).collect();
        assert_eq!(
            entries,
            vec![
                PathBuf::from("/checkout/src/third_party/ninja"),
                PathBuf::from("/checkout/vendor/depot_tools"),
                PathBuf::from("/usr/bin"),
            ]
        );
        assert!(overlay.get("DEPOT_TOOLS_WIN_TOOLCHAIN").is_none());
        assert_eq!(overlay.len(), 3);
    }

    #[test]
    fn test_materialize_windows_adds_toolchain_vars() {
        let overlay = EnvironmentOverlay::materialize_with_path(
            &layout(),
            &BootkitConfig::default(),
            Os::Win,
            None,
        )
        .unwrap();

        assert_eq!(overlay.get("DEPOT_TOOLS_WIN_TOOLCHAIN"), Some("1"));
        assert_eq!(
            overlay.get("DEPOT_TOOLS_WIN_TOOLCHAIN_BASE_URL"),
            Some("https://dev-cdn.electronjs.org/windows-toolchains/_")
        );
        assert_eq!(overlay.get("GYP_MSVS_HASH_27370823e7"), Some("28622d16b1"));
        assert_eq!(overlay.get("GYP_MSVS_HASH_7393122652"), Some("3ba76c5c20"));
    }

    #[test]
    fn test_materialize_does_not_touch_process_env() {
        let before = std::env::var_os("DEPOT_TOOLS_UPDATE");
        let _ = EnvironmentOverlay::materialize(&layout(), &BootkitConfig::default(), Os::Linux)
            .unwrap();
        assert_eq!(std::env::var_os("DEPOT_TOOLS_UPDATE"), before);
    }

    #[test]
    fn test_set_replaces() {
        let mut overlay = EnvironmentOverlay::empty();
        overlay.set("A", "1");
        overlay.set("B", "2");
        overlay.set("A", "3");
        assert_eq!(overlay.get("A"), Some("3"));
        assert_eq!(overlay.to_env_lines(), "A=3\nB=2\n");
    }

    #[test]
    fn test_depot_tools_dir_from_config() {
        let config = BootkitConfig {
            depot_tools_dir: Path::new("third_party").join("depot_tools"),
            ..Default::default()
        };
        let overlay =
            EnvironmentOverlay::materialize_with_path(&layout(), &config, Os::Mac, None).unwrap();
        assert!(
            overlay
                .get("PATH")
                .unwrap()
                .contains("/checkout/third_party/depot_tools")
        );
    }
}
