//! The provisioning plan.
//!
//! A [`Plan`] is a pure function of the host and target platforms, the
//! configuration and the tarball to start from. Anything that depends on the
//! state of disk or on manifest contents is deferred: pins are named with a
//! [`PinRef`] and read when the step runs, directory checks are expressed as a
//! [`Condition`].

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

use bootkit_core::{
    ArchiveSource, BlobIdentity, BlobOptions, BlobRequest, BootkitConfig, Error, Os, Platform,
    Result,
};

use crate::script::ScriptKind;
use crate::stage::Stage;
use crate::stamps::StampStore;

/// Manifest at the top of the source tree.
pub const ROOT_MANIFEST: &str = "DEPS";

const ESBUILD_DIR: &str = "third_party/devtools-frontend/src/third_party/esbuild";
const ESBUILD_MANIFEST: &str = "third_party/devtools-frontend/src/DEPS";

/// A manifest variable read when its step runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PinRef {
    /// Manifest path relative to the source directory.
    pub manifest: PathBuf,
    /// Dotted variable key.
    pub key: String,
}

impl PinRef {
    fn root(key: &str) -> Self {
        Self {
            manifest: PathBuf::from(ROOT_MANIFEST),
            key: key.to_string(),
        }
    }
}

impl fmt::Display for PinRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.manifest.display(), self.key)
    }
}

/// A fetch whose request is completed at execution time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "fetch", rename_all = "snake_case")]
pub enum DeferredFetch {
    /// Unpack the source tarball into the root and move its top directory to
    /// the source directory.
    Source {
        source: ArchiveSource,
        /// Directory the tarball unpacks into, relative to the root.
        implied_dir: String,
    },
    /// Ensure a package whose version is a manifest pin.
    Package {
        root: PathBuf,
        package: String,
        version: PinRef,
    },
    /// Fetch a blob; fully known at plan time.
    Blob(BlobRequest),
}

/// What a step does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    Fetch(DeferredFetch),
    Script(ScriptKind),
    /// Fetch node.js, choosing the discovery strategy from the source tree.
    Nodejs,
}

/// A check evaluated against the source directory before a step runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "condition", content = "path", rename_all = "snake_case")]
pub enum Condition {
    /// The relative path exists and is a directory.
    DirExists(PathBuf),
}

impl Condition {
    /// Whether the check holds for the source tree at `src`.
    #[must_use]
    pub fn holds(&self, src: &Path) -> bool {
        match self {
            Self::DirExists(path) => src.join(path).is_dir(),
        }
    }
}

/// One unit of work in a stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Step {
    pub stage: Stage,
    #[serde(flatten)]
    pub action: Action,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
}

impl Step {
    fn new(stage: Stage, action: Action) -> Self {
        Self {
            stage,
            action,
            condition: None,
        }
    }

    fn when(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }

    fn package(root: &str, package: &str, version: PinRef) -> Self {
        Self::new(
            Stage::UtilityBinariesFetched,
            Action::Fetch(DeferredFetch::Package {
                root: PathBuf::from(root),
                package: package.to_string(),
                version,
            }),
        )
    }

    fn blob(bucket: &str, hash_file: &str, options: BlobOptions) -> Self {
        Self::new(
            Stage::PlatformExtrasFetched,
            Action::Fetch(DeferredFetch::Blob(BlobRequest {
                bucket: bucket.to_string(),
                identity: BlobIdentity::HashFile(PathBuf::from(hash_file)),
                options,
            })),
        )
    }

    fn script(stage: Stage, kind: ScriptKind) -> Self {
        Self::new(stage, Action::Script(kind))
    }

    /// Whether completion of this step is recorded in the stamp store.
    /// Package steps always run; the package manager reconciles itself.
    #[must_use]
    pub fn records_stamp(&self) -> bool {
        !matches!(
            self.action,
            Action::Fetch(DeferredFetch::Source { .. } | DeferredFetch::Package { .. })
        )
    }

    /// Whether the step can be skipped.
    ///
    /// The source step is satisfied once the source directory exists. Package
    /// steps never are. Everything else is satisfied when stamped, unless
    /// `force` is set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`] if the step cannot be fingerprinted.
    pub fn is_satisfied(&self, src: &Path, stamps: Option<&StampStore>, force: bool) -> Result<bool> {
        match &self.action {
            Action::Fetch(DeferredFetch::Source { .. }) => Ok(src.is_dir()),
            Action::Fetch(DeferredFetch::Package { .. }) => Ok(false),
            _ => match stamps {
                Some(store) if !force => Ok(store.is_stamped(&StampStore::stamp_key(self, src)?)),
                _ => Ok(false),
            },
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.action {
            Action::Fetch(DeferredFetch::Source {
                source,
                implied_dir,
            }) => write!(f, "extract {source} and move {implied_dir} to the source directory")?,
            Action::Fetch(DeferredFetch::Package {
                root,
                package,
                version,
            }) => write!(f, "ensure {package} in {} (version {version})", root.display())?,
            Action::Fetch(DeferredFetch::Blob(req)) => {
                write!(f, "fetch {} from {}", req.identity, req.bucket)?;
                if let Some(output) = &req.options.output {
                    write!(f, " -> {}", output.display())?;
                }
            }
            Action::Script(kind) => write!(f, "{kind}")?,
            Action::Nodejs => f.write_str("fetch node.js")?,
        }
        if let Some(Condition::DirExists(path)) = &self.condition {
            write!(f, " (if {} exists)", path.display())?;
        }
        Ok(())
    }
}

/// Ordered steps for one host/target combination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Plan {
    pub host: Platform,
    pub target: Platform,
    pub steps: Vec<Step>,
}

impl Plan {
    /// Build the plan.
    ///
    /// Without a `source` the plan has no source step and expects the source
    /// directory to exist already.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if no directory name can be derived
    /// from the tarball location.
    pub fn build(
        host: Platform,
        target: Platform,
        source: Option<&ArchiveSource>,
        config: &BootkitConfig,
    ) -> Result<Self> {
        let mut steps = Vec::new();

        if let Some(source) = source {
            steps.push(Step::new(
                Stage::SourceAcquired,
                Action::Fetch(DeferredFetch::Source {
                    source: source.clone(),
                    implied_dir: implied_directory(source)?,
                }),
            ));
        }

        if host.os == Os::Win {
            steps.push(Step::script(Stage::ToolingBootstrapped, ScriptKind::WinToolsBootstrap));
            steps.push(Step::script(Stage::ToolingBootstrapped, ScriptKind::VsToolchainUpdate));
        }

        steps.push(Step::script(Stage::ToolchainsFetched, ScriptKind::ClangUpdate));
        steps.push(Step::script(Stage::ToolchainsFetched, ScriptKind::RustUpdate));

        steps.push(Step::new(Stage::UtilityBinariesFetched, Action::Nodejs));
        steps.push(
            Step::package(
                ESBUILD_DIR,
                "infra/3pp/tools/esbuild/${platform}",
                PinRef {
                    manifest: PathBuf::from(ESBUILD_MANIFEST),
                    key: "third_party/esbuild:infra/3pp/tools/esbuild/${platform}".to_string(),
                },
            )
            .when(Condition::DirExists(PathBuf::from(ESBUILD_DIR))),
        );
        steps.push(Step::package(
            "third_party/ninja",
            "infra/3pp/tools/ninja/${platform}",
            PinRef::root("src/third_party/ninja:infra/3pp/tools/ninja/${platform}"),
        ));
        steps.push(Step::package(
            "buildtools/reclient",
            "infra/rbe/client/${platform}",
            PinRef::root("src/buildtools/reclient:infra/rbe/client/${platform}"),
        ));
        let (gn_root, gn_package) = match host.os {
            Os::Linux => ("buildtools/linux64", "gn/gn/linux-${arch}"),
            Os::Mac => ("buildtools/mac", "gn/gn/mac-${arch}"),
            Os::Win => ("buildtools/win", "gn/gn/windows-amd64"),
        };
        steps.push(Step::package(
            gn_root,
            gn_package,
            PinRef::root("src/buildtools/mac:gn/gn/mac-${arch}"),
        ));

        let rc_bucket = format!("{}/rc", config.clang_bucket);
        match host.os {
            Os::Linux => {
                if target.os == Os::Win {
                    steps.push(Step::blob(
                        &rc_bucket,
                        "build/toolchain/win/rc/linux64/rc.sha1",
                        BlobOptions::verbatim(),
                    ));
                }
                steps.push(Step::script(
                    Stage::PlatformExtrasFetched,
                    ScriptKind::InstallSysroot { cpu: host.cpu },
                ));
                if target.cpu != host.cpu {
                    steps.push(Step::script(
                        Stage::PlatformExtrasFetched,
                        ScriptKind::InstallSysroot { cpu: target.cpu },
                    ));
                }
            }
            Os::Mac => {
                steps.push(Step::blob(
                    &config.clang_bucket,
                    &format!("tools/clang/dsymutil/bin/dsymutil.{}.sha1", host.cpu),
                    BlobOptions::verbatim().with_output("tools/clang/dsymutil/bin/dsymutil"),
                ));
                if target.os == Os::Win {
                    steps.push(Step::blob(
                        &rc_bucket,
                        "build/toolchain/win/rc/mac/rc.sha1",
                        BlobOptions::verbatim(),
                    ));
                }
            }
            Os::Win => {
                steps.push(Step::blob(
                    &rc_bucket,
                    "build/toolchain/win/rc/win/rc.exe.sha1",
                    BlobOptions::verbatim(),
                ));
            }
        }

        Ok(Self {
            host,
            target,
            steps,
        })
    }

    /// Steps belonging to `stage`, in plan order.
    pub fn steps_in(&self, stage: Stage) -> impl Iterator<Item = &Step> {
        self.steps.iter().filter(move |step| step.stage == stage)
    }
}

/// Directory a tarball unpacks into: its file name without the archive suffix.
///
/// # Errors
///
/// Returns [`Error::Configuration`] if the location has no file name or no
/// recognised tarball suffix.
pub fn implied_directory(source: &ArchiveSource) -> Result<String> {
    let name = source.file_name().ok_or_else(|| {
        Error::configuration(format!("Cannot derive a directory name from {source}"))
    })?;
    [".tar.xz", ".tar.gz", ".tgz", ".tar"]
        .iter()
        .find_map(|suffix| name.strip_suffix(suffix))
        .filter(|stem| !stem.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            Error::configuration_with_help(
                format!("Unrecognised tarball name '{name}'"),
                "Source tarballs are expected to be named <name>-<revision>.tar.xz",
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bootkit_core::Cpu;

    fn tarball() -> ArchiveSource {
        ArchiveSource::parse("https://example.com/dl/1.0/chromium-1.0.tar.xz")
    }

    #[test]
    fn test_implied_directory() {
        assert_eq!(implied_directory(&tarball()).unwrap(), "chromium-1.0");
        assert_eq!(
            implied_directory(&ArchiveSource::parse("/tmp/tree.tgz")).unwrap(),
            "tree"
        );
        assert!(implied_directory(&ArchiveSource::parse("https://example.com/")).is_err());
        assert!(implied_directory(&ArchiveSource::parse("/tmp/tree.zip")).is_err());
        assert!(implied_directory(&ArchiveSource::parse("/tmp/.tar.xz")).is_err());
    }

    #[test]
    fn test_stages_are_monotonic() {
        for host in [Os::Linux, Os::Mac, Os::Win] {
            let plan = Plan::build(
                Platform::new(host, Cpu::X64),
                Platform::new(Os::Win, Cpu::Arm64),
                Some(&tarball()),
                &BootkitConfig::default(),
            )
            .unwrap();
            assert!(plan.steps.windows(2).all(|w| w[0].stage <= w[1].stage));
            assert_eq!(plan.steps_in(Stage::Ready).count(), 0);
        }
    }

    #[test]
    fn test_no_source_step_without_tarball() {
        let plan = Plan::build(
            Platform::new(Os::Linux, Cpu::X64),
            Platform::new(Os::Linux, Cpu::X64),
            None,
            &BootkitConfig::default(),
        )
        .unwrap();
        assert_eq!(plan.steps_in(Stage::SourceAcquired).count(), 0);
        assert_eq!(plan.steps[0].action, Action::Script(ScriptKind::ClangUpdate));
    }

    #[test]
    fn test_step_display() {
        let plan = Plan::build(
            Platform::new(Os::Mac, Cpu::Arm64),
            Platform::new(Os::Mac, Cpu::Arm64),
            Some(&tarball()),
            &BootkitConfig::default(),
        )
        .unwrap();
        let lines: Vec<String> = plan.steps.iter().map(ToString::to_string).collect();
        assert_eq!(
            lines[0],
            "extract https://example.com/dl/1.0/chromium-1.0.tar.xz and move chromium-1.0 to the source directory"
        );
        assert!(lines.contains(
            &"fetch tools/clang/dsymutil/bin/dsymutil.arm64.sha1 from chromium-browser-clang -> tools/clang/dsymutil/bin/dsymutil"
                .to_string()
        ));
        assert!(lines.iter().any(|l| l.ends_with(
            "(if third_party/devtools-frontend/src/third_party/esbuild exists)"
        )));
    }

    #[test]
    fn test_plan_serializes_with_tags() {
        let plan = Plan::build(
            Platform::new(Os::Linux, Cpu::X64),
            Platform::new(Os::Linux, Cpu::Arm),
            None,
            &BootkitConfig::default(),
        )
        .unwrap();
        let json = serde_json::to_value(&plan).unwrap();
        let last = json["steps"].as_array().unwrap().last().unwrap().clone();
        assert_eq!(last["stage"], "platform_extras_fetched");
        assert_eq!(last["action"], "script");
        assert_eq!(last["script"], "install_sysroot");
        assert_eq!(last["cpu"], "arm");

        let steps = json["steps"].as_array().unwrap();
        assert!(steps.iter().all(|step| step["action"].is_string()));
        let ninja = steps
            .iter()
            .find(|step| step["root"] == "third_party/ninja")
            .unwrap();
        assert_eq!(ninja["action"], "fetch");
        assert_eq!(ninja["fetch"], "package");
        assert_eq!(ninja["version"]["manifest"], "DEPS");
        let node = steps.iter().find(|step| step["action"] == "nodejs").unwrap();
        assert_eq!(node.as_object().unwrap().len(), 2);
    }
}
