//! Stage-by-stage plan execution.

use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{Instrument, debug, info, info_span};

use bootkit_core::{
    ArchiveRequest, ArchiveSource, BootkitConfig, CommandRunner, EnvironmentOverlay, Error,
    FetchContext, FetchRequest, Layout, Os, PackageRequest, Platform, Result,
};
use bootkit_deps::PinReader;
use bootkit_tools_archive::ArchiveFetcher;
use bootkit_tools_cipd::PackageInstaller;
use bootkit_tools_gcs::BlobFetcher;

use crate::dispatch::{Dispatcher, FetchOutcome};
use crate::node::{NodeStrategy, node_requests};
use crate::plan::{Action, DeferredFetch, PinRef, Plan, Step};
use crate::script::ScriptKind;
use crate::stage::Stage;
use crate::stamps::{StampStore, file_digest};

/// What happened to a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    /// The step ran and succeeded.
    Executed,
    /// The step would run (preview only).
    Pending,
    /// The step was skipped because its result is already in place.
    AlreadySatisfied,
    /// The step's condition does not hold for this tree.
    NotApplicable,
}

/// One line of a [`ProvisionReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepReport {
    pub stage: Stage,
    pub description: String,
    pub outcome: StepOutcome,
}

/// Summary of a run or preview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProvisionReport {
    pub host: Platform,
    pub target: Platform,
    pub steps: Vec<StepReport>,
}

impl ProvisionReport {
    fn new(plan: &Plan) -> Self {
        Self {
            host: plan.host,
            target: plan.target,
            steps: Vec::with_capacity(plan.steps.len()),
        }
    }

    fn push(&mut self, step: &Step, outcome: StepOutcome) {
        self.steps.push(StepReport {
            stage: step.stage,
            description: step.to_string(),
            outcome,
        });
    }

    /// Number of steps with `outcome`.
    #[must_use]
    pub fn count(&self, outcome: StepOutcome) -> usize {
        self.steps.iter().filter(|s| s.outcome == outcome).count()
    }
}

/// Drives a [`Plan`] to completion.
pub struct Orchestrator {
    layout: Layout,
    config: BootkitConfig,
    env: EnvironmentOverlay,
    runner: Arc<dyn CommandRunner>,
    dispatcher: Dispatcher,
    pins: PinReader,
    force: bool,
}

impl Orchestrator {
    /// Create an orchestrator whose fetchers all share `runner`.
    #[must_use]
    pub fn new(
        layout: Layout,
        config: BootkitConfig,
        env: EnvironmentOverlay,
        host_os: Os,
        runner: Arc<dyn CommandRunner>,
        archive: ArchiveFetcher,
    ) -> Self {
        let dispatcher = Dispatcher::new(
            archive,
            PackageInstaller::new(Arc::clone(&runner), host_os),
            BlobFetcher::new(Arc::clone(&runner), &config.python),
        );
        let pins = PinReader::new(Arc::clone(&runner), &config.python);
        Self {
            layout,
            config,
            env,
            runner,
            dispatcher,
            pins,
            force: false,
        }
    }

    /// Ignore stamps and re-run every script, blob and node step.
    #[must_use]
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Execute `plan` stage by stage, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// Returns the first step's failure unchanged; later steps are not
    /// attempted. A [`Error::DestinationConflict`] is raised when the tarball's
    /// directory already exists next to a missing source directory.
    pub async fn run(&self, plan: &Plan) -> Result<ProvisionReport> {
        info!(host = %plan.host, target = %plan.target, steps = plan.steps.len(), "Provisioning");
        let mut report = ProvisionReport::new(plan);
        let mut stamps: Option<StampStore> = None;

        for stage in Stage::ALL {
            let span = info_span!("stage", stage = %stage);
            async {
                debug!("Entering stage");
                for step in plan.steps_in(stage) {
                    let outcome = self.run_step(plan, step, &mut stamps).await?;
                    report.push(step, outcome);
                }
                Ok::<(), Error>(())
            }
            .instrument(span)
            .await?;
        }

        info!(
            executed = report.count(StepOutcome::Executed),
            satisfied = report.count(StepOutcome::AlreadySatisfied),
            "Provisioning complete"
        );
        Ok(report)
    }

    /// Report what [`Orchestrator::run`] would do without doing it.
    ///
    /// # Errors
    ///
    /// Returns an error if the stamp store exists but cannot be read.
    pub fn preview(&self, plan: &Plan) -> Result<ProvisionReport> {
        let src = &self.layout.src;
        let stamps = if src.is_dir() {
            Some(StampStore::open(src)?)
        } else {
            None
        };

        let mut report = ProvisionReport::new(plan);
        for step in &plan.steps {
            let not_applicable = src.is_dir()
                && step
                    .condition
                    .as_ref()
                    .is_some_and(|condition| !condition.holds(src));
            let outcome = if not_applicable {
                StepOutcome::NotApplicable
            } else if step.is_satisfied(src, stamps.as_ref(), self.force)? {
                StepOutcome::AlreadySatisfied
            } else {
                StepOutcome::Pending
            };
            report.push(step, outcome);
        }
        Ok(report)
    }

    async fn run_step(
        &self,
        plan: &Plan,
        step: &Step,
        stamps: &mut Option<StampStore>,
    ) -> Result<StepOutcome> {
        if let Action::Fetch(DeferredFetch::Source {
            source,
            implied_dir,
        }) = &step.action
        {
            if step.is_satisfied(&self.layout.src, None, self.force)? {
                info!(src = %self.layout.src.display(), "Source directory present");
                return Ok(StepOutcome::AlreadySatisfied);
            }
            self.acquire_source(source, implied_dir).await?;
            return Ok(StepOutcome::Executed);
        }

        let store = self.stamp_store(stamps)?;

        if let Some(condition) = &step.condition
            && !condition.holds(&self.layout.src)
        {
            info!(step = %step, "Condition not met, skipping");
            return Ok(StepOutcome::NotApplicable);
        }

        if step.is_satisfied(&self.layout.src, Some(&*store), self.force)? {
            info!(step = %step, "Already satisfied");
            return Ok(StepOutcome::AlreadySatisfied);
        }

        info!(step = %step, "Running");
        self.execute(plan, step, store).await?;

        if step.records_stamp() {
            store.record(
                StampStore::stamp_key(step, &self.layout.src)?,
                step.to_string(),
            )?;
        }
        Ok(StepOutcome::Executed)
    }

    fn stamp_store<'a>(&self, slot: &'a mut Option<StampStore>) -> Result<&'a mut StampStore> {
        if slot.is_none() {
            if !self.layout.src.is_dir() {
                return Err(Error::configuration_with_help(
                    format!(
                        "Source directory {} does not exist",
                        self.layout.src.display()
                    ),
                    "Pass --revision or --tarball-url to download the source tree",
                ));
            }
            *slot = Some(StampStore::open(&self.layout.src)?);
        }
        slot.as_mut()
            .ok_or_else(|| Error::configuration("Stamp store unavailable"))
    }

    fn src_context(&self) -> FetchContext<'_> {
        FetchContext {
            env: &self.env,
            work_dir: &self.layout.src,
        }
    }

    async fn execute(&self, plan: &Plan, step: &Step, store: &mut StampStore) -> Result<()> {
        let ctx = self.src_context();
        match &step.action {
            Action::Fetch(DeferredFetch::Package {
                root,
                package,
                version,
            }) => {
                let version = self.resolve_version(version, store).await?;
                let request = FetchRequest::Package(PackageRequest {
                    root: root.clone(),
                    package: package.clone(),
                    version,
                });
                self.dispatcher.dispatch(&request, ctx).await?;
            }
            Action::Fetch(DeferredFetch::Blob(request)) => {
                self.dispatcher
                    .dispatch(&FetchRequest::Blob(request.clone()), ctx)
                    .await?;
            }
            Action::Fetch(DeferredFetch::Source { .. }) => {
                return Err(Error::configuration(
                    "The source step can only run in the source stage",
                ));
            }
            Action::Script(kind) => self.run_script(*kind).await?,
            Action::Nodejs => {
                let strategy = NodeStrategy::detect(&self.layout.src);
                debug!(%strategy, "Selected node.js strategy");
                let requests =
                    node_requests(strategy, plan.host, &self.config, &self.pins, ctx).await?;
                for request in requests {
                    self.dispatcher
                        .dispatch(&FetchRequest::Blob(request), ctx)
                        .await?;
                }
            }
        }
        Ok(())
    }

    async fn resolve_version(&self, pin: &PinRef, store: &mut StampStore) -> Result<String> {
        let cache_key = pin.to_string();
        let digest = file_digest(&self.layout.src.join(&pin.manifest)).ok();

        if !self.force
            && let Some(digest) = &digest
            && let Some(value) = store.cached_pin(&cache_key, digest)
        {
            debug!(pin = %cache_key, %value, "Using cached pin");
            return Ok(value.to_string());
        }

        let version = self
            .pins
            .read_pin(&pin.manifest, &pin.key, self.src_context())
            .await?
            .into_version(&pin.key)?;
        if let Some(digest) = digest {
            store.record_pin(cache_key, digest, version.clone())?;
        }
        Ok(version)
    }

    async fn run_script(&self, kind: ScriptKind) -> Result<()> {
        let invocation = kind.invocation(&self.layout, &self.config);
        let output = self.runner.run(&invocation, &self.env).await?;
        if !output.succeeded() {
            return Err(Error::ScriptFailed {
                script: kind.script_path().to_string(),
                status: output.status_description(),
                output: output.transcript(),
            });
        }
        Ok(())
    }

    async fn acquire_source(&self, source: &ArchiveSource, implied_dir: &str) -> Result<()> {
        let root = &self.layout.root;
        let implied = root.join(implied_dir);
        if implied.exists() {
            return Err(Error::destination_conflict(&implied, &self.layout.src));
        }

        tokio::fs::create_dir_all(root)
            .await
            .map_err(|e| Error::io(e, Some(root), "create root directory"))?;

        let request = FetchRequest::Archive(ArchiveRequest {
            source: source.clone(),
            destination: root.clone(),
        });
        let ctx = FetchContext {
            env: &self.env,
            work_dir: root,
        };
        if let FetchOutcome::Extracted(summary) = self.dispatcher.dispatch(&request, ctx).await? {
            info!(
                extracted = summary.extracted,
                skipped = summary.skipped,
                "Source tarball extracted"
            );
        }

        if !implied.is_dir() {
            return Err(Error::archive(
                source.to_string(),
                format!("the archive did not contain {implied_dir}/"),
            ));
        }
        move_dir(&implied, &self.layout.src).await?;
        info!(src = %self.layout.src.display(), "Source tree in place");
        Ok(())
    }
}

async fn move_dir(from: &Path, to: &Path) -> Result<()> {
    if let Some(parent) = to.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| Error::io(e, Some(parent), "create source parent directory"))?;
    }
    tokio::fs::rename(from, to)
        .await
        .map_err(|e| Error::io(e, Some(from), format!("move to {}", to.display())))
}
