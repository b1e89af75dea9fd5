//! Provisioning plan and orchestrator for bootkit.
//!
//! [`Plan::build`] turns a host platform, a target platform and a source
//! tarball into an ordered list of [`Step`]s grouped by [`Stage`].
//! [`Orchestrator::run`] executes them sequentially, skipping what is already
//! in place and stopping at the first failure.
//!
//! ```text
//! SourceAcquired → ToolingBootstrapped → ToolchainsFetched
//!   → UtilityBinariesFetched → PlatformExtrasFetched → Ready
//! ```

mod dispatch;
mod node;
mod orchestrator;
mod plan;
mod script;
mod stage;
mod stamps;

pub use dispatch::{Dispatcher, FetchOutcome};
pub use node::{NODE_MARKER, NodeStrategy, node_requests};
pub use orchestrator::{Orchestrator, ProvisionReport, StepOutcome, StepReport};
pub use plan::{Action, Condition, DeferredFetch, PinRef, Plan, ROOT_MANIFEST, Step, implied_directory};
pub use script::ScriptKind;
pub use stage::Stage;
pub use stamps::{STAMP_FILE_NAME, StampRecord, StampStore};
