//! Version-gated configuration migrations.
//!
//! - `step` - [`MigrationStep`], [`Phase`] and the [`StepAction`] contract
//! - `registry` - [`StepRegistry`], the ordered step table
//! - `engine` - [`MigrationEngine`], the stop/migrate/start state machine
//! - `gate` - capabilities the engine consumes (services, version store, prompt, HTTP waits)

mod engine;
mod gate;
mod registry;
mod step;

pub use engine::{
    MigrateOptions, MigrationEngine, MigrationEngineBuilder, MigrationOutcome, MigrationPlan,
    MigrationRun, PlannedStep,
};
pub use gate::{ConfirmationPrompt, HttpWaiter, PersistedVersionStore, ServiceLifecycleGate};
pub use registry::StepRegistry;
pub use step::{MigrationStep, Phase, StepAction};
