//! Version-gated migration engine.
//!
//! The engine owns the upgrade state machine:
//!
//! ```text
//! read stored version
//!   ├─ 0.0.0            -> NotYetInstalled
//!   ├─ == target        -> AlreadyCurrent (no side effects)
//!   ├─ >  target        -> ask operator, AbortedByUser if declined
//!   └─ <  target        -> stop -> pre-stop steps -> pull -> start
//!                            -> post-start steps -> unconditional steps
//!                            -> commit target version
//! ```
//!
//! The version write is the single commit point. Any failure before it leaves
//! the stored version untouched, so re-running the migration resumes from the
//! same starting point; steps are idempotent, which makes that safe. Nothing is
//! retried or rolled back automatically.

use super::gate::{ConfirmationPrompt, PersistedVersionStore, ServiceLifecycleGate};
use super::{MigrationStep, Phase, StepRegistry};
use crate::error::{Error, LifecycleAction, Result};
use crate::version::VersionToken;
use serde::Serialize;
use std::sync::Arc;

/// Switches for a single migration invocation.
#[derive(Debug, Clone, Default)]
pub struct MigrateOptions {
    /// Only pull and (re)start services. No steps run and the stored version
    /// is left as is.
    pub skip_migrate: bool,
    /// Do not pull images before starting services.
    pub skip_pull: bool,
    /// Prune unused images and volumes after a committed migration.
    pub prune: bool,
    /// Resolve and report the run without side effects.
    pub dry_run: bool,
}

/// Result of a successful [`MigrationEngine::run`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum MigrationOutcome {
    /// Stored version already equals the target. Nothing was touched.
    AlreadyCurrent { version: VersionToken },
    /// All steps succeeded and the target version was committed.
    Migrated {
        from: VersionToken,
        to: VersionToken,
        steps: Vec<String>,
    },
    /// Services were refreshed without migrating (`skip_migrate`).
    Refreshed { version: VersionToken },
    /// Nothing was executed; this is what a real run would do.
    DryRun(MigrationPlan),
}

/// A step as reported in a [`MigrationPlan`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedStep {
    pub id: String,
    pub phase: Phase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<VersionToken>,
}

impl From<&MigrationStep> for PlannedStep {
    fn from(step: &MigrationStep) -> Self {
        Self {
            id: step.id().to_string(),
            phase: step.phase(),
            threshold: step
                .phase()
                .is_version_gated()
                .then(|| step.threshold()),
        }
    }
}

/// Serializable view of a [`MigrationRun`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationPlan {
    pub from: VersionToken,
    pub to: VersionToken,
    pub downgrade: bool,
    pub pre_stop: Vec<PlannedStep>,
    pub post_start: Vec<PlannedStep>,
}

impl MigrationPlan {
    pub fn step_count(&self) -> usize {
        self.pre_stop.len() + self.post_start.len()
    }
}

/// Steps resolved for one invocation, borrowed from the registry.
#[derive(Debug)]
pub struct MigrationRun<'r> {
    previous: VersionToken,
    target: VersionToken,
    pre_stop: Vec<&'r MigrationStep>,
    post_start: Vec<&'r MigrationStep>,
    completed: bool,
}

impl<'r> MigrationRun<'r> {
    /// Resolve the steps needed to go from `previous` to `target`.
    ///
    /// Post-start holds the gated [`Phase::PostStart`] steps followed by every
    /// [`Phase::Unconditional`] step.
    pub fn resolve(registry: &'r StepRegistry, previous: VersionToken, target: VersionToken) -> Self {
        let pre_stop = registry.steps_for(Phase::PreStop, &previous);
        let mut post_start = registry.steps_for(Phase::PostStart, &previous);
        post_start.extend(registry.steps_for(Phase::Unconditional, &previous));

        Self {
            previous,
            target,
            pre_stop,
            post_start,
            completed: false,
        }
    }

    /// A run that touches no steps (refresh only).
    fn empty(previous: VersionToken, target: VersionToken) -> Self {
        Self {
            previous,
            target,
            pre_stop: Vec::new(),
            post_start: Vec::new(),
            completed: false,
        }
    }

    pub fn previous(&self) -> VersionToken {
        self.previous
    }

    pub fn target(&self) -> VersionToken {
        self.target
    }

    pub fn is_downgrade(&self) -> bool {
        self.previous > self.target
    }

    pub fn pre_stop(&self) -> &[&'r MigrationStep] {
        &self.pre_stop
    }

    pub fn post_start(&self) -> &[&'r MigrationStep] {
        &self.post_start
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn plan(&self) -> MigrationPlan {
        MigrationPlan {
            from: self.previous,
            to: self.target,
            downgrade: self.is_downgrade(),
            pre_stop: self.pre_stop.iter().map(|s| PlannedStep::from(*s)).collect(),
            post_start: self.post_start.iter().map(|s| PlannedStep::from(*s)).collect(),
        }
    }
}

/// Drives an install from its stored version to a target version.
pub struct MigrationEngine {
    registry: Arc<StepRegistry>,
    gate: Arc<dyn ServiceLifecycleGate>,
    store: Arc<dyn PersistedVersionStore>,
    prompt: Arc<dyn ConfirmationPrompt>,
    target: VersionToken,
}

impl MigrationEngine {
    pub fn builder() -> MigrationEngineBuilder {
        MigrationEngineBuilder::new()
    }

    /// Version this engine migrates to when no explicit target is given.
    pub fn target(&self) -> VersionToken {
        self.target
    }

    pub fn registry(&self) -> &StepRegistry {
        &self.registry
    }

    /// Migrate from the stored version (or `from_override`) to the configured
    /// target.
    pub async fn migrate(
        &self,
        from_override: Option<&str>,
        opts: &MigrateOptions,
    ) -> Result<MigrationOutcome> {
        let persisted = self.persisted_version(from_override)?;
        self.run(&persisted, self.target, opts).await
    }

    /// Resolve what [`migrate`](Self::migrate) would do, without prompting or
    /// side effects.
    pub fn plan(&self, from_override: Option<&str>) -> Result<MigrationPlan> {
        let persisted = self.persisted_version(from_override)?;
        let previous = Self::parse_installed(&persisted)?;
        Ok(MigrationRun::resolve(&self.registry, previous, self.target).plan())
    }

    /// Run the state machine from `persisted` to `target`.
    pub async fn run(
        &self,
        persisted: &str,
        target: VersionToken,
        opts: &MigrateOptions,
    ) -> Result<MigrationOutcome> {
        let previous = Self::parse_installed(persisted)?;

        if previous == target {
            tracing::info!("Configuration is already at version {}", target);
            return Ok(MigrationOutcome::AlreadyCurrent { version: target });
        }

        let mut run = if opts.skip_migrate {
            MigrationRun::empty(previous, target)
        } else {
            MigrationRun::resolve(&self.registry, previous, target)
        };

        if opts.dry_run {
            return Ok(MigrationOutcome::DryRun(run.plan()));
        }

        if run.is_downgrade() {
            tracing::warn!(
                "Stored version {} is newer than target {}",
                previous,
                target
            );
            let message = format!(
                "Your system is running version {}, which is newer than the selected release ({}). \
                 This may be due to switching release tracks. Do you want to continue?",
                previous, target
            );
            if !self.prompt.ask(&message)? {
                return Err(Error::AbortedByUser);
            }
        }

        if opts.skip_migrate {
            self.refresh(opts).await?;
            return Ok(MigrationOutcome::Refreshed { version: previous });
        }

        let steps = self.execute(&mut run, opts).await?;

        if opts.prune {
            // The version is already committed; a failed prune only wastes disk.
            if let Err(e) = self.gate.prune().await {
                tracing::warn!("Failed to prune unused images: {}", e);
            }
        }

        Ok(MigrationOutcome::Migrated {
            from: previous,
            to: target,
            steps,
        })
    }

    async fn execute(&self, run: &mut MigrationRun<'_>, opts: &MigrateOptions) -> Result<Vec<String>> {
        let mut executed = Vec::with_capacity(run.pre_stop.len() + run.post_start.len());

        tracing::info!(
            "Migrating configuration from {} to {}",
            run.previous,
            run.target
        );

        tracing::info!("Stopping services...");
        self.gate
            .stop()
            .await
            .map_err(|e| as_lifecycle(LifecycleAction::Stop, e))?;

        Self::execute_steps(&run.pre_stop, &mut executed).await?;

        if !opts.skip_pull {
            tracing::info!("Pulling service images...");
            self.gate
                .pull()
                .await
                .map_err(|e| as_lifecycle(LifecycleAction::Pull, e))?;
        }

        tracing::info!("Starting services...");
        self.gate
            .start()
            .await
            .map_err(|e| as_lifecycle(LifecycleAction::Start, e))?;

        Self::execute_steps(&run.post_start, &mut executed).await?;

        tracing::info!("Updating version number to {}", run.target);
        self.store.write(&run.target)?;
        run.completed = true;

        Ok(executed)
    }

    async fn execute_steps(steps: &[&MigrationStep], executed: &mut Vec<String>) -> Result<()> {
        for step in steps {
            tracing::info!("[{}] Running step '{}'", step.phase(), step.id());
            step.execute()
                .await
                .map_err(|e| Error::step(step.id(), step.phase(), e))?;
            executed.push(step.id().to_string());
        }
        Ok(())
    }

    async fn refresh(&self, opts: &MigrateOptions) -> Result<()> {
        if !opts.skip_pull {
            tracing::info!("Pulling service images...");
            self.gate
                .pull()
                .await
                .map_err(|e| as_lifecycle(LifecycleAction::Pull, e))?;
        }
        tracing::info!("Starting services...");
        self.gate
            .start()
            .await
            .map_err(|e| as_lifecycle(LifecycleAction::Start, e))
    }

    fn persisted_version(&self, from_override: Option<&str>) -> Result<String> {
        match from_override {
            Some(version) => {
                tracing::debug!("Using overridden starting version {}", version);
                Ok(version.to_string())
            }
            None => self.store.read(),
        }
    }

    fn parse_installed(persisted: &str) -> Result<VersionToken> {
        let previous = VersionToken::parse(persisted)?;
        if previous.is_unset() {
            return Err(Error::NotYetInstalled);
        }
        Ok(previous)
    }
}

fn as_lifecycle(action: LifecycleAction, err: Error) -> Error {
    match err {
        Error::Lifecycle { .. } => err,
        other => Error::lifecycle(action, other.to_string()),
    }
}

/// Builder for [`MigrationEngine`].
///
/// All collaborators are required; the target defaults to
/// [`CURRENT_VERSION`](crate::version::CURRENT_VERSION).
pub struct MigrationEngineBuilder {
    registry: Option<Arc<StepRegistry>>,
    gate: Option<Arc<dyn ServiceLifecycleGate>>,
    store: Option<Arc<dyn PersistedVersionStore>>,
    prompt: Option<Arc<dyn ConfirmationPrompt>>,
    target: VersionToken,
}

impl MigrationEngineBuilder {
    pub fn new() -> Self {
        Self {
            registry: None,
            gate: None,
            store: None,
            prompt: None,
            target: crate::version::CURRENT_VERSION,
        }
    }

    pub fn registry(mut self, registry: Arc<StepRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn gate(mut self, gate: Arc<dyn ServiceLifecycleGate>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn store(mut self, store: Arc<dyn PersistedVersionStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn prompt(mut self, prompt: Arc<dyn ConfirmationPrompt>) -> Self {
        self.prompt = Some(prompt);
        self
    }

    pub fn target(mut self, target: VersionToken) -> Self {
        self.target = target;
        self
    }

    pub fn build(self) -> Result<MigrationEngine> {
        let missing = |what: &str| Error::Config(format!("Migration engine requires a {}", what));
        Ok(MigrationEngine {
            registry: self.registry.ok_or_else(|| missing("step registry"))?,
            gate: self.gate.ok_or_else(|| missing("service lifecycle gate"))?,
            store: self.store.ok_or_else(|| missing("version store"))?,
            prompt: self.prompt.ok_or_else(|| missing("confirmation prompt"))?,
            target: self.target,
        })
    }
}

impl Default for MigrationEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
