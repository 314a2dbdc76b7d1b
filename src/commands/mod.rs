mod migrate;
mod status;

pub use migrate::{run_migrate, MigrateArgs};
pub use status::run_status;

use brewctl::compose::{ComposeClient, ComposeGate};
use brewctl::config::EnvFile;
use brewctl::healthcheck::RetryingWaiter;
use brewctl::migration::{ConfirmationPrompt, MigrationEngine, MigrationPlan};
use brewctl::steps::{self, StepContext};
use brewctl::{CtlConfig, EnvVersionStore, Parser as ConfigParser};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::output::UserOutput;

/// An install directory with its loaded config.
pub struct Install {
    work_dir: PathBuf,
    config: CtlConfig,
}

impl Install {
    /// Resolve the install directory and load its config.
    pub fn load(dir: Option<PathBuf>, config_path: Option<PathBuf>) -> anyhow::Result<Self> {
        let work_dir = match dir {
            Some(dir) => dir,
            None => std::env::current_dir()?,
        };
        let parser = ConfigParser::new();
        let config = match config_path {
            Some(path) => parser.load_config(path)?,
            None => parser.load_for_install(&work_dir)?,
        };
        tracing::debug!(
            "Install at {} targets {}",
            work_dir.display(),
            config.target_version
        );
        Ok(Self { work_dir, config })
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn config(&self) -> &CtlConfig {
        &self.config
    }

    pub fn store(&self) -> EnvVersionStore {
        EnvVersionStore::new(
            EnvFile::new(self.work_dir.join(&self.config.env_file)),
            self.config.version_key.clone(),
        )
    }

    /// Wire the engine with the production collaborators.
    pub fn engine(&self, prompt: Arc<dyn ConfirmationPrompt>) -> anyhow::Result<MigrationEngine> {
        let waiter = Arc::new(RetryingWaiter::new(self.config.wait_interval()));
        let ctx = Arc::new(StepContext::new(
            &self.work_dir,
            self.config.clone(),
            waiter,
        ));
        let client = ComposeClient::new(
            &self.work_dir,
            self.config.use_sudo,
            self.config.compose_timeout(),
        );

        let engine = MigrationEngine::builder()
            .registry(Arc::new(steps::default_registry(ctx)?))
            .gate(Arc::new(ComposeGate::new(client)))
            .store(Arc::new(self.store()))
            .prompt(prompt)
            .target(self.config.target_version)
            .build()?;
        Ok(engine)
    }
}

/// Print a plan as a phase-by-phase step list.
pub fn print_plan(plan: &MigrationPlan, out: &dyn UserOutput) {
    if plan.downgrade {
        out.warning(&format!(
            "Stored version {} is newer than the target {}",
            plan.from, plan.to
        ));
    }
    out.status(&format!("Migration {} -> {}", plan.from, plan.to));
    out.status(&format!("{:-<50}", ""));
    out.status("  stop services");
    for step in &plan.pre_stop {
        out.status(&format!("  {:<30} {}", step.id, threshold_label(step)));
    }
    out.status("  pull images");
    out.status("  start services");
    for step in &plan.post_start {
        out.status(&format!("  {:<30} {}", step.id, threshold_label(step)));
    }
    out.status(&format!("  store version {}", plan.to));
}

fn threshold_label(step: &brewctl::migration::PlannedStep) -> String {
    match step.threshold {
        Some(threshold) => format!("({}, < {})", step.phase, threshold),
        None => format!("({})", step.phase),
    }
}

/// Print an error with its hint, the same way `main` does.
pub fn report_error(err: &brewctl::Error, out: &dyn UserOutput) {
    out.error(&format!("Error: {}", err));
    if let Some(suggestion) = err.suggestion() {
        out.blank();
        out.status(&format!("Hint: {}", suggestion));
    }
}
