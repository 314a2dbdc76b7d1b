//! Built-in migration steps and the default registry.
//!
//! | id                         | phase         | threshold |
//! |----------------------------|---------------|-----------|
//! | `reset-history`            | pre-stop      | 0.2.0     |
//! | `split-config`             | pre-stop      | 0.3.0     |
//! | `prepare-datastore`        | pre-stop      | 0.6.0     |
//! | `automation-ui`            | pre-stop      | target    |
//! | `env-defaults`             | pre-stop      | target    |
//! | `archive-legacy-datastore` | post-start    | 0.6.0     |
//! | `configure-history`        | unconditional | -         |
//!
//! Steps gated at the target version run on every migration that moves the
//! stored version forward, while services are stopped.
//!
//! Every step checks the current state of the install before changing it,
//! so running it again over its own output does nothing.

mod compose_file;
mod data_dirs;
mod env_defaults;
mod history;

pub use compose_file::{
    AutomationUi, PrepareDatastore, SplitConfig, COMPOSE_FILE, SHARED_COMPOSE_FILE,
    SYSTEM_SERVICES,
};
pub use data_dirs::{ArchiveLegacyDatastore, ResetHistory};
pub use env_defaults::EnvDefaults;
pub use history::ConfigureHistory;

use crate::config::{CtlConfig, EnvFile};
use crate::error::Result;
use crate::migration::{HttpWaiter, MigrationStep, Phase, StepRegistry};
use crate::version::VersionToken;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Everything a built-in step needs to touch the install.
pub struct StepContext {
    work_dir: PathBuf,
    config: CtlConfig,
    env: EnvFile,
    waiter: Arc<dyn HttpWaiter>,
}

impl StepContext {
    pub fn new(work_dir: impl Into<PathBuf>, config: CtlConfig, waiter: Arc<dyn HttpWaiter>) -> Self {
        let work_dir = work_dir.into();
        let env = EnvFile::new(work_dir.join(&config.env_file));
        Self {
            work_dir,
            config,
            env,
            waiter,
        }
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Path inside the install directory.
    pub fn path(&self, relative: &str) -> PathBuf {
        self.work_dir.join(relative)
    }

    pub fn config(&self) -> &CtlConfig {
        &self.config
    }

    pub fn env(&self) -> &EnvFile {
        &self.env
    }

    pub fn waiter(&self) -> &dyn HttpWaiter {
        self.waiter.as_ref()
    }

    /// URL of a proxied service, honouring the HTTPS port from the env file.
    pub fn service_url(&self, path: &str) -> Result<String> {
        let port = self.env.get(&self.config.https_port_key)?;
        Ok(self.config.service_url(path, port.as_deref()))
    }
}

/// Registry holding every built-in step, in execution order.
pub fn default_registry(ctx: Arc<StepContext>) -> Result<StepRegistry> {
    let mut registry = StepRegistry::new();
    registry.register(MigrationStep::new(
        "reset-history",
        VersionToken::new(0, 2, 0),
        Phase::PreStop,
        ResetHistory::new(ctx.clone()),
    ))?;
    registry.register(MigrationStep::new(
        "split-config",
        VersionToken::new(0, 3, 0),
        Phase::PreStop,
        SplitConfig::new(ctx.clone()),
    ))?;
    registry.register(MigrationStep::new(
        "prepare-datastore",
        VersionToken::new(0, 6, 0),
        Phase::PreStop,
        PrepareDatastore::new(ctx.clone()),
    ))?;
    let target = ctx.config().target_version;
    registry.register(MigrationStep::new(
        "automation-ui",
        target,
        Phase::PreStop,
        AutomationUi::new(ctx.clone()),
    ))?;
    registry.register(MigrationStep::new(
        "env-defaults",
        target,
        Phase::PreStop,
        EnvDefaults::new(ctx.clone()),
    ))?;
    registry.register(MigrationStep::new(
        "archive-legacy-datastore",
        VersionToken::new(0, 6, 0),
        Phase::PostStart,
        ArchiveLegacyDatastore::new(ctx.clone()),
    ))?;
    registry.register(MigrationStep::unconditional(
        "configure-history",
        ConfigureHistory::new(ctx),
    ))?;
    Ok(registry)
}
