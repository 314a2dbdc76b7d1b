//! Migration steps and the phases they run in.

use crate::error::Result;
use crate::version::VersionToken;
use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Point in the stop/start lifecycle at which a step runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    /// Runs while all services are stopped. Version gated.
    PreStop,
    /// Runs after services are started again. Version gated.
    PostStart,
    /// Runs after services are started, on every migration.
    Unconditional,
}

impl Phase {
    /// Whether steps in this phase are filtered by their threshold.
    pub fn is_version_gated(&self) -> bool {
        !matches!(self, Phase::Unconditional)
    }

    /// Where in the stop/start lifecycle the phase executes. Unconditional
    /// steps run once services are up, after the gated post-start steps.
    pub fn stage(&self) -> &'static str {
        match self {
            Phase::PreStop => "pre-stop",
            Phase::PostStart => "post-start",
            Phase::Unconditional => "post-start (unconditional)",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::PreStop => "pre-stop",
            Phase::PostStart => "post-start",
            Phase::Unconditional => "unconditional",
        };
        f.write_str(name)
    }
}

/// Side-effecting work performed by a [`MigrationStep`].
///
/// Implementations must be idempotent. A run that fails before the version
/// commit is retried from the same previous version, so every step that
/// already succeeded will execute again over its own output.
#[async_trait]
pub trait StepAction: Send + Sync {
    async fn run(&self) -> Result<()>;
}

/// Adapter turning an async closure into a [`StepAction`].
struct FnAction<F> {
    f: F,
}

#[async_trait]
impl<F> StepAction for FnAction<F>
where
    F: Fn() -> BoxFuture<'static, Result<()>> + Send + Sync,
{
    async fn run(&self) -> Result<()> {
        (self.f)().await
    }
}

/// A named, version-gated unit of upgrade work.
#[derive(Clone)]
pub struct MigrationStep {
    id: String,
    threshold: VersionToken,
    phase: Phase,
    action: Arc<dyn StepAction>,
}

impl MigrationStep {
    pub fn new(
        id: impl Into<String>,
        threshold: VersionToken,
        phase: Phase,
        action: impl StepAction + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            threshold,
            phase,
            action: Arc::new(action),
        }
    }

    /// Build a step from an async closure.
    ///
    /// ```
    /// use brewctl::migration::{MigrationStep, Phase};
    /// use brewctl::VersionToken;
    ///
    /// let step = MigrationStep::from_fn("noop", VersionToken::new(0, 2, 0), Phase::PreStop, || async {
    ///     Ok(())
    /// });
    /// assert_eq!(step.id(), "noop");
    /// ```
    pub fn from_fn<F, Fut>(
        id: impl Into<String>,
        threshold: VersionToken,
        phase: Phase,
        f: F,
    ) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let boxed = move || -> BoxFuture<'static, Result<()>> { Box::pin(f()) };
        Self::new(id, threshold, phase, FnAction { f: boxed })
    }

    /// Step that runs on every migration, after services start.
    pub fn unconditional(id: impl Into<String>, action: impl StepAction + 'static) -> Self {
        Self::new(id, VersionToken::UNSET, Phase::Unconditional, action)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Minimum new version that requires this step. Ignored for
    /// [`Phase::Unconditional`].
    pub fn threshold(&self) -> VersionToken {
        self.threshold
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Whether upgrading from `since` needs this step.
    pub fn applies_since(&self, since: &VersionToken) -> bool {
        !self.phase.is_version_gated() || *since < self.threshold
    }

    pub async fn execute(&self) -> Result<()> {
        self.action.run().await
    }
}

impl fmt::Debug for MigrationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationStep")
            .field("id", &self.id)
            .field("threshold", &self.threshold)
            .field("phase", &self.phase)
            .finish_non_exhaustive()
    }
}
