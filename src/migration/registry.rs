//! Declarative table of migration steps.

use super::{MigrationStep, Phase};
use crate::error::{Error, Result};
use crate::version::VersionToken;
use std::collections::HashSet;

/// Append-only registry of [`MigrationStep`]s.
///
/// Built once at startup and then shared read-only (typically behind an
/// `Arc`). Upgrades may skip several releases in one run, so
/// [`steps_for`](Self::steps_for) returns *every* pending step, never just the
/// delta to the previous release.
#[derive(Debug, Default)]
pub struct StepRegistry {
    // Registration order is preserved and used as the tie-break.
    steps: Vec<MigrationStep>,
    ids: HashSet<String>,
}

impl StepRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a step. Fails if a step with the same id is already registered.
    pub fn register(&mut self, step: MigrationStep) -> Result<()> {
        if !self.ids.insert(step.id().to_string()) {
            return Err(Error::DuplicateStepId(step.id().to_string()));
        }
        tracing::trace!(
            "Registered migration step '{}' ({} @ {})",
            step.id(),
            step.phase(),
            step.threshold()
        );
        self.steps.push(step);
        Ok(())
    }

    /// Chainable variant of [`register`](Self::register).
    pub fn with(mut self, step: MigrationStep) -> Result<Self> {
        self.register(step)?;
        Ok(self)
    }

    /// Steps in `phase` that an upgrade from `since` must run, in execution
    /// order.
    ///
    /// Version-gated phases return only steps with `threshold > since`,
    /// ascending by threshold with ties kept in registration order.
    /// [`Phase::Unconditional`] returns all of its steps in registration order.
    pub fn steps_for(&self, phase: Phase, since: &VersionToken) -> Vec<&MigrationStep> {
        let mut selected: Vec<&MigrationStep> = self
            .steps
            .iter()
            .filter(|step| step.phase() == phase && step.applies_since(since))
            .collect();

        if phase.is_version_gated() {
            // Stable sort keeps registration order for equal thresholds.
            selected.sort_by_key(|step| step.threshold());
        }
        selected
    }

    pub fn get(&self, id: &str) -> Option<&MigrationStep> {
        self.steps.iter().find(|step| step.id() == id)
    }

    /// All steps in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &MigrationStep> {
        self.steps.iter()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
