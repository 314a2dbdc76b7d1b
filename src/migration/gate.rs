//! Capabilities the migration engine drives but does not implement.
//!
//! Production implementations live in [`crate::compose`], [`crate::store`],
//! [`crate::prompt`] and [`crate::healthcheck`]; tests substitute recording
//! fakes.

use crate::error::Result;
use crate::version::VersionToken;
use async_trait::async_trait;
use std::time::Duration;

/// Stops and starts every service of the install.
///
/// Each call is blocking and all-or-nothing from the engine's point of view:
/// partially stopped states are not modelled.
#[async_trait]
pub trait ServiceLifecycleGate: Send + Sync {
    async fn stop(&self) -> Result<()>;

    async fn start(&self) -> Result<()>;

    /// Fetch newer service images. Called between the pre-stop phase and
    /// [`start`](Self::start).
    async fn pull(&self) -> Result<()> {
        Ok(())
    }

    /// Remove unused images and volumes after a committed migration.
    async fn prune(&self) -> Result<()> {
        Ok(())
    }
}

/// Durable slot holding the install's configuration version.
pub trait PersistedVersionStore: Send + Sync {
    /// Raw stored value. Returns `"0.0.0"` when nothing was ever stored.
    fn read(&self) -> Result<String>;

    fn write(&self, version: &VersionToken) -> Result<()>;
}

/// Yes/no question to the operator.
pub trait ConfirmationPrompt: Send + Sync {
    fn ask(&self, message: &str) -> Result<bool>;
}

/// Blocks until an HTTP endpoint answers successfully or gives up.
///
/// Injected into step actions that depend on a running service; the engine
/// itself never calls it.
#[async_trait]
pub trait HttpWaiter: Send + Sync {
    async fn wait_ready(&self, url: &str, timeout: Duration) -> Result<()>;
}
