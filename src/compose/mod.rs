//! Docker Compose backed service lifecycle.
//!
//! [`ComposeGate`] implements [`ServiceLifecycleGate`] for an install whose
//! services are described by docker-compose files in its directory.

pub mod client;
pub mod error;

pub use client::{ComposeClient, ComposeCommand};
pub use error::ComposeError;

use crate::error::{Error, LifecycleAction, Result};
use crate::migration::ServiceLifecycleGate;
use async_trait::async_trait;

pub struct ComposeGate {
    client: ComposeClient,
}

impl ComposeGate {
    pub fn new(client: ComposeClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ComposeClient {
        &self.client
    }
}

fn lifecycle(action: LifecycleAction) -> impl FnOnce(ComposeError) -> Error {
    move |e| Error::lifecycle(action, e.to_string())
}

#[async_trait]
impl ServiceLifecycleGate for ComposeGate {
    async fn stop(&self) -> Result<()> {
        self.client
            .down()
            .await
            .map_err(lifecycle(LifecycleAction::Stop))
    }

    async fn start(&self) -> Result<()> {
        self.client
            .up_detached()
            .await
            .map_err(lifecycle(LifecycleAction::Start))
    }

    async fn pull(&self) -> Result<()> {
        self.client
            .pull()
            .await
            .map_err(lifecycle(LifecycleAction::Pull))
    }

    async fn prune(&self) -> Result<()> {
        self.client
            .prune()
            .await
            .map_err(lifecycle(LifecycleAction::Prune))
    }
}
