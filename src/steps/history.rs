use super::StepContext;
use crate::error::Result;
use crate::healthcheck::http::shared_client;
use crate::migration::StepAction;
use async_trait::async_trait;
use std::sync::Arc;

/// Asks the history service to (re)create its retention policies.
pub struct ConfigureHistory {
    ctx: Arc<StepContext>,
}

impl ConfigureHistory {
    pub fn new(ctx: Arc<StepContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl StepAction for ConfigureHistory {
    async fn run(&self) -> Result<()> {
        let base = self.ctx.service_url(&self.ctx.config().history_path)?;
        self.ctx
            .waiter()
            .wait_ready(&format!("{}/ping", base), self.ctx.config().wait_timeout())
            .await?;

        let url = format!("{}/configure", base);
        tracing::info!("Configuring history at {}", url);
        shared_client()?
            .post(&url)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}
