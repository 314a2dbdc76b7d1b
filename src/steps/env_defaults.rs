use super::StepContext;
use crate::error::Result;
use crate::migration::StepAction;
use async_trait::async_trait;
use std::sync::Arc;

/// Adds keys from `env_defaults` that the env file does not define yet.
/// Existing values are never overwritten.
pub struct EnvDefaults {
    ctx: Arc<StepContext>,
}

impl EnvDefaults {
    pub fn new(ctx: Arc<StepContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl StepAction for EnvDefaults {
    async fn run(&self) -> Result<()> {
        let env = self.ctx.env();
        let current = env.read_all()?;
        let missing: Vec<(&str, &str)> = self
            .ctx
            .config()
            .env_defaults
            .iter()
            .filter(|(key, _)| !current.contains_key(key.as_str()))
            .map(|(key, value)| (key.as_str(), value.as_str()))
            .collect();

        if missing.is_empty() {
            return Ok(());
        }
        for (key, value) in &missing {
            tracing::info!("Setting {}={}", key, value);
        }
        env.set_many(&missing)
    }
}
