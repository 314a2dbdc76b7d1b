//! Version store backed by the install's `.env` file.

use crate::config::EnvFile;
use crate::error::Result;
use crate::migration::PersistedVersionStore;
use crate::version::VersionToken;

/// Keeps the configuration version as a single `KEY=x.y.z` line.
#[derive(Debug, Clone)]
pub struct EnvVersionStore {
    env: EnvFile,
    key: String,
}

impl EnvVersionStore {
    pub fn new(env: EnvFile, key: impl Into<String>) -> Self {
        Self {
            env,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl PersistedVersionStore for EnvVersionStore {
    fn read(&self) -> Result<String> {
        let value = self.env.get(&self.key)?;
        Ok(value
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| VersionToken::UNSET.to_string()))
    }

    fn write(&self, version: &VersionToken) -> Result<()> {
        tracing::debug!("Storing {}={}", self.key, version);
        self.env.set(&self.key, &version.to_string())
    }
}
