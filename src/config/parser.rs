use super::CtlConfig;
use crate::error::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_NAMES: [&str; 2] = ["brewctl.yaml", "brewctl.yml"];

pub struct Parser;

impl Parser {
    pub fn new() -> Self {
        Self
    }

    /// Find a config file in `dir` or any of its parents.
    pub fn find_config_in_dir(dir: &Path) -> Option<PathBuf> {
        for name in CONFIG_NAMES {
            let path = dir.join(name);
            if path.exists() {
                return Some(path);
            }
        }
        dir.parent().and_then(Self::find_config_in_dir)
    }

    /// Load config from an explicit path. The file must exist.
    pub fn load_config<P: AsRef<Path>>(&self, path: P) -> Result<CtlConfig> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::Config(format!(
                "Failed to read config file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;

        self.parse_config(&content)
    }

    /// Load the config for an install directory, falling back to defaults
    /// when no config file exists.
    pub fn load_for_install(&self, install_dir: &Path) -> Result<CtlConfig> {
        match Self::find_config_in_dir(install_dir) {
            Some(path) => {
                tracing::debug!("Loading config from {}", path.display());
                self.load_config(path)
            }
            None => {
                tracing::debug!("No brewctl.yaml found, using defaults");
                Ok(CtlConfig::default())
            }
        }
    }

    /// Parse config from YAML string
    pub fn parse_config(&self, content: &str) -> Result<CtlConfig> {
        // An empty file is a valid "all defaults" config.
        if content.trim().is_empty() {
            return Ok(CtlConfig::default());
        }
        let config: CtlConfig = serde_yaml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse YAML config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}
