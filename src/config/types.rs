//! Core configuration types.
//!
//! [`CtlConfig`] replaces the module-level constants of a typical ops script
//! (release version, URLs, env keys). Every field has a default, so an install
//! without `brewctl.yaml` behaves like one with an empty file.

use super::parse_duration_string;
use crate::error::{Error, Result};
use crate::version::{VersionToken, CURRENT_VERSION};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

pub const DEFAULT_VERSION_KEY: &str = "BREWBLOX_CFG_VERSION";
pub const DEFAULT_HTTPS_PORT_KEY: &str = "BREWBLOX_PORT_HTTPS";

const DEFAULT_COMPOSE_TIMEOUT: Duration = Duration::from_secs(600);
const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(120);
const DEFAULT_WAIT_INTERVAL: Duration = Duration::from_secs(1);

/// Root configuration structure for brewctl.yaml
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CtlConfig {
    /// Version the migration brings the install to.
    pub target_version: VersionToken,

    /// Environment file holding the stored version, relative to the install dir.
    pub env_file: String,

    /// Key of the stored version in `env_file`.
    pub version_key: String,

    /// Base URL of the install's reverse proxy.
    pub host: String,

    /// Key in `env_file` holding the HTTPS port, if not the default.
    pub https_port_key: String,

    pub history_path: String,

    pub datastore_path: String,

    /// CouchDB serving a pre-0.6.0 `couchdb/` data dir during its migration.
    pub legacy_datastore: LegacyDatastoreConfig,

    /// Prefix docker commands with sudo.
    pub use_sudo: bool,

    /// Timeout for a single docker / compose command, e.g. "10m".
    pub compose_timeout: Option<String>,

    pub wait: WaitConfig,

    /// Keys added to `env_file` when missing, with their default values.
    pub env_defaults: BTreeMap<String, String>,
}

/// How long steps wait for a dependent service to become reachable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WaitConfig {
    pub timeout: Option<String>,
    pub interval: Option<String>,
}

/// Temporary CouchDB that documents are read from when the datastore moves.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LegacyDatastoreConfig {
    /// Where the CouchDB answers.
    pub url: String,

    /// Name of the throwaway container serving `couchdb/`. When unset, no
    /// container is started and a CouchDB must already answer at `url`.
    pub container: Option<String>,

    pub image: String,
}

impl Default for LegacyDatastoreConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:5984".to_string(),
            container: Some("couchdb-migrate".to_string()),
            image: "treehouses/couchdb:2.3.1".to_string(),
        }
    }
}

impl Default for CtlConfig {
    fn default() -> Self {
        Self {
            target_version: CURRENT_VERSION,
            env_file: ".env".to_string(),
            version_key: DEFAULT_VERSION_KEY.to_string(),
            host: "https://localhost".to_string(),
            https_port_key: DEFAULT_HTTPS_PORT_KEY.to_string(),
            history_path: "/history/history".to_string(),
            datastore_path: "/history/datastore".to_string(),
            legacy_datastore: LegacyDatastoreConfig::default(),
            use_sudo: false,
            compose_timeout: None,
            wait: WaitConfig::default(),
            env_defaults: default_env_values(),
        }
    }
}

fn default_env_values() -> BTreeMap<String, String> {
    [
        ("BREWBLOX_RELEASE", "stable"),
        ("BREWBLOX_PORT_HTTP", "80"),
        (DEFAULT_HTTPS_PORT_KEY, "443"),
        ("BREWBLOX_PORT_MDNS", "5000"),
        ("COMPOSE_FILE", "docker-compose.shared.yml:docker-compose.yml"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

impl CtlConfig {
    pub fn compose_timeout(&self) -> Duration {
        self.compose_timeout
            .as_deref()
            .and_then(parse_duration_string)
            .unwrap_or(DEFAULT_COMPOSE_TIMEOUT)
    }

    pub fn wait_timeout(&self) -> Duration {
        self.wait
            .timeout
            .as_deref()
            .and_then(parse_duration_string)
            .unwrap_or(DEFAULT_WAIT_TIMEOUT)
    }

    pub fn wait_interval(&self) -> Duration {
        self.wait
            .interval
            .as_deref()
            .and_then(parse_duration_string)
            .unwrap_or(DEFAULT_WAIT_INTERVAL)
    }

    /// URL of a service behind the proxy. The port is omitted when not set.
    pub fn service_url(&self, path: &str, https_port: Option<&str>) -> String {
        let host = self.host.trim_end_matches('/');
        match https_port.map(str::trim).filter(|p| !p.is_empty()) {
            Some(port) => format!("{}:{}{}", host, port, path),
            None => format!("{}{}", host, path),
        }
    }

    /// Reject values that would only fail later, mid-migration.
    pub fn validate(&self) -> Result<()> {
        if self.env_file.trim().is_empty() {
            return Err(Error::Config("env_file must not be empty".to_string()));
        }
        if self.version_key.trim().is_empty() {
            return Err(Error::Config("version_key must not be empty".to_string()));
        }
        if self.target_version.is_unset() {
            return Err(Error::Config(
                "target_version must not be 0.0.0".to_string(),
            ));
        }
        crate::healthcheck::http::validate_url(&self.host)?;
        crate::healthcheck::http::validate_url(&self.legacy_datastore.url)?;

        let durations = [
            ("compose_timeout", self.compose_timeout.as_deref()),
            ("wait.timeout", self.wait.timeout.as_deref()),
            ("wait.interval", self.wait.interval.as_deref()),
        ];
        for (name, value) in durations {
            if let Some(raw) = value {
                if parse_duration_string(raw).is_none() {
                    return Err(Error::Config(format!(
                        "Invalid duration for {}: '{}' (expected e.g. \"500ms\", \"30s\", \"5m\")",
                        name, raw
                    )));
                }
            }
        }
        Ok(())
    }
}
