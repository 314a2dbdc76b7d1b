use super::StepContext;
use crate::config::env_file::write_atomic;
use crate::error::Result;
use crate::migration::StepAction;
use async_trait::async_trait;
use serde_yaml::{Mapping, Value};
use std::path::Path;
use std::sync::Arc;

/// User-editable compose file.
pub const COMPOSE_FILE: &str = "docker-compose.yml";

/// Compose file for services managed by the release itself.
pub const SHARED_COMPOSE_FILE: &str = "docker-compose.shared.yml";

/// Services that moved out of the user compose file.
pub const SYSTEM_SERVICES: [&str; 7] = [
    "mdns", "eventbus", "influx", "datastore", "history", "ui", "traefik",
];

const AUTOMATION_SERVICE: &str = "automation";
const AUTOMATION_UI_SERVICE: &str = "automation-ui";
const AUTOMATION_UI_IMAGE: &str = "brewblox/brewblox-automation-ui:${BREWBLOX_RELEASE}";

fn read_compose(path: &Path) -> Result<Option<Value>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)?;
    Ok(Some(serde_yaml::from_str(&content)?))
}

fn write_compose(path: &Path, config: &Value) -> Result<()> {
    write_atomic(path, &serde_yaml::to_string(config)?)?;
    Ok(())
}

fn services_mut(config: &mut Value) -> Option<&mut Mapping> {
    config.get_mut("services").and_then(Value::as_mapping_mut)
}

/// Moves system services from `docker-compose.yml` to
/// `docker-compose.shared.yml`.
///
/// An existing shared file is left untouched; the release owns its content.
pub struct SplitConfig {
    ctx: Arc<StepContext>,
}

impl SplitConfig {
    pub fn new(ctx: Arc<StepContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl StepAction for SplitConfig {
    async fn run(&self) -> Result<()> {
        let path = self.ctx.path(COMPOSE_FILE);
        let Some(mut config) = read_compose(&path)? else {
            tracing::info!("{} not found, nothing to split", COMPOSE_FILE);
            return Ok(());
        };

        let Some(services) = services_mut(&mut config) else {
            return Ok(());
        };

        let mut system = Mapping::new();
        for name in SYSTEM_SERVICES {
            if let Some(service) = services.remove(name) {
                system.insert(Value::from(name), service);
            }
        }

        if system.is_empty() {
            tracing::debug!("No system services left in {}", COMPOSE_FILE);
            return Ok(());
        }

        tracing::info!("Moving system services to {}", SHARED_COMPOSE_FILE);
        let shared_path = self.ctx.path(SHARED_COMPOSE_FILE);
        if !shared_path.exists() {
            let mut shared = Mapping::new();
            if let Some(version) = config.get("version") {
                shared.insert(Value::from("version"), version.clone());
            }
            shared.insert(Value::from("services"), Value::Mapping(system));
            write_compose(&shared_path, &Value::Mapping(shared))?;
        }
        write_compose(&path, &config)
    }
}

/// Drops `depends_on` from user services and creates the `redis/` data dir.
pub struct PrepareDatastore {
    ctx: Arc<StepContext>,
}

impl PrepareDatastore {
    pub fn new(ctx: Arc<StepContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl StepAction for PrepareDatastore {
    async fn run(&self) -> Result<()> {
        let path = self.ctx.path(COMPOSE_FILE);
        if let Some(mut config) = read_compose(&path)? {
            let mut changed = false;
            if let Some(services) = services_mut(&mut config) {
                for (_, service) in services.iter_mut() {
                    if let Some(fields) = service.as_mapping_mut() {
                        changed |= fields.remove("depends_on").is_some();
                    }
                }
            }
            if changed {
                tracing::info!("Removing depends_on fields from {}", COMPOSE_FILE);
                write_compose(&path, &config)?;
            }
        }

        let redis = self.ctx.path("redis");
        if !redis.exists() {
            tracing::info!("Creating {}", redis.display());
            std::fs::create_dir_all(&redis)?;
        }
        Ok(())
    }
}

/// Adds the `automation-ui` service next to a user-defined `automation`
/// service. The automation backend is unusable without its UI.
pub struct AutomationUi {
    ctx: Arc<StepContext>,
}

impl AutomationUi {
    pub fn new(ctx: Arc<StepContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl StepAction for AutomationUi {
    async fn run(&self) -> Result<()> {
        let path = self.ctx.path(COMPOSE_FILE);
        let Some(mut config) = read_compose(&path)? else {
            return Ok(());
        };
        let Some(services) = services_mut(&mut config) else {
            return Ok(());
        };
        if !services.contains_key(AUTOMATION_SERVICE) || services.contains_key(AUTOMATION_UI_SERVICE)
        {
            return Ok(());
        }

        let mut service = Mapping::new();
        service.insert(Value::from("image"), Value::from(AUTOMATION_UI_IMAGE));
        service.insert(Value::from("restart"), Value::from("unless-stopped"));
        services.insert(Value::from(AUTOMATION_UI_SERVICE), Value::Mapping(service));

        tracing::info!("Adding the {} service to {}", AUTOMATION_UI_SERVICE, COMPOSE_FILE);
        write_compose(&path, &config)
    }
}
