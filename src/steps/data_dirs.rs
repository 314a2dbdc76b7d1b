use super::StepContext;
use crate::compose::ComposeClient;
use crate::error::{Error, LifecycleAction, Result};
use crate::healthcheck::http::shared_client;
use crate::migration::StepAction;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use std::sync::Arc;

/// Deletes history data written by the old downsampling model.
pub struct ResetHistory {
    ctx: Arc<StepContext>,
}

impl ResetHistory {
    pub fn new(ctx: Arc<StepContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl StepAction for ResetHistory {
    async fn run(&self) -> Result<()> {
        let dir = self.ctx.path("influxdb");
        if dir.exists() {
            tracing::warn!(
                "History data at {} is incompatible with this release and will be deleted",
                dir.display()
            );
            std::fs::remove_dir_all(&dir)?;
        }
        Ok(())
    }
}

/// Databases whose document ids read `<namespace>__<id>`.
const NAMESPACED_DATABASES: [&str; 2] = ["brewblox-ui-store", "brewblox-automation"];

/// Database whose document ids are used as is, under its own namespace.
const SPARK_DATABASE: &str = "spark-service";

#[derive(Debug, Deserialize)]
struct AllDocs {
    rows: Vec<DocRow>,
}

#[derive(Debug, Deserialize)]
struct DocRow {
    doc: Option<Map<String, Value>>,
}

/// Converts a CouchDB document into a datastore value.
///
/// CouchDB bookkeeping (`_id`, `_rev`) is replaced by `namespace` and `id`.
/// Documents in a namespaced database without a `__` separator in their id
/// (design documents, stray entries) have no datastore key and are dropped.
fn rekey_document(db: &str, mut doc: Map<String, Value>) -> Option<Value> {
    let doc_id = match doc.remove("_id")? {
        Value::String(id) => id,
        _ => return None,
    };
    doc.remove("_rev");

    let (namespace, id) = if db == SPARK_DATABASE {
        (db.to_string(), doc_id)
    } else {
        let (prefix, id) = doc_id.split_once("__")?;
        (format!("{}:{}", db, prefix), id.to_string())
    };
    doc.insert("namespace".to_string(), Value::String(namespace));
    doc.insert("id".to_string(), Value::String(id));
    Some(Value::Object(doc))
}

/// Copies the documents of a pre-0.6.0 CouchDB datastore into the new
/// datastore, then moves the `couchdb/` data dir aside.
///
/// CouchDB is served from `couchdb/` by a throwaway container while the
/// documents are read. The data dir is only renamed after every document
/// was accepted, so a failed run is retried over the same data.
pub struct ArchiveLegacyDatastore {
    ctx: Arc<StepContext>,
}

impl ArchiveLegacyDatastore {
    pub fn new(ctx: Arc<StepContext>) -> Self {
        Self { ctx }
    }

    /// `couchdb-migrated-YYYYMMDD`, with a numeric suffix if already taken.
    fn archive_path(&self) -> PathBuf {
        let date = chrono::Local::now().format("%Y%m%d");
        let base = format!("couchdb-migrated-{}", date);
        let mut candidate = self.ctx.path(&base);
        let mut n = 1;
        while candidate.exists() {
            candidate = self.ctx.path(&format!("{}-{}", base, n));
            n += 1;
        }
        candidate
    }

    fn docker(&self) -> ComposeClient {
        let config = self.ctx.config();
        ComposeClient::new(
            self.ctx.work_dir(),
            config.use_sudo,
            config.compose_timeout(),
        )
    }

    async fn start_legacy_container(&self, name: &str) -> Result<()> {
        let legacy = &self.ctx.config().legacy_datastore;
        let port = url::Url::parse(&legacy.url)
            .ok()
            .and_then(|url| url.port_or_known_default())
            .ok_or_else(|| {
                Error::Config(format!("legacy_datastore.url has no port: {}", legacy.url))
            })?;
        let volume = format!(
            "{}:/opt/couchdb/data/",
            self.ctx.path("couchdb").display()
        );
        let ports = format!("{}:5984", port);

        tracing::info!("Starting temporary CouchDB container '{}'", name);
        let docker = self.docker();
        // Left over from an interrupted run.
        if let Err(e) = docker.docker(&["rm", "-f", name]).await {
            tracing::debug!("No stale container '{}' removed: {}", name, e);
        }
        docker
            .docker(&[
                "run",
                "--rm",
                "-d",
                "--name",
                name,
                "-v",
                volume.as_str(),
                "-p",
                ports.as_str(),
                legacy.image.as_str(),
            ])
            .await
            .map_err(|e| Error::lifecycle(LifecycleAction::Start, e.to_string()))?;
        Ok(())
    }

    async fn stop_legacy_container(&self, name: &str) {
        if let Err(e) = self.docker().docker(&["stop", name]).await {
            tracing::warn!("Failed to stop temporary container '{}': {}", name, e);
        }
    }

    /// Reads every known database from CouchDB and writes it to the
    /// datastore. Returns the number of documents written.
    async fn copy_documents(&self, datastore: &str) -> Result<usize> {
        let legacy = &self.ctx.config().legacy_datastore;
        let couch = legacy.url.trim_end_matches('/');
        self.ctx
            .waiter()
            .wait_ready(couch, self.ctx.config().wait_timeout())
            .await?;

        let client = shared_client()?;
        let databases: Vec<String> = client
            .get(format!("{}/_all_dbs", couch))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let mut written = 0;
        let known = NAMESPACED_DATABASES.into_iter().chain([SPARK_DATABASE]);
        for db in known.filter(|db| databases.iter().any(|d| d == db)) {
            let all: AllDocs = client
                .get(format!("{}/{}/_all_docs?include_docs=true", couch, db))
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            let values: Vec<Value> = all
                .rows
                .into_iter()
                .filter_map(|row| row.doc)
                .filter_map(|doc| rekey_document(db, doc))
                .collect();
            if values.is_empty() {
                continue;
            }

            tracing::info!("Migrating {} documents from '{}'", values.len(), db);
            client
                .post(format!("{}/mset", datastore))
                .json(&json!({ "values": values }))
                .send()
                .await?
                .error_for_status()?;
            written += values.len();
        }
        Ok(written)
    }
}

#[async_trait]
impl StepAction for ArchiveLegacyDatastore {
    async fn run(&self) -> Result<()> {
        let legacy = self.ctx.path("couchdb");
        if !legacy.exists() {
            tracing::info!("couchdb/ dir not found, skipping");
            return Ok(());
        }

        let datastore = self.ctx.service_url(&self.ctx.config().datastore_path)?;
        self.ctx
            .waiter()
            .wait_ready(
                &format!("{}/ping", datastore),
                self.ctx.config().wait_timeout(),
            )
            .await?;

        let container = self.ctx.config().legacy_datastore.container.clone();
        if let Some(name) = &container {
            self.start_legacy_container(name).await?;
        }
        let copied = self.copy_documents(&datastore).await;
        if let Some(name) = &container {
            self.stop_legacy_container(name).await;
        }
        let copied = copied?;
        tracing::info!("Copied {} documents to the datastore", copied);

        let target = self.archive_path();
        tracing::info!("Archiving {} to {}", legacy.display(), target.display());
        std::fs::rename(&legacy, &target)?;
        Ok(())
    }
}
