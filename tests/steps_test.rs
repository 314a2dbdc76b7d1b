//! Built-in step tests
//!
//! Each step runs against a scratch install directory. Every step is run
//! twice to check that a second run over its own output changes nothing.

use async_trait::async_trait;
use brewctl::migration::{HttpWaiter, StepAction};
use brewctl::config::LegacyDatastoreConfig;
use brewctl::steps::{
    ArchiveLegacyDatastore, AutomationUi, ConfigureHistory, EnvDefaults, PrepareDatastore,
    ResetHistory, SplitConfig, StepContext,
};
use brewctl::{CtlConfig, Error, Result};
use parking_lot::Mutex;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Records every wait; fails them all when `unreachable` is set.
#[derive(Default)]
struct FakeWaiter {
    unreachable: bool,
    waited: Mutex<Vec<String>>,
}

#[async_trait]
impl HttpWaiter for FakeWaiter {
    async fn wait_ready(&self, url: &str, _timeout: Duration) -> Result<()> {
        self.waited.lock().push(url.to_string());
        if self.unreachable {
            return Err(Error::Timeout(url.to_string()));
        }
        Ok(())
    }
}

fn context(dir: &TempDir, config: CtlConfig, waiter: Arc<FakeWaiter>) -> Arc<StepContext> {
    Arc::new(StepContext::new(dir.path(), config, waiter))
}

fn default_context(dir: &TempDir) -> Arc<StepContext> {
    context(dir, CtlConfig::default(), Arc::new(FakeWaiter::default()))
}

/// Snapshot of every file (path and content) below `dir`.
fn snapshot(dir: &Path) -> Vec<(String, String)> {
    let mut entries = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        for entry in fs::read_dir(&current).unwrap() {
            let path = entry.unwrap().path();
            let rel = path.strip_prefix(dir).unwrap().display().to_string();
            if path.is_dir() {
                entries.push((rel + "/", String::new()));
                pending.push(path);
            } else {
                entries.push((rel, fs::read_to_string(&path).unwrap_or_default()));
            }
        }
    }
    entries.sort();
    entries
}

async fn run_twice(action: &dyn StepAction, dir: &TempDir) -> Vec<(String, String)> {
    action.run().await.unwrap();
    let first = snapshot(dir.path());
    action.run().await.unwrap();
    let second = snapshot(dir.path());
    assert_eq!(first, second, "second run changed the install");
    second
}

const COMPOSE: &str = r#"
version: "3.7"
services:
  datastore:
    image: treehouses/couchdb:2.3.1
  history:
    image: brewblox/brewblox-history:rpi-stable
    depends_on:
      - influx
  influx:
    image: influxdb:1.7
  spark-one:
    image: brewblox/brewblox-devcon-spark:rpi-stable
    depends_on:
      - history
      - datastore
  ui:
    image: brewblox/brewblox-ui:rpi-stable
  traefik:
    image: traefik:v1.7
"#;

fn read_yaml(path: &Path) -> serde_yaml::Value {
    serde_yaml::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

// ============================================================================
// Pre-stop steps
// ============================================================================

#[tokio::test]
async fn test_reset_history_removes_influxdb() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("influxdb/data")).unwrap();
    fs::write(dir.path().join("influxdb/data/shard"), "old").unwrap();

    let after = run_twice(&ResetHistory::new(default_context(&dir)), &dir).await;

    assert!(!dir.path().join("influxdb").exists());
    assert!(after.is_empty());
}

#[tokio::test]
async fn test_split_config_moves_system_services() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("docker-compose.yml"), COMPOSE).unwrap();

    let after = run_twice(&SplitConfig::new(default_context(&dir)), &dir).await;

    let names: Vec<&str> = after.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(names, ["docker-compose.shared.yml", "docker-compose.yml"]);

    let user = read_yaml(&dir.path().join("docker-compose.yml"));
    let user_services = user["services"].as_mapping().unwrap();
    assert_eq!(user_services.len(), 1);
    assert!(user_services.contains_key("spark-one"));
    assert_eq!(user["version"].as_str(), Some("3.7"));

    let shared = read_yaml(&dir.path().join("docker-compose.shared.yml"));
    let shared_services = shared["services"].as_mapping().unwrap();
    for name in ["datastore", "history", "influx", "ui", "traefik"] {
        assert!(shared_services.contains_key(name), "missing {}", name);
    }
}

#[tokio::test]
async fn test_split_config_keeps_existing_shared_file() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("docker-compose.yml"), COMPOSE).unwrap();
    fs::write(dir.path().join("docker-compose.shared.yml"), "release: owned\n").unwrap();

    SplitConfig::new(default_context(&dir)).run().await.unwrap();

    assert_eq!(
        fs::read_to_string(dir.path().join("docker-compose.shared.yml")).unwrap(),
        "release: owned\n"
    );
}

#[tokio::test]
async fn test_split_config_without_compose_file_is_noop() {
    let dir = tempfile::tempdir().unwrap();
    let after = run_twice(&SplitConfig::new(default_context(&dir)), &dir).await;
    assert!(after.is_empty());
}

#[tokio::test]
async fn test_env_defaults_only_adds_missing_keys() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join(".env"),
        "# install settings\nBREWBLOX_RELEASE=edge\nBREWBLOX_CFG_VERSION=0.2.0\n",
    )
    .unwrap();

    run_twice(&EnvDefaults::new(default_context(&dir)), &dir).await;

    let content = fs::read_to_string(dir.path().join(".env")).unwrap();
    assert!(content.starts_with("# install settings\nBREWBLOX_RELEASE=edge\n"));
    assert!(content.contains("BREWBLOX_PORT_HTTPS=443\n"));
    assert!(content.contains("COMPOSE_FILE=docker-compose.shared.yml:docker-compose.yml\n"));
    assert_eq!(content.matches("BREWBLOX_RELEASE=").count(), 1);
}

#[tokio::test]
async fn test_prepare_datastore_drops_depends_on_and_creates_redis() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("docker-compose.yml"), COMPOSE).unwrap();

    run_twice(&PrepareDatastore::new(default_context(&dir)), &dir).await;

    let config = read_yaml(&dir.path().join("docker-compose.yml"));
    for (_, service) in config["services"].as_mapping().unwrap() {
        assert!(service.get("depends_on").is_none());
    }
    assert!(dir.path().join("redis").is_dir());
}

#[tokio::test]
async fn test_automation_ui_added_next_to_automation() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("docker-compose.yml"),
        "version: \"3.7\"\nservices:\n  automation:\n    image: brewblox/brewblox-automation:${BREWBLOX_RELEASE}\n",
    )
    .unwrap();

    let after = run_twice(&AutomationUi::new(default_context(&dir)), &dir).await;

    assert_eq!(after.len(), 1);
    let config = read_yaml(&dir.path().join("docker-compose.yml"));
    let ui = &config["services"]["automation-ui"];
    assert_eq!(
        ui["image"].as_str(),
        Some("brewblox/brewblox-automation-ui:${BREWBLOX_RELEASE}")
    );
    assert_eq!(ui["restart"].as_str(), Some("unless-stopped"));
    assert!(config["services"]["automation"].is_mapping());
}

#[tokio::test]
async fn test_automation_ui_leaves_other_installs_alone() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("docker-compose.yml"), COMPOSE).unwrap();
    let custom = "services:\n  automation:\n    image: a\n  automation-ui:\n    image: custom\n";
    let other = tempfile::tempdir().unwrap();
    fs::write(other.path().join("docker-compose.yml"), custom).unwrap();

    AutomationUi::new(default_context(&dir)).run().await.unwrap();
    AutomationUi::new(default_context(&other)).run().await.unwrap();

    assert_eq!(
        fs::read_to_string(dir.path().join("docker-compose.yml")).unwrap(),
        COMPOSE
    );
    assert_eq!(
        fs::read_to_string(other.path().join("docker-compose.yml")).unwrap(),
        custom
    );
}

// ============================================================================
// Post-start steps
// ============================================================================

/// Request line and body of one request seen by [`serve`].
type Seen = Arc<Mutex<Vec<(String, String)>>>;

/// Serves HTTP on a local port until the test ends. A request whose path
/// starts with one of `routes` gets that route's JSON body, anything else
/// gets an empty 200.
async fn serve(routes: Vec<(&'static str, String)>) -> (u16, Seen) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let seen: Seen = Arc::default();
    let record = seen.clone();
    tokio::spawn(async move {
        loop {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];
            let header_end = loop {
                if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                    break pos + 4;
                }
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break buf.len();
                }
                buf.extend_from_slice(&chunk[..n]);
            };
            let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
            let length = head
                .lines()
                .filter_map(|line| line.split_once(':'))
                .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
                .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            while buf.len() < header_end + length {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
            }

            let line = head.lines().next().unwrap_or_default().to_string();
            let body = String::from_utf8_lossy(&buf[header_end..]).to_string();
            let path = line.split(' ').nth(1).unwrap_or_default().to_string();
            record.lock().push((line, body));

            let reply = routes
                .iter()
                .find(|(route, _)| path.starts_with(route))
                .map(|(_, body)| body.clone())
                .unwrap_or_default();
            let response = format!(
                "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                reply.len(),
                reply
            );
            socket.write_all(response.as_bytes()).await.unwrap();
        }
    });
    (port, seen)
}

/// Install whose proxy and legacy CouchDB are both served on `port`.
fn local_config(port: u16) -> CtlConfig {
    CtlConfig {
        host: format!("http://127.0.0.1:{}", port),
        legacy_datastore: LegacyDatastoreConfig {
            url: format!("http://127.0.0.1:{}/couch", port),
            container: None,
            ..Default::default()
        },
        ..Default::default()
    }
}

fn couch_routes() -> Vec<(&'static str, String)> {
    vec![
        (
            "/couch/_all_dbs",
            r#"["_users", "brewblox-ui-store", "spark-service"]"#.to_string(),
        ),
        (
            "/couch/brewblox-ui-store/_all_docs",
            serde_json::json!({"rows": [
                {"id": "dashboards__main", "doc": {"_id": "dashboards__main", "_rev": "2-a", "title": "Main"}},
                {"id": "_design/views", "doc": {"_id": "_design/views", "_rev": "1-b"}},
            ]})
            .to_string(),
        ),
        (
            "/couch/spark-service/_all_docs",
            serde_json::json!({"rows": [
                {"id": "spark-one", "doc": {"_id": "spark-one", "_rev": "7-c", "blocks": []}},
            ]})
            .to_string(),
        ),
    ]
}

fn archived_dirs(dir: &Path) -> Vec<String> {
    fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .filter(|name| name.starts_with("couchdb-migrated-"))
        .collect()
}

#[tokio::test]
async fn test_archive_copies_documents_then_renames() {
    let (port, seen) = serve(couch_routes()).await;
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("couchdb")).unwrap();
    fs::write(dir.path().join("couchdb/_users.couch"), "data").unwrap();
    let waiter = Arc::new(FakeWaiter::default());
    let step = ArchiveLegacyDatastore::new(context(&dir, local_config(port), waiter.clone()));

    run_twice(&step, &dir).await;

    // Second run found nothing to archive and did not wait again.
    assert_eq!(
        *waiter.waited.lock(),
        vec![
            format!("http://127.0.0.1:{}/history/datastore/ping", port),
            format!("http://127.0.0.1:{}/couch", port),
        ]
    );

    let requests = seen.lock().clone();
    let lines: Vec<&str> = requests.iter().map(|(line, _)| line.as_str()).collect();
    assert_eq!(
        lines,
        [
            "GET /couch/_all_dbs HTTP/1.1",
            "GET /couch/brewblox-ui-store/_all_docs?include_docs=true HTTP/1.1",
            "POST /history/datastore/mset HTTP/1.1",
            "GET /couch/spark-service/_all_docs?include_docs=true HTTP/1.1",
            "POST /history/datastore/mset HTTP/1.1",
        ]
    );
    let body = |i: usize| serde_json::from_str::<serde_json::Value>(&requests[i].1).unwrap();
    assert_eq!(
        body(2),
        serde_json::json!({"values": [
            {"namespace": "brewblox-ui-store:dashboards", "id": "main", "title": "Main"},
        ]})
    );
    assert_eq!(
        body(4),
        serde_json::json!({"values": [
            {"namespace": "spark-service", "id": "spark-one", "blocks": []},
        ]})
    );

    assert!(!dir.path().join("couchdb").exists());
    let archived = archived_dirs(dir.path());
    assert_eq!(archived.len(), 1);
    assert_eq!(archived[0].len(), "couchdb-migrated-".len() + 8);
    assert!(dir
        .path()
        .join(&archived[0])
        .join("_users.couch")
        .exists());
}

#[tokio::test]
async fn test_archive_keeps_data_when_couch_has_no_documents_endpoint() {
    let (port, seen) = serve(vec![(
        "/couch/_all_dbs",
        r#"["brewblox-ui-store"]"#.to_string(),
    )])
    .await;
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("couchdb")).unwrap();
    let step = ArchiveLegacyDatastore::new(context(
        &dir,
        local_config(port),
        Arc::new(FakeWaiter::default()),
    ));

    // The empty reply is not an `_all_docs` listing.
    let err = step.run().await.unwrap_err();

    assert!(matches!(err, Error::Http(_)), "{:?}", err);
    assert!(dir.path().join("couchdb").exists());
    assert!(archived_dirs(dir.path()).is_empty());
    assert!(!seen.lock().iter().any(|(line, _)| line.starts_with("POST")));
}

#[tokio::test]
async fn test_archive_keeps_data_when_datastore_unreachable() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("couchdb")).unwrap();
    let waiter = Arc::new(FakeWaiter {
        unreachable: true,
        ..Default::default()
    });
    let step = ArchiveLegacyDatastore::new(context(&dir, local_config(1), waiter));

    let err = step.run().await.unwrap_err();

    assert!(matches!(err, Error::Timeout(_)));
    assert!(dir.path().join("couchdb").exists());
}

#[tokio::test]
async fn test_configure_history_posts_after_ping() {
    let (port, seen) = serve(Vec::new()).await;
    let dir = tempfile::tempdir().unwrap();
    let config = CtlConfig {
        host: format!("http://127.0.0.1:{}", port),
        ..Default::default()
    };
    let waiter = Arc::new(FakeWaiter::default());
    let step = ConfigureHistory::new(context(&dir, config, waiter.clone()));

    step.run().await.unwrap();

    assert_eq!(
        *waiter.waited.lock(),
        vec![format!("http://127.0.0.1:{}/history/history/ping", port)]
    );
    let lines: Vec<String> = seen.lock().iter().map(|(line, _)| line.clone()).collect();
    assert_eq!(lines, vec!["POST /history/history/configure HTTP/1.1".to_string()]);
}

#[tokio::test]
async fn test_configure_history_fails_when_history_unreachable() {
    let dir = tempfile::tempdir().unwrap();
    let waiter = Arc::new(FakeWaiter {
        unreachable: true,
        ..Default::default()
    });
    let step = ConfigureHistory::new(context(&dir, CtlConfig::default(), waiter));

    let err = step.run().await.unwrap_err();
    assert!(matches!(err, Error::Timeout(ref url) if url.ends_with("/history/history/ping")));
}
