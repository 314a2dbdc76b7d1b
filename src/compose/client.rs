//! Docker Compose CLI client.
//!
//! All compose and docker invocations go through [`ComposeClient`], which
//! resolves the compose flavour once, applies the optional `sudo` prefix, runs
//! in the install directory and maps failures to [`ComposeError`].

use super::ComposeError;
use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;
use tokio::sync::OnceCell;

/// Docker Compose command type (v1 or v2)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposeCommand {
    V2, // docker compose
    V1, // docker-compose
}

/// Global cache for compose command detection
static COMPOSE_COMMAND: OnceCell<ComposeCommand> = OnceCell::const_new();

impl ComposeCommand {
    /// Detect which docker compose command is available
    async fn detect() -> Result<ComposeCommand, ComposeError> {
        // Try docker compose (v2) first
        let v2_check = tokio::process::Command::new("docker")
            .args(["compose", "version"])
            .output()
            .await;

        if let Ok(output) = v2_check {
            if output.status.success() {
                return Ok(ComposeCommand::V2);
            }
        }

        let v1_check = tokio::process::Command::new("docker-compose")
            .args(["--version"])
            .output()
            .await;

        if let Ok(output) = v1_check {
            if output.status.success() {
                return Ok(ComposeCommand::V1);
            }
        }

        Err(ComposeError::ComposeNotFound)
    }

    /// Get the compose command (cached)
    pub async fn get() -> Result<ComposeCommand, ComposeError> {
        COMPOSE_COMMAND
            .get_or_try_init(|| async { Self::detect().await })
            .await
            .copied()
    }

    /// Program and leading args for running compose
    pub fn command_and_args(&self) -> (&'static str, Vec<&'static str>) {
        match self {
            ComposeCommand::V2 => ("docker", vec!["compose"]),
            ComposeCommand::V1 => ("docker-compose", vec![]),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ComposeClient {
    work_dir: PathBuf,
    use_sudo: bool,
    timeout: Duration,
}

impl ComposeClient {
    pub fn new(work_dir: impl Into<PathBuf>, use_sudo: bool, timeout: Duration) -> Self {
        Self {
            work_dir: work_dir.into(),
            use_sudo,
            timeout,
        }
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Full argv for a command, including the `sudo` prefix when enabled.
    pub fn argv(&self, program: &str, args: &[&str]) -> Vec<String> {
        let mut argv = Vec::with_capacity(args.len() + 2);
        if self.use_sudo {
            argv.push("sudo".to_string());
        }
        argv.push(program.to_string());
        argv.extend(args.iter().map(|a| a.to_string()));
        argv
    }

    /// Run a command with a timeout, returning Output only if exit 0.
    async fn run_success(&self, program: &str, args: &[&str]) -> Result<Output, ComposeError> {
        let argv = self.argv(program, args);
        let cmd_str = argv.join(" ");
        tracing::debug!("Running '{}' in {}", cmd_str, self.work_dir.display());

        let result = tokio::time::timeout(
            self.timeout,
            tokio::process::Command::new(&argv[0])
                .args(&argv[1..])
                .current_dir(&self.work_dir)
                .kill_on_drop(true)
                .output(),
        )
        .await;

        let output = match result {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(ComposeError::exec_failed(cmd_str, e)),
            Err(_) => return Err(ComposeError::timeout(cmd_str, self.timeout)),
        };

        if output.status.success() {
            Ok(output)
        } else {
            Err(ComposeError::failed(cmd_str, &output))
        }
    }

    /// Run a `docker compose` subcommand.
    pub async fn compose(&self, args: &[&str]) -> Result<Output, ComposeError> {
        let (program, mut prefix) = ComposeCommand::get().await?.command_and_args();
        prefix.extend_from_slice(args);
        self.run_success(program, &prefix).await
    }

    /// Run a plain `docker` subcommand.
    pub async fn docker(&self, args: &[&str]) -> Result<Output, ComposeError> {
        self.run_success("docker", args).await
    }

    pub async fn down(&self) -> Result<(), ComposeError> {
        self.compose(&["down", "--remove-orphans"]).await.map(|_| ())
    }

    pub async fn up_detached(&self) -> Result<(), ComposeError> {
        self.compose(&["up", "-d"]).await.map(|_| ())
    }

    pub async fn pull(&self) -> Result<(), ComposeError> {
        self.compose(&["pull"]).await.map(|_| ())
    }

    /// Remove dangling images and unused volumes.
    pub async fn prune(&self) -> Result<(), ComposeError> {
        self.docker(&["image", "prune", "-f"]).await?;
        self.docker(&["volume", "prune", "-f"]).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argv_without_sudo() {
        let client = ComposeClient::new(".", false, Duration::from_secs(1));
        assert_eq!(
            client.argv("docker", &["compose", "up", "-d"]),
            ["docker", "compose", "up", "-d"]
        );
    }

    #[test]
    fn test_argv_with_sudo() {
        let client = ComposeClient::new(".", true, Duration::from_secs(1));
        assert_eq!(
            client.argv("docker-compose", &["down"]),
            ["sudo", "docker-compose", "down"]
        );
    }

    #[test]
    fn test_command_and_args() {
        assert_eq!(
            ComposeCommand::V2.command_and_args(),
            ("docker", vec!["compose"])
        );
        assert_eq!(
            ComposeCommand::V1.command_and_args(),
            ("docker-compose", vec![])
        );
    }

    #[tokio::test]
    async fn test_missing_binary_is_exec_failure() {
        let client = ComposeClient::new(".", false, Duration::from_secs(5));
        let err = client
            .run_success("brewctl-definitely-not-a-binary", &["--version"])
            .await
            .unwrap_err();
        assert!(matches!(err, ComposeError::ExecFailed { .. }));
    }
}
