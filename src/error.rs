// Allow unused_assignments at module level because thiserror's generated code
// for struct variants triggers false positive warnings - the fields ARE used
// in the Display impl but rustc's lint pass doesn't see this.
#![allow(unused_assignments)]

use crate::migration::Phase;
use miette::Diagnostic;
use std::fmt;
use std::io;
use thiserror::Error;

/// Service lifecycle operation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleAction {
    Stop,
    Start,
    Pull,
    Prune,
}

impl fmt::Display for LifecycleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleAction::Stop => "stop",
            LifecycleAction::Start => "start",
            LifecycleAction::Pull => "pull",
            LifecycleAction::Prune => "prune",
        };
        f.write_str(name)
    }
}

#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    #[error("Invalid version '{0}': expected major.minor.patch")]
    #[diagnostic(
        code(brewctl::version::invalid),
        help("Versions are three dot-separated non-negative integers, e.g. 0.6.1")
    )]
    InvalidVersionFormat(String),

    #[error("This configuration was never set up")]
    #[diagnostic(
        code(brewctl::migrate::not_installed),
        help("Run the initial setup before migrating")
    )]
    NotYetInstalled,

    #[error("Operation aborted by user")]
    AbortedByUser,

    #[error("Failed to {action} services: {message}")]
    #[diagnostic(
        code(brewctl::lifecycle::failed),
        help("Check that Docker is running with `docker ps`")
    )]
    Lifecycle {
        action: LifecycleAction,
        message: String,
    },

    #[error("Migration step '{step}' failed during {}: {source}", .phase.stage())]
    #[diagnostic(
        code(brewctl::migrate::step_failed),
        help("The stored version was not changed. Fix the cause and run the migration again")
    )]
    StepExecution {
        step: String,
        phase: Phase,
        #[source]
        source: Box<Error>,
    },

    #[error("Duplicate migration step id: {0}")]
    DuplicateStepId(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Environment file error: {0}")]
    EnvFile(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Timeout waiting for {0}")]
    #[diagnostic(
        code(brewctl::http::timeout),
        help("The service may be slow to start. Check its logs with `docker compose logs`")
    )]
    Timeout(String),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Wrap a failure raised by a migration step.
    pub fn step(step: impl Into<String>, phase: Phase, source: Error) -> Self {
        Error::StepExecution {
            step: step.into(),
            phase,
            source: Box::new(source),
        }
    }

    pub fn lifecycle(action: LifecycleAction, message: impl Into<String>) -> Self {
        Error::Lifecycle {
            action,
            message: message.into(),
        }
    }

    /// Migration phase the error was raised in, when known.
    pub fn phase(&self) -> Option<Phase> {
        match self {
            Error::StepExecution { phase, .. } => Some(*phase),
            _ => None,
        }
    }

    /// Returns a helpful suggestion for resolving this error, if available.
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Error::NotYetInstalled => Some(
                "Run the initial setup first. Migrations only apply to configured installs."
                    .to_string(),
            ),
            Error::AbortedByUser => Some(
                "Your system reports a version newer than the selected release. This may be due to switching release tracks.\nUse --from-version if you know what you are doing.".to_string(),
            ),
            Error::InvalidVersionFormat(_) => Some(
                "Check the stored version in your .env file, or override it with --from-version".to_string(),
            ),
            Error::StepExecution { step, phase, .. } => {
                let state = match phase {
                    Phase::PreStop => "Services are stopped.",
                    Phase::PostStart | Phase::Unconditional => "Services are running.",
                };
                Some(format!(
                    "{} Step '{}' is safe to re-run: fix the cause and run `brewctl migrate` again.",
                    state, step
                ))
            }
            Error::Lifecycle { action: LifecycleAction::Start, .. } => Some(
                "Services may be down. Start them manually with `docker compose up -d` or re-run the migration.".to_string(),
            ),
            Error::Lifecycle { .. } => {
                Some("Check that Docker is running: docker ps".to_string())
            }
            Error::Config(_) => Some("Check brewctl.yaml in your install directory".to_string()),
            _ => None,
        }
    }

    /// Formats the error with its suggestion (if any) for user-friendly display.
    pub fn with_suggestion(&self) -> String {
        match self.suggestion() {
            Some(suggestion) => format!("{}\n\nHint: {}", self, suggestion),
            None => self.to_string(),
        }
    }
}
