#![allow(unused_assignments)]

//! # brewctl
//!
//! Version-gated configuration migrations for a docker-compose based
//! brewery install.
//!
//! The install keeps its configuration version in `.env`. Migrating compares
//! that version with the one this release targets and runs every step whose
//! threshold lies above the stored version, in a fixed order around a full
//! stop/start of the services:
//!
//! 1. stop all services
//! 2. run pre-stop steps (ascending threshold)
//! 3. pull images
//! 4. start all services
//! 5. run post-start steps (ascending threshold), then unconditional steps
//! 6. store the target version
//!
//! A failure at any point leaves the stored version unchanged, so the next
//! run starts from the same place. Steps are idempotent for that reason.
//!
//! ## Quick Start
//!
//! ```no_run
//! use brewctl::migration::{MigrateOptions, MigrationEngine};
//! use brewctl::{steps, CtlConfig, EnvVersionStore, TerminalPrompt};
//! use brewctl::compose::{ComposeClient, ComposeGate};
//! use brewctl::config::EnvFile;
//! use brewctl::healthcheck::RetryingWaiter;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), brewctl::Error> {
//! let dir = std::path::PathBuf::from("/home/pi/brewblox");
//! let config = CtlConfig::default();
//!
//! let waiter = Arc::new(RetryingWaiter::new(config.wait_interval()));
//! let ctx = Arc::new(steps::StepContext::new(&dir, config.clone(), waiter));
//! let client = ComposeClient::new(&dir, config.use_sudo, config.compose_timeout());
//!
//! let engine = MigrationEngine::builder()
//!     .registry(Arc::new(steps::default_registry(ctx)?))
//!     .gate(Arc::new(ComposeGate::new(client)))
//!     .store(Arc::new(EnvVersionStore::new(
//!         EnvFile::new(dir.join(&config.env_file)),
//!         config.version_key.clone(),
//!     )))
//!     .prompt(Arc::new(TerminalPrompt::new()))
//!     .target(config.target_version)
//!     .build()?;
//!
//! let outcome = engine.migrate(None, &MigrateOptions::default()).await?;
//! println!("{:?}", outcome);
//! # Ok(())
//! # }
//! ```

pub mod compose;
pub mod config;
pub mod error;
pub mod healthcheck;
pub mod migration;
pub mod prompt;
pub mod steps;
pub mod store;
pub mod version;

// Re-export commonly used types
pub use config::{CtlConfig, Parser};
pub use error::{Error, LifecycleAction, Result};
pub use migration::{MigrateOptions, MigrationEngine, MigrationOutcome};
pub use prompt::{AssumeYes, TerminalPrompt};
pub use store::EnvVersionStore;
pub use version::{VersionToken, CURRENT_VERSION};
