use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "brewctl")]
#[command(version)]
#[command(about = "brewctl - Upgrade and migrate a brewery install")]
pub struct Cli {
    /// Install directory (defaults to the current directory)
    #[arg(short = 'd', long = "dir", env = "BREWCTL_DIR")]
    pub dir: Option<PathBuf>,

    /// Config file path (defaults to brewctl.yaml in the install directory or a parent)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Verbose logging (same as RUST_LOG=debug)
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Stop services, apply pending migrations, and start services again
    #[command(visible_alias = "update")]
    Migrate {
        /// Migrate as if the install were at this version
        #[arg(long, value_name = "X.Y.Z")]
        from_version: Option<String>,

        /// Skip migrations and keep the stored version; only pull and restart
        #[arg(long)]
        no_migrate: bool,

        /// Do not pull newer images
        #[arg(long)]
        no_pull: bool,

        /// Remove unused docker images and volumes afterwards
        #[arg(long)]
        prune: bool,

        /// Answer yes to confirmation prompts
        #[arg(short, long)]
        yes: bool,

        /// Show the steps that would run without changing anything
        #[arg(long)]
        dry_run: bool,
    },
    /// Show stored and target versions and pending steps
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_name = "SHELL")]
        shell: clap_complete::Shell,
    },
}
