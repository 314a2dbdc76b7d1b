mod cli;
mod commands;
mod output;

use brewctl::migration::MigrateOptions;
use brewctl::Error as CtlError;
use clap::{CommandFactory, Parser};
use cli::{Cli, Commands};
use commands::{Install, MigrateArgs};

#[tokio::main]
async fn main() {
    match run().await {
        Ok(0) => {}
        Ok(code) => std::process::exit(code),
        Err(e) => {
            if let Some(ctl_error) = e.downcast_ref::<CtlError>() {
                eprintln!("Error: {}", ctl_error);
                if let Some(suggestion) = ctl_error.suggestion() {
                    eprintln!("\nHint: {}", suggestion);
                }
            } else {
                eprintln!("Error: {:#}", e);
            }
            std::process::exit(1);
        }
    }
}

async fn run() -> anyhow::Result<i32> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    // Commands that need no install
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = Cli::command();
        let bin_name = cmd.get_name().to_string();
        clap_complete::generate(*shell, &mut cmd, bin_name, &mut std::io::stdout());
        return Ok(0);
    }

    let install = Install::load(cli.dir.clone(), cli.config.clone())?;

    match cli.command {
        Commands::Migrate {
            from_version,
            no_migrate,
            no_pull,
            prune,
            yes,
            dry_run,
        } => {
            let args = MigrateArgs {
                from_version,
                yes,
                options: MigrateOptions {
                    skip_migrate: no_migrate,
                    skip_pull: no_pull,
                    prune,
                    dry_run,
                },
            };
            commands::run_migrate(&install, args, &output::CliOutput).await
        }
        Commands::Status { json } => {
            commands::run_status(&install, json, &output::CliOutput)?;
            Ok(0)
        }
        Commands::Completions { .. } => unreachable!("handled before loading the install"),
    }
}

fn init_tracing(verbose: bool) -> anyhow::Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    Ok(())
}
