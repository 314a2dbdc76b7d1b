use super::{print_plan, report_error, Install};
use crate::output::UserOutput;
use brewctl::migration::{ConfirmationPrompt, MigrateOptions, MigrationEngine, MigrationOutcome};
use brewctl::{AssumeYes, TerminalPrompt};
use std::sync::Arc;

/// Flags of the `migrate` subcommand.
#[derive(Debug, Clone, Default)]
pub struct MigrateArgs {
    pub from_version: Option<String>,
    pub yes: bool,
    pub options: MigrateOptions,
}

pub async fn run_migrate(
    install: &Install,
    args: MigrateArgs,
    out: &dyn UserOutput,
) -> anyhow::Result<i32> {
    let prompt: Arc<dyn ConfirmationPrompt> = if args.yes {
        Arc::new(AssumeYes)
    } else {
        Arc::new(TerminalPrompt::new())
    };
    let engine = install.engine(prompt)?;
    Ok(run_migration(&engine, args.from_version.as_deref(), &args.options, out).await)
}

/// Run one migration and translate the result into a process exit code.
///
/// 0 for a committed migration, an already current install, a refresh or a
/// dry run. 1 for every error, which is reported to `out`.
pub async fn run_migration(
    engine: &MigrationEngine,
    from_override: Option<&str>,
    opts: &MigrateOptions,
    out: &dyn UserOutput,
) -> i32 {
    if let Some(version) = from_override {
        out.status(&format!("Migrating from version {} (--from-version)", version));
    }

    match engine.migrate(from_override, opts).await {
        Ok(outcome) => {
            report_outcome(&outcome, out);
            0
        }
        Err(e) => {
            tracing::debug!("Migration failed: {:?}", e);
            report_error(&e, out);
            1
        }
    }
}

fn report_outcome(outcome: &MigrationOutcome, out: &dyn UserOutput) {
    match outcome {
        MigrationOutcome::AlreadyCurrent { version } => {
            out.success(&format!("Already at version {}, nothing to do", version));
        }
        MigrationOutcome::Migrated { from, to, steps } => {
            out.success(&format!(
                "Migrated {} -> {} ({} step{})",
                from,
                to,
                steps.len(),
                if steps.len() == 1 { "" } else { "s" }
            ));
        }
        MigrationOutcome::Refreshed { version } => {
            out.success(&format!(
                "Services restarted, migrations skipped (version stays {})",
                version
            ));
        }
        MigrationOutcome::DryRun(plan) => {
            out.status("Dry run, nothing was changed");
            out.blank();
            print_plan(plan, out);
        }
    }
}
