use super::{print_plan, Install};
use crate::output::UserOutput;
use brewctl::migration::PersistedVersionStore;
use brewctl::{AssumeYes, VersionToken};
use std::sync::Arc;

pub fn run_status(install: &Install, json: bool, out: &dyn UserOutput) -> anyhow::Result<()> {
    let stored = install.store().read()?;
    let target = install.config().target_version;
    let previous = VersionToken::parse(&stored)?;

    let engine = install.engine(Arc::new(AssumeYes))?;
    let plan = if previous.is_unset() || previous == target {
        None
    } else {
        Some(engine.plan(None)?)
    };

    if json {
        use serde_json::json;

        let status = json!({
            "install_dir": install.work_dir().display().to_string(),
            "stored_version": previous,
            "target_version": target,
            "installed": !previous.is_unset(),
            "up_to_date": previous == target,
            "plan": plan,
        });
        out.status(&serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    out.status(&format!("Install:        {}", install.work_dir().display()));
    if previous.is_unset() {
        out.status("Stored version: (not set up)");
    } else {
        out.status(&format!("Stored version: {}", previous));
    }
    out.status(&format!("Target version: {}", target));
    out.blank();

    match plan {
        Some(plan) => print_plan(&plan, out),
        None if previous.is_unset() => {
            out.warning("This configuration was never set up. Run the initial setup first.")
        }
        None => out.success("Up to date"),
    }
    Ok(())
}
