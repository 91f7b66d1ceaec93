//! Check command - lints workflow definitions without calling any backend

use std::path::PathBuf;

use clap::Args;
use tracing::debug;

use crate::domain::{lint_workflow, Severity};
use crate::infrastructure::DefinitionSet;

/// Arguments for the check command
#[derive(Args, Clone, Debug)]
pub struct CheckArgs {
    /// JSON file holding skill and workflow definitions
    #[arg(long)]
    pub definitions: PathBuf,
}

pub async fn run(args: CheckArgs) -> anyhow::Result<()> {
    super::bootstrap()?;

    let definitions = DefinitionSet::from_file(&args.definitions)?;
    let mut errors = 0;

    for workflow in &definitions.workflows {
        let issues = lint_workflow(workflow, &definitions.skills);
        debug!(workflow_id = %workflow.id(), issues = issues.len(), "Checked workflow");

        if issues.is_empty() {
            println!("{}: ok", workflow.id());
            continue;
        }

        println!("{}:", workflow.id());
        for issue in &issues {
            println!("  {}", issue);
        }

        errors += issues
            .iter()
            .filter(|i| i.severity == Severity::Error)
            .count();
    }

    if errors > 0 {
        anyhow::bail!("{} definition error(s) found", errors);
    }

    Ok(())
}
