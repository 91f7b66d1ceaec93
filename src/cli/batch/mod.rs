//! Batch command - runs one workflow per CSV row and writes a results CSV

use std::collections::HashMap;
use std::path::PathBuf;

use clap::Args;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::domain::Credentials;
use crate::infrastructure::workflow::{export_results_csv, parse_csv_rows, BatchRunner};
use crate::infrastructure::DefinitionSet;

/// Arguments for the batch command
#[derive(Args, Clone, Debug)]
pub struct BatchArgs {
    /// JSON file holding skill and workflow definitions
    #[arg(long)]
    pub definitions: PathBuf,

    /// Workflow to run for every row
    #[arg(long)]
    pub workflow: String,

    /// CSV file whose header names the columns
    #[arg(long)]
    pub csv: PathBuf,

    /// CSV column to global input mapping; columns map by name when omitted
    #[arg(long = "map", value_name = "COLUMN=INPUT", value_parser = super::parse_key_value)]
    pub mappings: Vec<(String, String)>,

    /// Where to write the results CSV; stdout when omitted
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Maximum rows running at once (overrides config)
    #[arg(long)]
    pub concurrency: Option<usize>,
}

pub async fn run(args: BatchArgs) -> anyhow::Result<()> {
    let config = super::bootstrap()?;
    let definitions = DefinitionSet::from_file(&args.definitions)?;
    let workflow = definitions.workflow(&args.workflow)?;

    let text = std::fs::read_to_string(&args.csv)?;
    let mapping: HashMap<String, String> = args.mappings.into_iter().collect();
    let rows = parse_csv_rows(&text, &mapping);

    if rows.is_empty() {
        anyhow::bail!("no input rows found in {}", args.csv.display());
    }

    let mut batch = BatchRunner::new(super::build_runner(&config, &definitions)?)
        .with_config(&config.runner);
    if let Some(concurrency) = args.concurrency {
        batch = batch.with_concurrency(concurrency);
    }

    let token = CancellationToken::new();
    let watcher = {
        let token = token.clone();
        tokio::spawn(async move {
            if signal::ctrl_c().await.is_ok() {
                warn!("Received Ctrl+C, cancelling remaining rows");
                token.cancel();
            }
        })
    };

    let report = batch
        .run(workflow, rows, &Credentials::from_env(), &token)
        .await;
    watcher.abort();

    let csv = export_results_csv(workflow, &report.items);
    match &args.output {
        Some(path) => {
            std::fs::write(path, csv)?;
            info!(path = %path.display(), "Results written");
        }
        None => println!("{}", csv),
    }

    let summary = &report.summary;
    eprintln!(
        "{} rows: {} completed, {} failed, {} cancelled ({:.0}% success)",
        summary.total, summary.completed, summary.failed, summary.cancelled, summary.success_rate
    );

    Ok(())
}
