//! CLI module for the skill workflow engine
//!
//! Subcommands:
//! - `run`: execute one workflow and stream its progress
//! - `batch`: execute one workflow once per CSV row
//! - `render`: render a prompt template
//! - `check`: lint every workflow in a definitions file

pub mod batch;
pub mod check;
pub mod render;
pub mod run;

use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::config::AppConfig;
use crate::domain::SkillRegistry;
use crate::infrastructure::llm::AdapterRegistry;
use crate::infrastructure::logging::init_logging;
use crate::infrastructure::workflow::{SkillStepExecutor, WorkflowRunner};
use crate::infrastructure::DefinitionSet;

/// Skill workflow engine - chains prompt skills across LLM backends
#[derive(Parser)]
#[command(name = "skill-workflow")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run a workflow and stream its progress
    Run(run::RunArgs),

    /// Run a workflow once per row of a CSV file
    Batch(batch::BatchArgs),

    /// Render a template against key=value pairs
    Render(render::RenderArgs),

    /// Check workflow definitions for problems
    Check(check::CheckArgs),
}

/// Load `.env` and layered configuration, then install logging
pub(crate) fn bootstrap() -> anyhow::Result<AppConfig> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().unwrap_or_default();
    init_logging(&config.logging)?;

    Ok(config)
}

/// Runner wired to real provider adapters and the skills in `definitions`
pub(crate) fn build_runner(
    config: &AppConfig,
    definitions: &DefinitionSet,
) -> anyhow::Result<WorkflowRunner> {
    let skills: Arc<dyn SkillRegistry> = Arc::new(definitions.skill_registry());
    let adapters = AdapterRegistry::from_config(&config.providers)?;
    let executor = SkillStepExecutor::new(skills.clone(), adapters);

    Ok(WorkflowRunner::new(Arc::new(executor), skills).with_config(&config.runner))
}

/// Parse a `key=value` argument
pub(crate) fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", s))?;

    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in '{}'", s));
    }

    Ok((key.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_value() {
        assert_eq!(
            parse_key_value("topic=cats = dogs"),
            Ok(("topic".to_string(), "cats = dogs".to_string()))
        );
        assert_eq!(
            parse_key_value("empty="),
            Ok(("empty".to_string(), String::new()))
        );
        assert!(parse_key_value("novalue").is_err());
        assert!(parse_key_value("=x").is_err());
    }

    #[test]
    fn test_cli_parses_run() {
        let cli = Cli::try_parse_from([
            "skill-workflow",
            "run",
            "--definitions",
            "defs.json",
            "--workflow",
            "blog",
            "--input",
            "topic=cats",
            "--json",
        ])
        .unwrap();

        match cli.command {
            Command::Run(args) => {
                assert_eq!(args.workflow, "blog");
                assert_eq!(args.inputs, vec![("topic".to_string(), "cats".to_string())]);
                assert!(args.json);
            }
            _ => panic!("expected run command"),
        }
    }
}
