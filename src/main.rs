use clap::Parser;
use skill_workflow_engine::cli::{self, Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run(args) => cli::run::run(args).await,
        Command::Batch(args) => cli::batch::run(args).await,
        Command::Render(args) => cli::render::run(args).await,
        Command::Check(args) => cli::check::run(args).await,
    }
}
