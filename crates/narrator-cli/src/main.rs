//! CLI entry point and composition root.

use anyhow::Result;
use clap::{CommandFactory, Parser};

use narrator_cli::handlers::{self, play::PlayArgs};
use narrator_cli::{Cli, CliContext, Commands, bootstrap};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    bootstrap::init(cli.verbose);

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    let ctx = CliContext::new(cli.data_dir.as_deref(), cli.server_url)?;

    match command {
        Commands::Play { file, from, resume } => {
            handlers::play::execute(&ctx, PlayArgs { file, from, resume }).await?;
        }
        Commands::Config { command } => {
            handlers::config::execute(&ctx, command).await?;
        }
    }

    Ok(())
}
