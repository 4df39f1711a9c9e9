use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use yieldpools::application::{Cli, CommandExecutor, Commands};
use yieldpools::shared::config::{ConfigLoader, YieldConfig};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let cli = Cli::parse();

    // The APY helper runs without a config file
    let config = match cli.command {
        Commands::Apy { .. } => YieldConfig::default(),
        _ => ConfigLoader::load_from(&cli.config)?,
    };
    CommandExecutor::execute(cli.command, config).await?;

    Ok(())
}
