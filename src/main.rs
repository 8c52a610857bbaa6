use anyhow::Context;
use clap::Parser;
use portalink::cli::{self, Cli};
use portalink::infrastructure::config::Config;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let config = Config::load(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config.display()))?;

    config.init_logging();
    info!("portalink starting");

    cli::execute(cli, config).await?;

    info!("portalink stopped");
    Ok(())
}
