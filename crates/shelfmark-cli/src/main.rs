use anyhow::Result;
use clap::Parser;
use shelfmark_cli::{
    cli::{Cli, Commands},
    commands, logging,
};
use shelfmark_config::ShelfmarkConfig;
use tracing::debug;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.level_filter());

    let config = ShelfmarkConfig::load_or_default(cli.config.as_deref())?;
    debug!(provider = config.provider.kind.as_str(), model = %config.provider.model(), "Configuration loaded");

    match cli.command {
        Commands::Enrich(args) => commands::enrich::execute(config, args).await?,
    }

    Ok(())
}
