use anyhow::Result;
use clap::Parser;
use tracing::debug;

use moorage_cli::{
    cli::{Cli, Commands},
    commands, logging,
};
use moorage_config::MoorageConfig;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Configuration: defaults < file < MOORAGE_* environment
    let config = MoorageConfig::load(cli.config.as_deref())?;

    logging::init(cli.resolve_log_level(config.logging.level.as_deref()));
    debug!(?config, "effective configuration");

    let output = match &cli.command {
        Commands::Translate {
            query,
            models,
            pretty,
        } => commands::translate::execute(query, models, &config.translate, *pretty)?,
        Commands::Run {
            query,
            models,
            data,
            pretty,
        } => {
            commands::run::execute(query, models, data.as_deref(), &config.translate, *pretty)
                .await?
        }
    };

    println!("{}", output);
    Ok(())
}
