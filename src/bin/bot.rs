use anyhow::Result;
use dotenvy::dotenv;
use log::{error, info};
use std::sync::Arc;

use music_bot::core::{Config, SqliteStore};
use music_bot::features::startup::{process_stages, BootContext, Orchestrator, CRITICAL_EXIT_CODE};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    let config = Config::load()?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log_level))
        .init();

    info!("Starting music bot...");

    let store = Arc::new(SqliteStore::new(config.database_path.clone()));
    let stage_timeout = config.stage_timeout;
    let mut ctx = BootContext::new(config, store);

    let bootstrap = Orchestrator::new("Bootstrap", process_stages(), stage_timeout);
    if let Err(e) = bootstrap.run(&mut ctx).await {
        error!("💥 Critical initialization failure: {e}");
        std::process::exit(e.exit_code());
    }

    let Some(mut client) = ctx.client.take() else {
        error!("💥 Bootstrap finished without a platform client");
        std::process::exit(CRITICAL_EXIT_CODE);
    };

    info!("Establishing WebSocket connection to Discord gateway...");

    if let Err(why) = client.start().await {
        error!("Gateway connection failed: {why:?}");
        error!("This could be due to:");
        error!("  - Invalid bot token");
        error!("  - Network connectivity issues");
        error!("  - Discord API outage");
        std::process::exit(CRITICAL_EXIT_CODE);
    }

    Ok(())
}
