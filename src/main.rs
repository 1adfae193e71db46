use dotenvy::dotenv;
use serenity::all::{Client, GatewayIntents, Http};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use giveaway_bot::config::BotConfig;
use giveaway_bot::db;
use giveaway_bot::giveaway::GiveawayService;
use giveaway_bot::handlers::Handler;
use giveaway_bot::transport::SerenityTransport;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = BotConfig::from_env()?;
    let store = db::open_store(&config.storage).await?;
    info!(admins = config.service.admin_ids.len(), "configuration loaded");

    let http = Arc::new(Http::new(&config.discord_token));
    let transport = Arc::new(SerenityTransport::new(http));
    let service = GiveawayService::new(transport, store, config.service);

    // slash commands and button clicks arrive as interactions; no message content needed
    let intents = GatewayIntents::GUILDS;
    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(Handler::new(service))
        .await?;

    client.start().await?;
    Ok(())
}
