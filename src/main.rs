mod catalog;
mod commands;
mod config;
mod db;
mod engine;
mod handlers;
mod roles;
mod tasks;
mod ui;
mod utils;

use anyhow::Context as _;
use dotenvy::dotenv;
use serenity::all::{Client, GatewayIntents};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use crate::catalog::Catalog;
use crate::config::Config;
use crate::db::repo::PgStore;
use crate::engine::Engine;
use crate::handlers::{ConfigKey, EngineKey, Handler};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Arc::new(Config::from_env()?);
    let catalog = Arc::new(Catalog::builtin().context("invalid built-in catalog")?);

    let pool = db::init_pool(&config.database_url, config.db_max_connections)
        .await
        .context("connecting to the database")?;
    let engine = Arc::new(Engine::new(
        Arc::new(PgStore::new(pool)),
        catalog,
        config.milestone_policy,
    ));
    tracing::info!(policy = ?engine.policy(), "engine ready");

    let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_MEMBERS;
    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(Handler::new(engine.clone()))
        .type_map_insert::<EngineKey>(engine)
        .type_map_insert::<ConfigKey>(config.clone())
        .await
        .context("creating Discord client")?;

    client.start().await?;
    Ok(())
}
