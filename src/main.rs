/// Clan capital data service: Clash of Clans proxy with clan/player storage
mod auth;
mod clients;
mod config;
mod domain;
mod errors;
mod handlers;
mod raids;
mod repo;
mod routes;
mod services;
mod utils;

use crate::clients::ClashClient;
use crate::config::AppConfig;
use crate::handlers::AppState;
use crate::repo::{init_db, ClanRepo, PlayerRepo};
use crate::routes::build_router;
use crate::services::{ClanService, PlayerService, RaidService};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    // Load configuration
    let config = AppConfig::from_env()?;
    info!("Configuration loaded successfully");

    // Initialize database connection pool
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await?;
    info!("Database connection pool established");

    init_db(&pool).await?;
    info!("Database schema initialized");

    // Repositories and the shared upstream client
    let clan_repo = ClanRepo::new(pool.clone());
    let player_repo = PlayerRepo::new(pool.clone());
    let clash_client = Arc::new(ClashClient::new(
        &config.clash_api_url,
        config.clash_api_token.clone(),
        Duration::from_secs(config.http_timeout_seconds),
    )?);

    if config.api_token.is_none() {
        tracing::warn!("API_TOKEN is not set, write routes will reject every request");
    }

    let clan_service = Arc::new(ClanService::new(clan_repo, clash_client.clone()));
    let player_service = Arc::new(PlayerService::new(player_repo, clash_client.clone()));

    if config.seed_demo {
        let clan_seeded = clan_service.seed_demo().await?;
        let player_seeded = player_service.seed_demo().await?;
        info!(clan_seeded, player_seeded, "Demo data seeded");
    }

    let state = AppState {
        clan_service,
        player_service,
        raid_service: Arc::new(RaidService::new(clash_client)),
        api_token: config.api_token.as_deref().map(Arc::from),
    };

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("clan_capital service listening on {}", config.bind_addr);

    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}
