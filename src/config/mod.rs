/// Application configuration module
use anyhow::Context;
use std::env;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub clash_api_url: String,
    pub clash_api_token: String,
    /// Bearer token guarding write routes; `None` disables writes entirely
    pub api_token: Option<String>,
    pub bind_addr: String,
    pub db_max_connections: u32,
    pub http_timeout_seconds: u64,
    /// Insert the demo clan and player at startup
    pub seed_demo: bool,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL").context("DATABASE_URL is required")?;

        let clash_api_url = env::var("CLASH_API_URL")
            .unwrap_or_else(|_| "https://api.clashofclans.com/v1".to_string());

        let clash_api_token = env::var("CLASH_API_TOKEN").unwrap_or_default();
        if clash_api_token.is_empty() {
            tracing::warn!("CLASH_API_TOKEN is not set, upstream requests will be rejected");
        }

        let api_token = env::var("API_TOKEN").ok().filter(|t| !t.is_empty());

        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        Ok(Self {
            database_url,
            clash_api_url,
            clash_api_token,
            api_token,
            bind_addr,
            db_max_connections: env_parse("DB_MAX_CONNECTIONS", 5),
            http_timeout_seconds: env_parse("HTTP_TIMEOUT_SECONDS", 30),
            seed_demo: env_parse("SEED_DEMO", false),
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}
