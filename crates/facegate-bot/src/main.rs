use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

mod config;
mod discord;
mod grant;
mod http;

use config::Config;
use discord::DiscordClient;
use grant::RoleGranter;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;

    let discord = DiscordClient::new(config.discord_api.clone(), &config.discord_token);
    let granter = RoleGranter::new(discord, config.role_name.clone());
    let app = http::router(http::AppState { granter: Arc::new(granter) });

    let listener = tokio::net::TcpListener::bind(config.listen)
        .await
        .with_context(|| format!("binding {}", config.listen))?;

    tracing::info!(listen = %config.listen, role = %config.role_name, "facegate-bot ready");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    tracing::info!("facegate-bot shutting down");
    Ok(())
}
