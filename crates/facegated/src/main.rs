use std::sync::Arc;

use anyhow::{Context, Result};
use facegate_core::{CredentialVerifier, FaceMatcher, OnnxFaceEncoder};
use facegate_store::UserStore;
use tracing_subscriber::EnvFilter;

mod config;
mod engine;
mod http;
mod notifier;
mod service;

use config::Config;
use notifier::HttpRoleNotifier;
use service::VerificationService;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("facegated starting");

    let config = Config::from_env()?;

    // Load models before binding so a missing model fails fast.
    let encoder = OnnxFaceEncoder::load(&config.scrfd_model_path(), &config.arcface_model_path())
        .context("loading face models")?;
    let engine = engine::spawn_engine(Box::new(encoder))?;

    let store = UserStore::open(&config.db_path).await?;
    let notifier = HttpRoleNotifier::new(config.notify_url.clone(), config.notify_timeout)?;

    let service = VerificationService::new(
        CredentialVerifier::new(&config.jwt_secret)?,
        engine,
        store,
        FaceMatcher::new(config.match_tolerance),
        Arc::new(notifier),
    );

    let app = http::router(http::AppState { service: Arc::new(service) }, config.max_upload_bytes);
    let listener = tokio::net::TcpListener::bind(config.listen)
        .await
        .with_context(|| format!("binding {}", config.listen))?;

    tracing::info!(
        listen = %config.listen,
        db = %config.db_path.display(),
        tolerance = config.match_tolerance,
        notify_url = %config.notify_url,
        "facegated ready"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    tracing::info!("facegated shutting down");
    Ok(())
}
