//! # Ratewall Server
//!
//! Actix-web server that rate limits every request per client before it
//! reaches the demo handler.

use actix_web::{App, HttpServer, web};
use anyhow::Context;
use tracing_actix_web::TracingLogger;

mod config;
mod handlers;
mod middleware;
mod state;
mod telemetry;

use config::AppConfig;
use middleware::RateLimitMiddleware;
use state::AppState;
use telemetry::TelemetryConfig;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    telemetry::init_telemetry(&TelemetryConfig::from_env());

    let config = AppConfig::from_env().context("Failed to load configuration")?;

    tracing::info!(
        host = %config.host,
        port = config.port,
        ip_threshold = config.limiter.ip_threshold,
        token_threshold = config.limiter.token_threshold,
        block_secs = config.limiter.block_duration.as_secs(),
        failure_policy = %config.limiter.failure_policy,
        store = config.store.as_str(),
        "Starting Ratewall server"
    );

    let state = AppState::new(&config)
        .await
        .context("Failed to initialize store")?;

    HttpServer::new(move || {
        App::new()
            .wrap(RateLimitMiddleware::new(state.limiter.clone()))
            .wrap(TracingLogger::default())
            .app_data(web::Data::new(state.clone()))
            .configure(handlers::configure_routes)
    })
    .bind((config.host.as_str(), config.port))
    .with_context(|| format!("Failed to bind {}:{}", config.host, config.port))?
    .run()
    .await?;

    Ok(())
}
