mod cleanup;
mod config;
mod preflight;
mod webhook;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Router, routing::post};
use tower_http::trace::TraceLayer;
use tracing::info;

use topicgram_db::Database;
use topicgram_relay::{Catalog, Relay};
use topicgram_telegram::BotClient;

use crate::config::{Config, WEBHOOK_PATH};
use crate::webhook::WebhookState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "topicgram=info,topicgram_relay=debug,tower_http=info".into()),
        )
        .init();

    let config = Config::from_env()?;

    let db = Arc::new(Database::open(&config.db_path)?);
    let client = BotClient::new(&config.api_url, &config.bot_token, config.proxy.as_deref())?;

    let identity = preflight::check(&client, &config).await?;
    preflight::register(&client, &config).await?;

    let relay_config = config.relay_config();
    tokio::spawn(cleanup::run_cleanup_loop(
        db.clone(),
        config.retention,
        relay_config.challenge_validity,
    ));

    let relay = Relay::new(relay_config, identity, db, Arc::new(client), Arc::new(Catalog));
    let state = WebhookState::new(relay, config.webhook_secret());

    let app = Router::new()
        .route(WEBHOOK_PATH, post(webhook::receive))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Topicgram listening on {} for group {}", addr, config.group_id);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
