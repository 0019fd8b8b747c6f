// Main entry point - Dependency injection and server setup
use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use trailmap::application::live_relay::LiveRelay;
use trailmap::application::track_service::TrackService;
use trailmap::application::track_store::TrackStore;
use trailmap::infrastructure::config::load_settings;
use trailmap::presentation::app_state::AppState;
use trailmap::presentation::router::build_router;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug")),
        )
        .init();

    // Load configuration
    let settings = load_settings()?;

    // Tracks live in memory for the life of the process
    let store = Arc::new(TrackStore::new());
    let relay = LiveRelay::new(settings.relay.channel_capacity);
    let track_service =
        TrackService::new(store, relay.clone(), settings.tracks.default_clients.clone());

    if settings.admin.key.is_none() {
        info!("No admin key configured, admin reads are disabled");
    }

    // Create application state
    let state = Arc::new(AppState {
        track_service,
        relay,
        admin_key: settings.admin.key.clone(),
    });

    let router = build_router(state);

    // Start server
    let addr: SocketAddr = settings
        .server
        .bind_address()
        .parse()
        .with_context(|| format!("invalid bind address {}", settings.server.bind_address()))?;
    info!("Starting trailmap server on {}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router).await?;

    Ok(())
}
