mod app_state;
mod config;
mod error;
mod middleware;
mod models;
mod provider;
mod routes;
mod services;

use app_state::AppState;
use config::Config;
use models::entitlement::IdentityMode;
use routes::create_router;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,backturly=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Fakturly Backend (backturly)");

    // Load configuration
    let config = Config::load()?;

    tracing::info!(
        "Loaded configuration - Server: {}:{}",
        config.server.host,
        config.server.port
    );

    // Initialize application state
    let state = AppState::new(config.clone()).await?;

    // The purchase provider is configured once per process; sessions that
    // authenticate later go through the identity linker, and snapshot
    // consumers check purchaser attribution before serving or persisting.
    let purchaser = state.provider.configure(IdentityMode::Anonymous).await?;
    tracing::info!("Purchase provider configured for purchaser {}", purchaser);

    // Create router
    let app = create_router(state);

    // Create server address
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);

    // Start server
    axum::serve(listener, app).await?;

    Ok(())
}
