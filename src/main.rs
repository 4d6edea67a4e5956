use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use publishing_service::config::Config;
use publishing_service::security::TokenService;
use publishing_service::{build_router, db, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load()?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "publishing_service=debug,tower_http=info".into());
    if config.logging.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
    tracing::info!("Configuration loaded successfully");

    if config.uses_development_secret() {
        tracing::warn!("JWT__SECRET not set; signing tokens with the development secret");
    }

    let store = db::connect(&config).await?;
    tracing::info!(backend = ?config.database.backend, "Storage ready");

    let state = AppState::new(store, TokenService::from_config(&config.jwt));
    let app = build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutdown signal received");
}
