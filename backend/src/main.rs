//! Library Gateway - GraphQL federation layer for the library services
//!
//! This is the main entry point for the gateway.
//! All operations are exposed via GraphQL at /graphql.

use std::net::SocketAddr;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use library_gateway::config::Config;
use library_gateway::{AppState, router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "library_gateway=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    tracing::info!("Starting Library Gateway");

    let config = Config::from_env()?;
    tracing::info!(
        backend_mode = ?config.backend_mode,
        loan_period_days = config.loan_period_days,
        batch_delay_ms = config.loader_batch_delay.as_millis() as u64,
        "Configuration loaded"
    );

    let state = AppState::from_config(&config)?;
    tracing::info!("GraphQL schema built");

    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let public_host = config.host.as_deref().unwrap_or("localhost");
    tracing::info!("Listening on {}", addr);
    tracing::info!("GraphQL playground: http://{}:{}/graphql", public_host, config.port);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
