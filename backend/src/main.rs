//! Flood Warning System - Backend Server
//!
//! Predicts per-ward flood risk on a schedule and serves the results.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use flood_warning_backend::{
    artifacts::FsArtifactRepository,
    create_app, scheduler,
    services::{event_channel, AlertDispatcher},
    stores::Stores,
    AppState, Config,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "fws_server=debug,flood_warning_backend=debug,tower_http=debug,sqlx=warn".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::load()?;
    let variant = config.model.variant()?;

    tracing::info!("Starting Flood Warning System Server");
    tracing::info!("Environment: {}", config.environment);
    tracing::info!(
        variant = %variant.name,
        version = %variant.version,
        profile = variant.profile.as_str(),
        "Model variant selected"
    );

    // Create database connection pool
    tracing::info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(Duration::from_secs(30))
        .connect(&config.database.url)
        .await
        .context("connecting to database")?;

    tracing::info!("Database connection established");

    // Run migrations in development
    if config.environment == "development" {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("./migrations").run(&db_pool).await?;
        tracing::info!("Migrations completed");
    }

    let stores = Stores::postgres(db_pool.clone());
    let artifacts = Arc::new(FsArtifactRepository::new(&config.model.artifact_dir));

    let (events_tx, events_rx) = event_channel();
    AlertDispatcher::new(stores.alerts.clone()).spawn(events_rx);

    let config = Arc::new(config);
    let state = AppState::new(
        config.clone(),
        Some(db_pool),
        stores,
        variant,
        artifacts,
        events_tx,
    );

    if config.model.train_on_startup {
        if let Some(outcome) = state.model.ensure_trained().await {
            tracing::info!(
                success = outcome.success,
                reason = outcome.reason.as_deref().unwrap_or(""),
                "Startup training finished"
            );
        }
    }

    if config.scheduler.enabled {
        scheduler::spawn(state.cycle.clone(), config.scheduler.interval());
    }

    // Build application
    let app = create_app(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
