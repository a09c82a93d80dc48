mod config;
mod db;
mod errors;
mod models;
mod render;
mod resume;
mod routes;
mod state;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::db::connect_store;
use crate::render::{executor_for, AssetBundle, BuildPipeline, WorkspaceManager};
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first; build strategy and asset root are fixed from here on
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting resume-api v{}", env!("CARGO_PKG_VERSION"));

    // Initialize Resume Store
    let store = connect_store(config.database_url.as_deref()).await?;

    // Verify the asset bundle before accepting builds
    let assets = AssetBundle::new(&config.assets_path);
    assets
        .verify()
        .with_context(|| format!("asset bundle at {:?} is incomplete", config.assets_path))?;
    info!("Asset bundle: {:?}", config.assets_path);

    // Initialize build pipeline (one executor strategy per process)
    let executor = executor_for(config.build_strategy, &config.executor_settings());
    let pipeline = BuildPipeline::new(
        WorkspaceManager::new(&config.scratch_root, assets),
        executor,
        config.build_timeout,
        config.max_concurrent_builds,
    )
    .with_queue_timeout(config.queue_timeout);
    info!(
        "Build pipeline: strategy={} timeout={}s queue_timeout={}s max_concurrent={} scratch={:?}",
        config.build_strategy,
        config.build_timeout.as_secs(),
        config.queue_timeout.as_secs(),
        config.max_concurrent_builds,
        config.scratch_root
    );

    // Build app state
    let state = AppState {
        store,
        pipeline: Arc::new(pipeline),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict CORS to the editor origin once it is configurable

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
