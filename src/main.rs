mod config;
mod models;
mod routes;
mod services;

use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::services::{
    accounts::AccountDirectory, catalog_cache::CatalogCache, m3u_parser::M3UParser,
    query::QueryService, source::SourceResolver,
};

/// Application state shared across handlers
pub struct AppState {
    pub config: Config,
    pub accounts: Arc<AccountDirectory>,
    pub query: QueryService,
    pub start_time: Instant,
}

/// Build the router over shared state
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        // Health endpoints
        .route("/", get(routes::health::root))
        .route("/health", get(routes::health::health_check))
        .route("/metrics", get(routes::health::metrics))
        .route("/ready", get(routes::health::ready))
        .route("/live", get(routes::health::live))
        // Xtream Player API
        .route("/player_api.php", get(routes::xtream::player_api))
        // Playback redirects
        .route(
            "/live/:username/:password/:stream",
            get(routes::streams::live_stream),
        )
        .route(
            "/movie/:username/:password/:stream",
            get(routes::streams::movie_stream),
        )
        .route(
            "/series/:username/:password/:stream",
            get(routes::streams::series_stream),
        )
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing/logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "xtream_catalog=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let config = Config::from_env();
    let port = config.port;

    tracing::info!("Starting Xtream Catalog Server v{}", env!("CARGO_PKG_VERSION"));

    let accounts = Arc::new(AccountDirectory::load(&config.accounts_file).await?);

    let resolver = SourceResolver::new(accounts.clone(), config.fetch_limits())?;
    let parser = M3UParser::new(config.catalog_limits());
    let cache = CatalogCache::new(Arc::new(resolver), parser, config.catalog_ttl());
    tracing::info!(
        ttl_secs = config.catalog_ttl().as_secs(),
        max_live = config.max_live,
        max_movie = config.max_movie,
        max_series = config.max_series,
        "Catalog cache initialized"
    );

    let state = Arc::new(AppState {
        config,
        accounts,
        query: QueryService::new(cache),
        start_time: Instant::now(),
    });

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(state)).await?;

    Ok(())
}
