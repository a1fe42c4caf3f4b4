//! HTTP API: routing, shared state, and the server entry point.

pub mod agent;
pub mod types;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::agent::Planner;
use crate::config::Config;
use crate::logging::request_id_middleware;

/// Shared application state, built once at startup.
pub struct AppState {
    pub config: Config,
    pub planner: Planner,
}

/// Build the service router over the given state.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(agent::root))
        .route("/health", get(agent::health))
        .route("/plan", get(agent::direct_plan))
        .route("/agent", post(agent::run_agent))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind the configured address and serve until shutdown.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let planner = Planner::new(&config);
    let state = Arc::new(AppState { config, planner });

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);
    axum::serve(listener, router(state)).await?;

    Ok(())
}
