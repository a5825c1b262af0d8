//! Alliance Roster Backend
//!
//! Tracks active, banned and former players behind a small REST API, with
//! CSV or SQLite persistence and an optional push of the CSV files to GitHub.

mod api;
mod auth;
mod config;
mod errors;
mod models;
mod roster;
mod service;
mod store;
mod sync;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::Config;
use service::RosterService;
use sync::RemoteSync;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub roster: Arc<RosterService>,
    pub config: Arc<Config>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let registry = tracing_subscriber::registry().with(env_filter);
    if config.log_json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!("Starting Alliance Roster Backend");
    tracing::info!("Storage: {:?}", config.storage);
    tracing::info!("Bind address: {}", config.bind_addr);

    if config.api_psk.is_none() {
        tracing::warn!("No API PSK configured (ROSTER_API_PSK). Authentication is disabled!");
    }

    let store = store::open_store(&config.storage).await?;

    let sync = match &config.sync {
        Some(sync_config) => {
            tracing::info!(
                "Remote sync enabled: {} on {} branch",
                sync_config.repo,
                sync_config.branch
            );
            Some(Arc::new(RemoteSync::new(sync_config.clone())?))
        }
        None => None,
    };

    let roster = Arc::new(RosterService::open(store, sync).await?);

    let state = AppState {
        roster,
        config: Arc::new(config.clone()),
    };

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let psk = state.config.api_psk.clone();

    let api_routes = Router::new()
        // Roster
        .route("/roster", get(api::get_roster))
        .route(
            "/roster/{collection}",
            get(api::get_collection).delete(api::clear_collection),
        )
        .route("/players/{id}", get(api::get_player))
        // Form actions
        .route("/actions", post(api::submit_action))
        // Search
        .route("/search", get(api::search_players))
        // Remote sync
        .route("/sync", post(api::push_remote))
        .layer(middleware::from_fn(move |req, next| {
            auth::psk_auth_layer(psk.clone(), req, next)
        }));

    // Health check (no auth required)
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests;
