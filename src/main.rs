//! Global Mass Rollback Backend
//!
//! Aggregates a global account's newest standing edits across every wiki it is
//! merged into and rolls back a selected subset, one wiki call at a time.

mod aggregator;
mod api;
mod auth;
mod config;
mod errors;
mod identity;
mod models;
mod remote;
mod rollback;

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

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// Outbound client carrying the timeout and User-Agent policy.
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self, errors::AppError> {
        let http = remote::build_http_client(&config)?;
        Ok(Self {
            config: Arc::new(config),
            http,
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Global Mass Rollback Backend");
    tracing::info!("Coordinating endpoint: {}", config.meta_api_url);
    tracing::info!(
        limit = config.edit_limit,
        workers = config.max_workers,
        page_size = config.page_size,
        rollback_delay_ms = config.rollback_delay.as_millis() as u64,
        timeout_secs = config.request_timeout.as_secs(),
        "Aggregation settings"
    );
    tracing::info!("Bind address: {}", config.bind_addr);

    // Warn if PSK is not configured
    if config.api_psk.is_none() {
        tracing::warn!("No API PSK configured (GMR_API_PSK). Service gate is disabled!");
    }
    if config.consumer_key.is_none() || config.consumer_secret.is_none() {
        tracing::warn!(
            "No OAuth consumer configured (GMR_CONSUMER_KEY/GMR_CONSUMER_SECRET). Rollback is unavailable!"
        );
    }

    let bind_addr = config.bind_addr;
    let state = AppState::new(config)?;

    // Build router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Server listening on {}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Clone PSK for the auth layer
    let psk = state.config.api_psk.clone();

    // API routes
    let api_routes = Router::new()
        .route(
            "/accounts/{username}/systems",
            get(api::list_account_systems),
        )
        .route("/contributions", post(api::aggregate_contributions))
        .route("/rollback", post(api::rollback_edits))
        // Apply PSK auth middleware
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
