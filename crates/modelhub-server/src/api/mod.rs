//! API routes and handlers

mod generate;
mod health;
mod hub;
mod vision;

use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use modelhub_core::ServerConfig;

/// Uploaded images ride in multipart bodies; allow up to 32 MiB.
const MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

/// Create the main API router
pub fn create_router(state: AppState, server: &ServerConfig) -> Router {
    let api_routes = Router::new()
        // Service status
        .route("/health", get(health::health_check))
        .route("/info", get(health::info))
        // Hub registry
        .route("/hub/models", get(hub::list_models))
        .route("/hub/models", post(hub::register_model))
        .route("/hub/models/:id", get(hub::get_model))
        .route("/hub/models/:id/download", get(hub::download_model))
        // Text generation
        .route("/generate", post(generate::generate))
        // Vision
        .route("/vision/preload", post(vision::preload))
        .route("/vision/analyze", post(vision::analyze))
        .route("/vision/pipeline", post(vision::pipeline));

    Router::new()
        .nest("/api/v1", api_routes)
        // Serve static files for UI
        .fallback_service(
            tower_http::services::ServeDir::new("webapp")
                .fallback(tower_http::services::ServeFile::new("webapp/index.html")),
        )
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(server))
        .with_state(state)
}

/// Build the CORS layer from configuration. Disabled CORS yields a
/// layer that adds no allow headers.
fn cors_layer(server: &ServerConfig) -> CorsLayer {
    if !server.cors_enabled {
        return CorsLayer::new();
    }

    if server.allows_any_origin() {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let origins: Vec<HeaderValue> = server
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}
