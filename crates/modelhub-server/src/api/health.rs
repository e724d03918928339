//! Service status endpoints

use axum::{extract::State, Json};
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_seconds: u64,
    /// Model identities resident in the cache, as "id/mode".
    pub loaded_models: Vec<String>,
}

/// Liveness probe with a view of the model cache.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let loaded_models = state
        .engine
        .loaded_models()
        .await
        .iter()
        .map(|identity| identity.to_string())
        .collect();

    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        loaded_models,
    })
}

#[derive(Debug, Serialize)]
pub struct InfoResponse {
    pub version: &'static str,
    pub device: &'static str,
    pub threads: u32,
    pub models_dir: String,
    pub registered_models: usize,
}

/// Static runtime configuration for clients and the UI.
pub async fn info(State(state): State<AppState>) -> Json<InfoResponse> {
    let config = state.engine.config();

    Json(InfoResponse {
        version: env!("CARGO_PKG_VERSION"),
        device: if config.n_gpu_layers > 0 { "gpu" } else { "cpu" },
        threads: config.n_threads,
        models_dir: config.models_dir.display().to_string(),
        registered_models: state.engine.list_models().await.len(),
    })
}
