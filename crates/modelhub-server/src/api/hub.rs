//! Hub registry endpoints: model card listing, registration, and
//! weight file download.

use std::path::PathBuf;

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::Response,
    Json,
};
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;
use tracing::info;

use crate::error::ApiError;
use crate::state::AppState;
use modelhub_core::ModelCard;

#[derive(Debug, Serialize)]
pub struct ModelListResponse {
    pub models: Vec<ModelCard>,
    pub count: usize,
}

/// List all registered model cards.
pub async fn list_models(State(state): State<AppState>) -> Json<ModelListResponse> {
    let models = state.engine.list_models().await;
    let count = models.len();
    Json(ModelListResponse { models, count })
}

/// Fetch a single model card by id.
pub async fn get_model(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ModelCard>, ApiError> {
    state
        .engine
        .get_model(&id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Model '{id}' is not registered")))
}

/// Register a new model card, or replace an existing one by id.
pub async fn register_model(
    State(state): State<AppState>,
    Json(card): Json<ModelCard>,
) -> Result<(StatusCode, Json<ModelCard>), ApiError> {
    if card.name.trim().is_empty() {
        return Err(ApiError::bad_request("Model name must not be empty"));
    }

    let stored = state.engine.register_model(card).await?;
    info!("Registered model card {:?}", stored.id);
    Ok((StatusCode::CREATED, Json(stored)))
}

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    /// Filename within the card; defaults to the first file.
    pub file: Option<String>,
}

/// Stream a model weight file to the client.
pub async fn download_model(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, ApiError> {
    let card = state
        .engine
        .get_model(&id)
        .await
        .ok_or_else(|| ApiError::not_found(format!("Model '{id}' is not registered")))?;

    let entry = match &query.file {
        Some(name) => card.files.iter().find(|f| &f.filename == name),
        None => card.files.first(),
    }
    .ok_or_else(|| ApiError::not_found(format!("Model '{id}' has no matching file")))?;

    let path = PathBuf::from(&entry.path);
    let file = tokio::fs::File::open(&path)
        .await
        .map_err(|e| ApiError::not_found(format!("Cannot open {}: {e}", path.display())))?;

    let stream = ReaderStream::new(file);
    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", entry.filename),
        )
        .body(Body::from_stream(stream))
        .map_err(|e| ApiError::internal(format!("Failed building download response: {e}")))?;

    Ok(response)
}
