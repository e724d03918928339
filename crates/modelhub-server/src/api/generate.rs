//! Text generation endpoint

use std::time::Duration;

use axum::{extract::State, Json};
use serde::Serialize;
use tracing::info;

use crate::error::ApiError;
use crate::state::AppState;
use modelhub_core::{Error, GenerationRequest};

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub id: String,
    pub model: String,
    pub text: String,
    pub tokens: usize,
    pub latency_ms: u64,
    pub tokens_per_sec: f64,
    /// Set when the model runtime is unavailable; the request itself
    /// was well-formed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Run a text generation request with backpressure.
///
/// A missing runtime is reported in-band rather than as a transport
/// failure so polling clients can distinguish a bad request from a
/// capability gap.
pub async fn generate(
    State(state): State<AppState>,
    Json(request): Json<GenerationRequest>,
) -> Result<Json<GenerateResponse>, ApiError> {
    let _permit = state.acquire_permit().await;

    let id = request.id.clone();
    let model = request.model_id.clone();
    info!("Generation request {} for model {}", id, model);

    let timeout = Duration::from_secs(state.request_timeout_secs);
    let outcome = tokio::time::timeout(timeout, state.engine.generate(request))
        .await
        .map_err(|_| ApiError::internal("Request timeout"))?;

    match outcome {
        Ok(result) => Ok(Json(GenerateResponse {
            id: result.request_id,
            model,
            text: result.text,
            tokens: result.token_count,
            latency_ms: result.latency.as_millis() as u64,
            tokens_per_sec: result.tokens_per_second,
            error: None,
        })),
        Err(Error::BackendUnavailable(msg)) => Ok(Json(GenerateResponse {
            id,
            model,
            text: String::new(),
            tokens: 0,
            latency_ms: 0,
            tokens_per_sec: 0.0,
            error: Some(msg),
        })),
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppState;
    use axum::extract::State;
    use axum::http::StatusCode;
    use modelhub_core::{
        BackendFactory, DisabledBackendFactory, GatewayConfig, GatewayEngine, ModelBackend,
        ResolvedModel, SamplingOptions,
    };
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Instant;
    use tokio::sync::Semaphore;

    struct SlowBackend;

    impl ModelBackend for SlowBackend {
        fn run_text(
            &self,
            _prompt: &str,
            _sampling: &SamplingOptions,
        ) -> modelhub_core::Result<String> {
            std::thread::sleep(Duration::from_secs(3));
            Ok("too late".to_string())
        }

        fn run_chat_with_image(
            &self,
            _image: &[u8],
            _prompt: &str,
            _max_tokens: u32,
        ) -> modelhub_core::Result<String> {
            Ok(String::new())
        }
    }

    struct SlowFactory;

    impl BackendFactory for SlowFactory {
        fn construct(
            &self,
            _resolved: &ResolvedModel,
        ) -> modelhub_core::Result<Box<dyn ModelBackend>> {
            Ok(Box::new(SlowBackend))
        }
    }

    fn seed_weights(dir: &Path) {
        std::fs::write(dir.join("tinyllama.gguf"), b"gguf").unwrap();
    }

    async fn app_state(
        dir: &Path,
        factory: Arc<dyn BackendFactory>,
        timeout_secs: u64,
    ) -> AppState {
        let config = GatewayConfig {
            models_dir: dir.to_path_buf(),
            registry_path: dir.join("registry.json"),
            ..GatewayConfig::default()
        };
        AppState {
            engine: Arc::new(GatewayEngine::new(config, factory, None).await),
            request_semaphore: Arc::new(Semaphore::new(4)),
            request_timeout_secs: timeout_secs,
            started_at: Instant::now(),
        }
    }

    fn request(model: &str) -> GenerationRequest {
        GenerationRequest::new(model, "hi")
    }

    #[tokio::test]
    async fn slow_generation_is_cut_off_by_the_request_timeout() {
        let dir = tempfile::tempdir().unwrap();
        seed_weights(dir.path());
        let state = app_state(dir.path(), Arc::new(SlowFactory), 1).await;

        let err = generate(State(state), Json(request("tinyllama-1b-q4")))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.message.contains("timeout"));
    }

    #[tokio::test]
    async fn missing_runtime_is_reported_in_band() {
        let dir = tempfile::tempdir().unwrap();
        seed_weights(dir.path());
        let state = app_state(dir.path(), Arc::new(DisabledBackendFactory), 300).await;

        let Json(response) = generate(State(state), Json(request("tinyllama-1b-q4")))
            .await
            .unwrap();
        assert!(response.error.is_some());
        assert!(response.text.is_empty());
        assert_eq!(response.tokens, 0);
    }

    #[tokio::test]
    async fn unknown_model_is_a_transport_error() {
        let dir = tempfile::tempdir().unwrap();
        seed_weights(dir.path());
        let state = app_state(dir.path(), Arc::new(SlowFactory), 300).await;

        let err = generate(State(state), Json(request("unknown-model")))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }
}
