//! Vision endpoints: preload, single-stage analysis, and the
//! detection + description pipeline.

use std::time::Duration;

use axum::{
    extract::{Multipart, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;
use modelhub_core::{Detection, Error, StageErrors};

const DEFAULT_VISION_MODEL: &str = "llava-v1.6-7b-q4";
const DEFAULT_PROMPT: &str = "What's in this image?";
const DEFAULT_MAX_TOKENS: u32 = 150;

#[derive(Debug, Deserialize)]
pub struct PreloadRequest {
    #[serde(default = "default_vision_model")]
    pub model: String,
}

fn default_vision_model() -> String {
    DEFAULT_VISION_MODEL.to_string()
}

#[derive(Debug, Serialize)]
pub struct PreloadResponse {
    pub status: &'static str,
    pub model: String,
    pub load_time_seconds: f64,
    pub message: String,
}

/// Load a vision model ahead of the first analyze request.
pub async fn preload(
    State(state): State<AppState>,
    Json(request): Json<PreloadRequest>,
) -> Result<Json<PreloadResponse>, ApiError> {
    let report = state.engine.preload_vision(&request.model).await?;

    let message = if report.already_loaded {
        format!("{} was already loaded", report.identity)
    } else {
        format!("{} loaded", report.identity)
    };
    info!("{}", message);

    Ok(Json(PreloadResponse {
        status: "ok",
        model: request.model,
        load_time_seconds: report.load_time.as_secs_f64(),
        message,
    }))
}

/// Parsed fields shared by the vision upload endpoints.
#[derive(Debug)]
struct VisionUpload {
    image: Vec<u8>,
    model: String,
    prompt: String,
    max_tokens: u32,
}

async fn parse_vision_upload(
    mut multipart: Multipart,
    default_prompt: &str,
) -> Result<VisionUpload, ApiError> {
    let mut image: Option<Vec<u8>> = None;
    let mut model = DEFAULT_VISION_MODEL.to_string();
    let mut prompt = default_prompt.to_string();
    let mut max_tokens = DEFAULT_MAX_TOKENS;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Failed reading multipart field: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "image" => {
                let bytes = field.bytes().await.map_err(|e| {
                    ApiError::bad_request(format!("Failed reading multipart 'image' field: {e}"))
                })?;
                if bytes.is_empty() {
                    return Err(ApiError::bad_request("Multipart 'image' field is empty"));
                }
                image = Some(bytes.to_vec());
            }
            "model" => {
                let text = field.text().await.map_err(|e| {
                    ApiError::bad_request(format!("Failed reading multipart 'model' field: {e}"))
                })?;
                let value = text.trim();
                if !value.is_empty() {
                    model = value.to_string();
                }
            }
            "prompt" => {
                let text = field.text().await.map_err(|e| {
                    ApiError::bad_request(format!("Failed reading multipart 'prompt' field: {e}"))
                })?;
                let value = text.trim();
                if !value.is_empty() {
                    prompt = value.to_string();
                }
            }
            "max_tokens" => {
                let text = field.text().await.map_err(|e| {
                    ApiError::bad_request(format!(
                        "Failed reading multipart 'max_tokens' field: {e}"
                    ))
                })?;
                max_tokens = text.trim().parse().map_err(|_| {
                    ApiError::bad_request(format!("Invalid max_tokens value '{}'", text.trim()))
                })?;
            }
            _ => {}
        }
    }

    let image = image.ok_or_else(|| {
        ApiError::bad_request("Missing image in multipart request (expected 'image' file field)")
    })?;

    Ok(VisionUpload {
        image,
        model,
        prompt,
        max_tokens,
    })
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub id: String,
    pub model: String,
    pub prompt: String,
    pub text: String,
    pub latency_ms: u64,
    pub image_size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Single-stage vision analysis: the prompt goes to the vision model
/// unchanged.
pub async fn analyze(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let upload = parse_vision_upload(multipart, DEFAULT_PROMPT).await?;
    let _permit = state.acquire_permit().await;

    let id = format!("vis-{}", Uuid::new_v4());
    let image_size = upload.image.len();
    info!("Vision analyze {} ({} bytes)", id, image_size);

    let timeout = Duration::from_secs(state.request_timeout_secs);
    let outcome = tokio::time::timeout(
        timeout,
        state
            .engine
            .vision_analyze(upload.image, &upload.prompt, &upload.model, upload.max_tokens),
    )
    .await
    .map_err(|_| ApiError::internal("Request timeout"))?;

    match outcome {
        Ok(analysis) => Ok(Json(AnalyzeResponse {
            id,
            model: upload.model,
            prompt: upload.prompt,
            text: analysis.description,
            latency_ms: analysis.latency.as_millis() as u64,
            image_size: analysis.image_size,
            error: None,
        })),
        Err(Error::BackendUnavailable(msg)) => Ok(Json(AnalyzeResponse {
            id,
            model: upload.model,
            prompt: upload.prompt,
            text: String::new(),
            latency_ms: 0,
            image_size,
            error: Some(msg),
        })),
        Err(err) => Err(err.into()),
    }
}

#[derive(Debug, Serialize)]
pub struct StageLatencyMs {
    pub detection: u64,
    pub description: u64,
    pub total: u64,
}

#[derive(Debug, Serialize)]
pub struct StageErrorBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detection: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PipelineResponse {
    pub id: String,
    pub model: String,
    pub detections: Vec<Detection>,
    pub detection_count: usize,
    pub description: String,
    pub latency_ms: StageLatencyMs,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<StageErrorBody>,
}

fn stage_errors_body(errors: &StageErrors) -> Option<StageErrorBody> {
    if errors.is_clean() {
        return None;
    }
    Some(StageErrorBody {
        detection: errors.detection.clone(),
        description: errors.description.clone(),
    })
}

/// Two-stage detection + description pipeline. Always responds 200;
/// stage failures appear in the `errors` object.
pub async fn pipeline(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<PipelineResponse>, ApiError> {
    let upload = parse_vision_upload(multipart, DEFAULT_PROMPT).await?;
    let _permit = state.acquire_permit().await;

    let id = format!("pipe-{}", Uuid::new_v4());
    info!("Vision pipeline {} ({} bytes)", id, upload.image.len());

    let timeout = Duration::from_secs(state.request_timeout_secs);
    let result = tokio::time::timeout(
        timeout,
        state
            .engine
            .vision_pipeline(upload.image, &upload.prompt, &upload.model, upload.max_tokens),
    )
    .await
    .map_err(|_| ApiError::internal("Request timeout"))?;

    Ok(Json(PipelineResponse {
        id,
        model: upload.model,
        detection_count: result.detections.len(),
        detections: result.detections,
        description: result.description,
        latency_ms: StageLatencyMs {
            detection: result.latencies.detection.as_millis() as u64,
            description: result.latencies.description.as_millis() as u64,
            total: result.latencies.total.as_millis() as u64,
        },
        errors: stage_errors_body(&result.errors),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::extract::{FromRequest, Request};
    use axum::http::StatusCode;

    const BOUNDARY: &str = "test-boundary";

    fn text_field(name: &str, value: &str) -> String {
        format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
    }

    fn file_field(name: &str, filename: &str, value: &str) -> String {
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n{value}\r\n"
        )
    }

    async fn multipart_from(fields: &[String]) -> Multipart {
        let body = format!("{}--{BOUNDARY}--\r\n", fields.concat());
        let request = Request::builder()
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap();
        Multipart::from_request(request, &()).await.unwrap()
    }

    #[tokio::test]
    async fn image_only_upload_fills_defaults() {
        let multipart =
            multipart_from(&[file_field("image", "photo.jpg", "jpegdata")]).await;

        let upload = parse_vision_upload(multipart, DEFAULT_PROMPT).await.unwrap();
        assert_eq!(upload.image, b"jpegdata");
        assert_eq!(upload.model, DEFAULT_VISION_MODEL);
        assert_eq!(upload.prompt, DEFAULT_PROMPT);
        assert_eq!(upload.max_tokens, DEFAULT_MAX_TOKENS);
    }

    #[tokio::test]
    async fn form_fields_override_defaults() {
        let multipart = multipart_from(&[
            file_field("image", "photo.jpg", "jpegdata"),
            text_field("model", "custom-vlm"),
            text_field("prompt", "Count the chairs"),
            text_field("max_tokens", "42"),
        ])
        .await;

        let upload = parse_vision_upload(multipart, DEFAULT_PROMPT).await.unwrap();
        assert_eq!(upload.model, "custom-vlm");
        assert_eq!(upload.prompt, "Count the chairs");
        assert_eq!(upload.max_tokens, 42);
    }

    #[tokio::test]
    async fn missing_image_is_rejected() {
        let multipart = multipart_from(&[text_field("prompt", "Look")]).await;

        let err = parse_vision_upload(multipart, DEFAULT_PROMPT)
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(err.message.contains("image"));
    }

    #[tokio::test]
    async fn malformed_max_tokens_is_rejected() {
        let multipart = multipart_from(&[
            file_field("image", "photo.jpg", "jpegdata"),
            text_field("max_tokens", "lots"),
        ])
        .await;

        let err = parse_vision_upload(multipart, DEFAULT_PROMPT)
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(err.message.contains("max_tokens"));
    }
}
