//! Two-stage vision pipeline orchestration.
//!
//! Stage 1 runs the fast object detector; stage 2 fuses its output
//! into the vision-language prompt and runs the description model.
//! The stages are strictly sequential and each may fail without
//! discarding the other's work: a missing detector never blocks the
//! description, and a missing description model still returns the
//! detections already gathered.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::backend::{construct_blocking, BackendFactory};
use crate::cache::ModelCache;
use crate::detector::{Detection, DetectorAdapter};
use crate::error::{Error, Result};
use crate::resolver::{Mode, ModelResolver};

/// Description reported when the vision-language stage fails.
pub const DESCRIPTION_UNAVAILABLE: &str = "<unavailable>";

/// Per-stage wall-clock accounting.
///
/// `total` spans pipeline entry to exit; it is at least the sum of the
/// stage latencies but equality is not guaranteed (orchestration
/// overhead sits between the stages).
#[derive(Debug, Clone, Copy, Default)]
pub struct StageLatencies {
    pub detection: Duration,
    pub description: Duration,
    pub total: Duration,
}

/// Per-stage soft error markers.
#[derive(Debug, Clone, Default)]
pub struct StageErrors {
    pub detection: Option<String>,
    pub description: Option<String>,
}

impl StageErrors {
    pub fn is_clean(&self) -> bool {
        self.detection.is_none() && self.description.is_none()
    }
}

/// Composite result of a pipeline run. Always well-formed; failures
/// are reported through `errors`, never as an absent result.
#[derive(Debug, Clone)]
pub struct VisionPipelineResult {
    /// Detections in the detector's emission order.
    pub detections: Vec<Detection>,
    pub description: String,
    pub latencies: StageLatencies,
    pub errors: StageErrors,
}

/// Result of a single-stage vision analysis (no detector).
#[derive(Debug, Clone)]
pub struct VisionAnalysis {
    pub description: String,
    pub latency: Duration,
    pub image_size: usize,
}

/// Sequences the detector and the vision-language model.
pub struct VisionPipeline {
    resolver: Arc<ModelResolver>,
    cache: Arc<ModelCache>,
    factory: Arc<dyn BackendFactory>,
    detector: DetectorAdapter,
}

impl VisionPipeline {
    pub fn new(
        resolver: Arc<ModelResolver>,
        cache: Arc<ModelCache>,
        factory: Arc<dyn BackendFactory>,
        detector: DetectorAdapter,
    ) -> Self {
        Self {
            resolver,
            cache,
            factory,
            detector,
        }
    }

    /// Run both stages and assemble the composite result.
    pub async fn run(
        &self,
        image: Vec<u8>,
        prompt: &str,
        model_id: &str,
        max_tokens: u32,
    ) -> VisionPipelineResult {
        let image = Arc::new(image);
        let started = Instant::now();
        let mut errors = StageErrors::default();

        // Stage 1: DETECTING.
        let detect_started = Instant::now();
        let adapter = self.detector.clone();
        let detect_image = image.clone();
        let (detections, detect_marker) =
            match tokio::task::spawn_blocking(move || adapter.detect(&detect_image)).await {
                Ok(outcome) => outcome,
                Err(e) => (
                    Vec::new(),
                    Some(Error::DetectorUnavailable(format!(
                        "detection task failed: {e}"
                    ))),
                ),
            };
        let detection_latency = if detect_marker.is_none() {
            detect_started.elapsed()
        } else {
            Duration::ZERO
        };
        if let Some(marker) = detect_marker {
            debug!("Vision pipeline proceeding without detections: {}", marker);
            errors.detection = Some(marker.to_string());
        }

        // Stage 2: DESCRIBING.
        let fused_prompt = fuse_prompt(prompt, &detections);
        let describe_started = Instant::now();
        let description = match self
            .describe(image, &fused_prompt, model_id, max_tokens)
            .await
        {
            Ok(text) => text,
            Err(err) => {
                warn!("Vision description stage failed: {}", err);
                errors.description = Some(err.to_string());
                DESCRIPTION_UNAVAILABLE.to_string()
            }
        };
        let description_latency = describe_started.elapsed();

        VisionPipelineResult {
            detections,
            description,
            latencies: StageLatencies {
                detection: detection_latency,
                description: description_latency,
                total: started.elapsed(),
            },
            errors,
        }
    }

    /// Load the vision-language model through the cache and run a
    /// chat-style image+text completion.
    pub(crate) async fn describe(
        &self,
        image: Arc<Vec<u8>>,
        prompt: &str,
        model_id: &str,
        max_tokens: u32,
    ) -> Result<String> {
        let resolved = self.resolver.resolve(model_id, Mode::Vision)?;
        let factory = self.factory.clone();
        let handle = self
            .cache
            .get_or_load(resolved.identity.clone(), move || {
                construct_blocking(factory, resolved)
            })
            .await?;

        let prompt = prompt.to_string();
        let text = tokio::task::spawn_blocking(move || {
            handle.backend().run_chat_with_image(&image, &prompt, max_tokens)
        })
        .await
        .map_err(|e| Error::Inference(format!("Vision generation task failed: {e}")))??;

        Ok(text.trim().to_string())
    }
}

/// Append a deterministic summary of detected classes to the caller's
/// prompt. Labels are comma-joined in emission order, undeduplicated;
/// with no detections the prompt passes through unchanged.
pub fn fuse_prompt(prompt: &str, detections: &[Detection]) -> String {
    if detections.is_empty() {
        return prompt.to_string();
    }

    let objects_found = detections
        .iter()
        .map(|d| d.class_label.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    format!("{prompt}. I detected: {objects_found}. Please describe the scene in detail.")
}
