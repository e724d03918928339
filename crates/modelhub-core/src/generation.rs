//! Text generation service.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::backend::{LoadedModel, SamplingOptions};
use crate::error::{Error, Result};

/// A text generation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Unique request ID.
    #[serde(default = "generate_request_id")]
    pub id: String,

    /// Logical model identifier.
    #[serde(rename = "model", default = "default_model")]
    pub model_id: String,

    /// Prompt text.
    pub prompt: String,

    /// Maximum number of tokens to generate.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Sampling temperature in [0, 2].
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Nucleus sampling threshold in (0, 1].
    #[serde(default = "default_top_p")]
    pub top_p: f32,
}

fn generate_request_id() -> String {
    format!("gen-{}", Uuid::new_v4())
}

fn default_model() -> String {
    "tinyllama-1b-q4".to_string()
}

fn default_max_tokens() -> u32 {
    150
}

fn default_temperature() -> f32 {
    0.7
}

fn default_top_p() -> f32 {
    0.9
}

impl GenerationRequest {
    pub fn new(model_id: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            id: generate_request_id(),
            model_id: model_id.into(),
            prompt: prompt.into(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            top_p: default_top_p(),
        }
    }

    /// Reject malformed requests before any model resource is touched.
    pub fn validate(&self) -> Result<()> {
        if self.max_tokens == 0 {
            return Err(Error::InvalidInput(
                "max_tokens must be greater than zero".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(Error::InvalidInput(format!(
                "temperature must be within [0, 2], got {}",
                self.temperature
            )));
        }
        if !(self.top_p > 0.0 && self.top_p <= 1.0) {
            return Err(Error::InvalidInput(format!(
                "top_p must be within (0, 1], got {}",
                self.top_p
            )));
        }
        Ok(())
    }

    fn sampling(&self) -> SamplingOptions {
        SamplingOptions {
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            top_p: self.top_p,
        }
    }
}

/// Result of a completed generation call.
#[derive(Debug, Clone)]
pub struct GenerationResult {
    pub request_id: String,
    pub text: String,
    pub token_count: usize,
    /// Wall clock spanning only the inference call.
    pub latency: Duration,
    pub tokens_per_second: f64,
}

/// Throughput with a defensive clamp: a latency under one millisecond
/// yields 0 rather than an infinite, NaN, or absurd rate.
pub fn tokens_per_second(token_count: usize, latency: Duration) -> f64 {
    let millis = latency.as_millis();
    if millis > 0 {
        token_count as f64 / (millis as f64 / 1000.0)
    } else {
        0.0
    }
}

/// Run a validated request against a loaded model.
pub async fn generate(
    model: Arc<LoadedModel>,
    request: &GenerationRequest,
) -> Result<GenerationResult> {
    request.validate()?;

    let sampling = request.sampling();
    let prompt = request.prompt.clone();

    let started = Instant::now();
    let text = tokio::task::spawn_blocking(move || model.backend().run_text(&prompt, &sampling))
        .await
        .map_err(|e| Error::Inference(format!("Generation task failed: {e}")))??;
    let latency = started.elapsed();

    let text = text.trim().to_string();
    let token_count = text.split_whitespace().count();

    Ok(GenerationResult {
        request_id: request.id.clone(),
        text,
        token_count,
        latency,
        tokens_per_second: tokens_per_second(token_count, latency),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ModelBackend;
    use crate::resolver::ModelIdentity;

    struct FixedBackend {
        reply: &'static str,
        delay: Duration,
    }

    impl ModelBackend for FixedBackend {
        fn run_text(&self, _prompt: &str, _sampling: &SamplingOptions) -> Result<String> {
            std::thread::sleep(self.delay);
            Ok(self.reply.to_string())
        }

        fn run_chat_with_image(
            &self,
            _image: &[u8],
            _prompt: &str,
            _max_tokens: u32,
        ) -> Result<String> {
            Ok(self.reply.to_string())
        }
    }

    struct FailingBackend;

    impl ModelBackend for FailingBackend {
        fn run_text(&self, _prompt: &str, _sampling: &SamplingOptions) -> Result<String> {
            Err(Error::Inference("decode aborted".to_string()))
        }

        fn run_chat_with_image(
            &self,
            _image: &[u8],
            _prompt: &str,
            _max_tokens: u32,
        ) -> Result<String> {
            Err(Error::Inference("decode aborted".to_string()))
        }
    }

    fn model(backend: impl ModelBackend + 'static) -> Arc<LoadedModel> {
        Arc::new(LoadedModel::new(
            ModelIdentity::text("m1"),
            Box::new(backend),
        ))
    }

    #[test]
    fn validation_rejects_bad_parameters() {
        let mut req = GenerationRequest::new("m1", "hi");
        req.max_tokens = 0;
        assert!(matches!(req.validate(), Err(Error::InvalidInput(_))));

        let mut req = GenerationRequest::new("m1", "hi");
        req.temperature = 2.5;
        assert!(matches!(req.validate(), Err(Error::InvalidInput(_))));

        let mut req = GenerationRequest::new("m1", "hi");
        req.top_p = 0.0;
        assert!(matches!(req.validate(), Err(Error::InvalidInput(_))));

        let mut req = GenerationRequest::new("m1", "hi");
        req.top_p = 1.5;
        assert!(matches!(req.validate(), Err(Error::InvalidInput(_))));

        assert!(GenerationRequest::new("m1", "hi").validate().is_ok());
    }

    #[test]
    fn tokens_per_second_clamps_zero_latency() {
        assert_eq!(tokens_per_second(0, Duration::ZERO), 0.0);
        assert_eq!(tokens_per_second(42, Duration::ZERO), 0.0);
        assert_eq!(tokens_per_second(1000, Duration::from_nanos(1)), 0.0);

        let rate = tokens_per_second(20, Duration::from_secs(1));
        assert!((rate - 20.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn generation_measures_inference_latency() {
        let model = model(FixedBackend {
            reply: "hello there",
            delay: Duration::from_millis(100),
        });
        let mut req = GenerationRequest::new("m1", "hi");
        req.max_tokens = 10;

        let result = generate(model, &req).await.unwrap();
        assert_eq!(result.text, "hello there");
        assert_eq!(result.token_count, 2);
        assert!(result.latency >= Duration::from_millis(100));
        assert!(result.tokens_per_second > 0.0);
        assert!(result.tokens_per_second <= 20.5);
        assert!(result.tokens_per_second.is_finite());
    }

    #[tokio::test]
    async fn invalid_requests_never_reach_the_backend() {
        let model = model(FailingBackend);
        let mut req = GenerationRequest::new("m1", "hi");
        req.max_tokens = 0;

        // FailingBackend would report Inference; InvalidInput proves
        // validation ran first.
        let err = generate(model, &req).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn backend_failure_surfaces_as_inference_error() {
        let model = model(FailingBackend);
        let req = GenerationRequest::new("m1", "hi");

        let err = generate(model, &req).await.unwrap_err();
        assert!(matches!(err, Error::Inference(msg) if msg.contains("decode aborted")));
    }
}
