//! Gateway engine: the injectable service object owning the model
//! cache, resolver, registry, and vision pipeline.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::info;

use crate::backend::{construct_blocking, BackendFactory, LoadedModel};
use crate::cache::ModelCache;
use crate::config::GatewayConfig;
use crate::detector::{DetectorAdapter, ObjectDetector};
use crate::error::{Error, Result};
use crate::generation::{self, GenerationRequest, GenerationResult};
use crate::registry::{ModelCard, ModelRegistry};
use crate::resolver::{Mode, ModelIdentity, ModelResolver};
use crate::vision::{VisionAnalysis, VisionPipeline, VisionPipelineResult};

/// Report for an explicit model preload.
#[derive(Debug, Clone)]
pub struct PreloadReport {
    pub identity: ModelIdentity,
    pub load_time: Duration,
    /// True when the model was already resident and no load ran.
    pub already_loaded: bool,
}

/// Main gateway engine. Constructed once per process and shared by
/// reference across request handlers.
pub struct GatewayEngine {
    config: GatewayConfig,
    registry: Arc<ModelRegistry>,
    resolver: Arc<ModelResolver>,
    cache: Arc<ModelCache>,
    factory: Arc<dyn BackendFactory>,
    vision: VisionPipeline,
}

impl GatewayEngine {
    pub async fn new(
        config: GatewayConfig,
        factory: Arc<dyn BackendFactory>,
        detector: Option<Arc<dyn ObjectDetector>>,
    ) -> Self {
        let registry = Arc::new(ModelRegistry::open(config.registry_path.clone()).await);
        let resolver = Arc::new(ModelResolver::new(&config));
        let cache = Arc::new(ModelCache::new());

        let adapter = match detector {
            Some(detector) => DetectorAdapter::new(detector),
            None => DetectorAdapter::disabled(),
        };
        if !adapter.is_available() {
            info!("No object detector configured; vision pipeline runs description-only");
        }

        let vision = VisionPipeline::new(
            resolver.clone(),
            cache.clone(),
            factory.clone(),
            adapter,
        );

        Self {
            config,
            registry,
            resolver,
            cache,
            factory,
            vision,
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// List all registered model cards.
    pub async fn list_models(&self) -> Vec<ModelCard> {
        self.registry.list().await
    }

    /// Look up a registered model card.
    pub async fn get_model(&self, id: &str) -> Option<ModelCard> {
        self.registry.get(id).await
    }

    /// Register or update a model card.
    pub async fn register_model(&self, card: ModelCard) -> Result<ModelCard> {
        self.registry.upsert(card).await
    }

    /// Identities currently resident in the model cache.
    pub async fn loaded_models(&self) -> Vec<ModelIdentity> {
        self.cache.loaded_identities().await
    }

    /// Serve a text generation request.
    ///
    /// Validation runs before resolution so malformed requests never
    /// touch the resolver, cache, or model runtime.
    pub async fn generate(&self, request: GenerationRequest) -> Result<GenerationResult> {
        request.validate()?;

        let handle = self
            .get_or_load_model(&request.model_id, Mode::Text)
            .await?;
        generation::generate(handle, &request).await
    }

    /// Single-stage vision analysis: the caller's prompt goes to the
    /// vision-language model unchanged, no detector involved.
    pub async fn vision_analyze(
        &self,
        image: Vec<u8>,
        prompt: &str,
        model_id: &str,
        max_tokens: u32,
    ) -> Result<VisionAnalysis> {
        if image.is_empty() {
            return Err(Error::InvalidInput("image payload is empty".to_string()));
        }

        let image_size = image.len();
        let started = Instant::now();
        let description = self
            .vision
            .describe(Arc::new(image), prompt, model_id, max_tokens)
            .await?;

        Ok(VisionAnalysis {
            description,
            latency: started.elapsed(),
            image_size,
        })
    }

    /// Two-stage detection + description pipeline.
    pub async fn vision_pipeline(
        &self,
        image: Vec<u8>,
        prompt: &str,
        model_id: &str,
        max_tokens: u32,
    ) -> VisionPipelineResult {
        self.vision.run(image, prompt, model_id, max_tokens).await
    }

    /// Load a vision model ahead of the first analyze request.
    pub async fn preload_vision(&self, model_id: &str) -> Result<PreloadReport> {
        let identity = ModelIdentity::vision(model_id);
        let already_loaded = self.cache.is_loaded(&identity).await;

        let started = Instant::now();
        let handle = self.get_or_load_model(model_id, Mode::Vision).await?;

        Ok(PreloadReport {
            identity: handle.identity().clone(),
            load_time: started.elapsed(),
            already_loaded,
        })
    }

    async fn get_or_load_model(&self, model_id: &str, mode: Mode) -> Result<Arc<LoadedModel>> {
        let resolved = self.resolver.resolve(model_id, mode)?;
        let factory = self.factory.clone();
        self.cache
            .get_or_load(resolved.identity.clone(), move || {
                construct_blocking(factory, resolved)
            })
            .await
    }
}
