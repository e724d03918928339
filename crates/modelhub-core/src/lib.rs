//! Model Hub Core - Inference-Serving Gateway Engine
//!
//! This crate is the inference-serving core behind the local model
//! hub gateway: a single-flight model cache keyed by (model id, mode),
//! a validated text generation service, and a two-stage vision
//! pipeline fusing fast object detection with a slower vision-language
//! description pass.
//!
//! Model runtimes and object detectors are collaborators behind the
//! [`backend::BackendFactory`] and [`detector::ObjectDetector`] seams;
//! the core manages which model instance serves which request and how
//! multi-stage results compose.

pub mod backend;
pub mod cache;
pub mod config;
pub mod detector;
pub mod engine;
pub mod error;
pub mod generation;
pub mod registry;
pub mod resolver;
pub mod vision;

pub use backend::{
    BackendFactory, DisabledBackendFactory, LoadedModel, ModelBackend, SamplingOptions,
};
pub use cache::ModelCache;
pub use config::{GatewayConfig, ModelEntry, ServerConfig};
pub use detector::{BoundingBox, Detection, DetectorAdapter, ObjectDetector};
pub use engine::{GatewayEngine, PreloadReport};
pub use error::{Error, Result};
pub use generation::{tokens_per_second, GenerationRequest, GenerationResult};
pub use registry::{ModelCard, ModelFile, ModelRegistry};
pub use resolver::{BackendParams, Mode, ModelIdentity, ModelResolver, ResolvedModel};
pub use vision::{
    fuse_prompt, StageErrors, StageLatencies, VisionAnalysis, VisionPipelineResult,
    DESCRIPTION_UNAVAILABLE,
};
