//! Model runtime collaborator seams.
//!
//! The gateway never performs tokenization or decoding itself; it
//! drives an opaque [`ModelBackend`] constructed by a
//! [`BackendFactory`]. Backend calls are blocking and expected to run
//! for seconds; callers wrap them in `tokio::task::spawn_blocking`.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::resolver::{ModelIdentity, ResolvedModel};

/// Sampling parameters for text generation.
#[derive(Debug, Clone)]
pub struct SamplingOptions {
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
}

/// A loaded model instance ready for inference.
///
/// Blocking; concurrency safety during inference is the runtime's
/// responsibility.
pub trait ModelBackend: Send + Sync {
    /// Plain text completion.
    fn run_text(&self, prompt: &str, sampling: &SamplingOptions) -> Result<String>;

    /// Chat-style completion over a joint image + text input.
    fn run_chat_with_image(&self, image: &[u8], prompt: &str, max_tokens: u32) -> Result<String>;
}

/// Constructs model backends from resolved paths.
///
/// Availability is an outcome, not an exception: a factory with no
/// runtime linked returns `Error::BackendUnavailable` from `construct`.
pub trait BackendFactory: Send + Sync {
    fn construct(&self, resolved: &ResolvedModel) -> Result<Box<dyn ModelBackend>>;
}

/// A constructed model plus its identity, owned by the cache.
pub struct LoadedModel {
    identity: ModelIdentity,
    backend: Box<dyn ModelBackend>,
}

impl LoadedModel {
    pub fn new(identity: ModelIdentity, backend: Box<dyn ModelBackend>) -> Self {
        Self { identity, backend }
    }

    pub fn identity(&self) -> &ModelIdentity {
        &self.identity
    }

    pub fn backend(&self) -> &dyn ModelBackend {
        self.backend.as_ref()
    }
}

impl std::fmt::Debug for LoadedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedModel")
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

/// Default factory for builds without a linked model runtime.
///
/// Every construction reports the capability gap as a structured
/// error, so requests degrade to well-formed failure payloads instead
/// of aborting the server.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledBackendFactory;

impl BackendFactory for DisabledBackendFactory {
    fn construct(&self, resolved: &ResolvedModel) -> Result<Box<dyn ModelBackend>> {
        Err(Error::BackendUnavailable(format!(
            "no model runtime is linked into this build (requested {})",
            resolved.identity
        )))
    }
}

/// Run a factory construction on the blocking pool.
pub(crate) async fn construct_blocking(
    factory: Arc<dyn BackendFactory>,
    resolved: ResolvedModel,
) -> Result<LoadedModel> {
    tokio::task::spawn_blocking(move || {
        let backend = factory.construct(&resolved)?;
        Ok(LoadedModel::new(resolved.identity.clone(), backend))
    })
    .await
    .map_err(|e| Error::ModelLoad(format!("Model load task failed: {e}")))?
}
