//! Model identity resolution.
//!
//! Maps a logical model identifier plus operating mode to concrete
//! file paths and runtime construction parameters. Stateless; the
//! resolver table is built once from config and read concurrently.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::GatewayConfig;
use crate::error::{Error, Result};

/// Operating mode a model is loaded under.
///
/// Part of the cache key: the same weights loaded with and without a
/// vision projector are distinct runtime instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Text,
    Vision,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Text => write!(f, "text"),
            Mode::Vision => write!(f, "vision"),
        }
    }
}

/// Cache key identifying a loadable model instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelIdentity {
    pub id: String,
    pub mode: Mode,
}

impl ModelIdentity {
    pub fn new(id: impl Into<String>, mode: Mode) -> Self {
        Self {
            id: id.into(),
            mode,
        }
    }

    pub fn text(id: impl Into<String>) -> Self {
        Self::new(id, Mode::Text)
    }

    pub fn vision(id: impl Into<String>) -> Self {
        Self::new(id, Mode::Vision)
    }
}

impl fmt::Display for ModelIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.id, self.mode)
    }
}

/// Runtime construction parameters handed to the backend factory.
#[derive(Debug, Clone)]
pub struct BackendParams {
    pub n_ctx: u32,
    pub n_threads: u32,
    pub n_gpu_layers: u32,
}

/// A fully resolved model ready for construction.
#[derive(Debug, Clone)]
pub struct ResolvedModel {
    pub identity: ModelIdentity,
    pub weights_path: PathBuf,
    /// Auxiliary projector weights, present for vision-mode loads.
    pub projector_path: Option<PathBuf>,
    pub params: BackendParams,
}

#[derive(Debug, Clone)]
struct ModelSpec {
    weights: PathBuf,
    projector: Option<PathBuf>,
}

/// Resolves logical identifiers to file paths.
pub struct ModelResolver {
    models_dir: PathBuf,
    params: BackendParams,
    table: HashMap<String, ModelSpec>,
}

impl ModelResolver {
    /// Build the resolver table from the built-in catalog plus any
    /// config-supplied entries (which override built-ins by id).
    pub fn new(config: &GatewayConfig) -> Self {
        let mut table = HashMap::new();

        table.insert(
            "tinyllama-1b-q4".to_string(),
            ModelSpec {
                weights: PathBuf::from("tinyllama.gguf"),
                projector: None,
            },
        );
        table.insert(
            "phi-2-q4".to_string(),
            ModelSpec {
                weights: PathBuf::from("phi-2.gguf"),
                projector: None,
            },
        );
        table.insert(
            "llava-v1.6-7b-q4".to_string(),
            ModelSpec {
                weights: PathBuf::from("llava-v1.6-7b.Q4_K_M.gguf"),
                projector: Some(PathBuf::from("mmproj-model-f16.gguf")),
            },
        );

        for entry in &config.extra_models {
            table.insert(
                entry.id.clone(),
                ModelSpec {
                    weights: entry.weights.clone(),
                    projector: entry.projector.clone(),
                },
            );
        }

        Self {
            models_dir: config.models_dir.clone(),
            params: BackendParams {
                n_ctx: config.n_ctx,
                n_threads: config.n_threads,
                n_gpu_layers: config.n_gpu_layers,
            },
            table,
        }
    }

    /// Known model identifiers, for diagnostics.
    pub fn known_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.table.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Resolve an identifier and mode to concrete paths.
    ///
    /// An unknown id fails with `ModelNotFound`; a known id whose
    /// backing file is absent fails with `ModelFileMissing` so the two
    /// conditions stay distinguishable for diagnostics.
    pub fn resolve(&self, id: &str, mode: Mode) -> Result<ResolvedModel> {
        let spec = self
            .table
            .get(id)
            .ok_or_else(|| Error::ModelNotFound(id.to_string()))?;

        let projector_spec = match (mode, &spec.projector) {
            (Mode::Text, _) => None,
            (Mode::Vision, Some(projector)) => Some(projector),
            (Mode::Vision, None) => {
                return Err(Error::InvalidInput(format!(
                    "Model {id} does not support vision input"
                )));
            }
        };

        let weights_path = self.absolute(&spec.weights);
        if !weights_path.exists() {
            return Err(Error::ModelFileMissing {
                id: id.to_string(),
                path: weights_path,
            });
        }

        let projector_path = match projector_spec {
            None => None,
            Some(projector) => {
                let path = self.absolute(projector);
                if !path.exists() {
                    return Err(Error::ModelFileMissing {
                        id: id.to_string(),
                        path,
                    });
                }
                Some(path)
            }
        };

        Ok(ResolvedModel {
            identity: ModelIdentity::new(id, mode),
            weights_path,
            projector_path,
            params: self.params.clone(),
        })
    }

    fn absolute(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.models_dir.join(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelEntry;

    fn config_with_dir(dir: &Path) -> GatewayConfig {
        GatewayConfig {
            models_dir: dir.to_path_buf(),
            ..GatewayConfig::default()
        }
    }

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), b"gguf").unwrap();
    }

    #[test]
    fn unknown_id_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = ModelResolver::new(&config_with_dir(dir.path()));

        let err = resolver.resolve("nope", Mode::Text).unwrap_err();
        assert!(matches!(err, Error::ModelNotFound(id) if id == "nope"));
    }

    #[test]
    fn known_id_with_missing_file_is_distinct() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = ModelResolver::new(&config_with_dir(dir.path()));

        let err = resolver.resolve("tinyllama-1b-q4", Mode::Text).unwrap_err();
        assert!(matches!(err, Error::ModelFileMissing { id, .. } if id == "tinyllama-1b-q4"));
    }

    #[test]
    fn resolves_text_model_when_file_exists() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "tinyllama.gguf");
        let resolver = ModelResolver::new(&config_with_dir(dir.path()));

        let resolved = resolver.resolve("tinyllama-1b-q4", Mode::Text).unwrap();
        assert_eq!(resolved.identity, ModelIdentity::text("tinyllama-1b-q4"));
        assert!(resolved.projector_path.is_none());
        assert_eq!(resolved.params.n_ctx, 2048);
    }

    #[test]
    fn vision_requires_projector_capability() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "tinyllama.gguf");
        let resolver = ModelResolver::new(&config_with_dir(dir.path()));

        let err = resolver
            .resolve("tinyllama-1b-q4", Mode::Vision)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn vision_resolution_checks_both_files() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "llava-v1.6-7b.Q4_K_M.gguf");
        let resolver = ModelResolver::new(&config_with_dir(dir.path()));

        // Projector missing
        let err = resolver
            .resolve("llava-v1.6-7b-q4", Mode::Vision)
            .unwrap_err();
        assert!(matches!(err, Error::ModelFileMissing { .. }));

        touch(dir.path(), "mmproj-model-f16.gguf");
        let resolved = resolver.resolve("llava-v1.6-7b-q4", Mode::Vision).unwrap();
        assert!(resolved.projector_path.is_some());
    }

    #[test]
    fn config_entries_extend_the_table() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "custom.gguf");
        let mut config = config_with_dir(dir.path());
        config.extra_models.push(ModelEntry {
            id: "custom-7b".to_string(),
            weights: PathBuf::from("custom.gguf"),
            projector: None,
        });
        let resolver = ModelResolver::new(&config);

        assert!(resolver.resolve("custom-7b", Mode::Text).is_ok());
        assert!(resolver.known_ids().contains(&"custom-7b".to_string()));
    }
}
