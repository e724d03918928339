//! Configuration types for the Model Hub gateway.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::warn;

/// Main gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Directory holding model weight files.
    #[serde(default = "default_models_dir")]
    pub models_dir: PathBuf,

    /// Path to the JSON hub registry.
    #[serde(default = "default_registry_path")]
    pub registry_path: PathBuf,

    /// Context window passed to the model runtime.
    #[serde(default = "default_n_ctx")]
    pub n_ctx: u32,

    /// Number of CPU threads for inference.
    #[serde(default = "default_n_threads")]
    pub n_threads: u32,

    /// Layers offloaded to the GPU (0 = CPU only).
    #[serde(default)]
    pub n_gpu_layers: u32,

    /// Additional model entries merged over the built-in table.
    #[serde(default)]
    pub extra_models: Vec<ModelEntry>,
}

/// A configuration-supplied model mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelEntry {
    /// Logical model identifier.
    pub id: String,

    /// Weights file, absolute or relative to `models_dir`.
    pub weights: PathBuf,

    /// Vision projector file; present only for vision-capable models.
    #[serde(default)]
    pub projector: Option<PathBuf>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            models_dir: default_models_dir(),
            registry_path: default_registry_path(),
            n_ctx: default_n_ctx(),
            n_threads: default_n_threads(),
            n_gpu_layers: 0,
            extra_models: Vec::new(),
        }
    }
}

fn default_models_dir() -> PathBuf {
    if let Ok(from_env) = std::env::var("MODELHUB_MODELS_DIR") {
        let trimmed = from_env.trim();
        if !trimmed.is_empty() {
            return PathBuf::from(trimmed);
        }
    }

    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("modelhub")
        .join("models")
}

fn default_registry_path() -> PathBuf {
    if let Ok(from_env) = std::env::var("HUB_REGISTRY") {
        let trimmed = from_env.trim();
        if !trimmed.is_empty() {
            return PathBuf::from(trimmed);
        }
    }

    PathBuf::from("registry.json")
}

fn default_n_ctx() -> u32 {
    2048
}

fn default_n_threads() -> u32 {
    4
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind host; `MODELHUB_HOST` overrides.
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port; `MODELHUB_PORT` overrides.
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_cors_enabled")]
    pub cors_enabled: bool,

    /// Allowed CORS origins; `*` means any origin.
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn allows_any_origin(&self) -> bool {
        self.cors_origins.iter().any(|origin| origin == "*")
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_enabled: default_cors_enabled(),
            cors_origins: default_cors_origins(),
        }
    }
}

fn default_host() -> String {
    match std::env::var("MODELHUB_HOST") {
        Ok(host) if !host.trim().is_empty() => host.trim().to_string(),
        _ => "0.0.0.0".to_string(),
    }
}

fn default_port() -> u16 {
    match std::env::var("MODELHUB_PORT") {
        Ok(raw) => match raw.trim().parse() {
            Ok(port) => port,
            Err(_) => {
                warn!("Invalid MODELHUB_PORT='{}', falling back to 8080", raw);
                8080
            }
        },
        Err(_) => 8080,
    }
}

fn default_cors_enabled() -> bool {
    true
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_config_defaults_are_permissive() {
        let config = ServerConfig::default();
        assert!(config.cors_enabled);
        assert!(config.allows_any_origin());
    }

    #[test]
    fn partial_server_config_fills_missing_fields() {
        let config: ServerConfig = serde_json::from_str(r#"{"port": 9090}"#).unwrap();
        assert_eq!(config.port, 9090);
        assert!(config.cors_enabled);
        assert_eq!(config.cors_origins, vec!["*".to_string()]);
    }

    #[test]
    fn bind_addr_joins_host_and_port() {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 9090,
            cors_enabled: true,
            cors_origins: vec!["*".to_string()],
        };
        assert_eq!(config.bind_addr(), "127.0.0.1:9090");
    }

    #[test]
    fn explicit_origin_list_is_not_any() {
        let config = ServerConfig {
            cors_origins: vec!["http://localhost:3000".to_string()],
            ..ServerConfig::default()
        };
        assert!(!config.allows_any_origin());
    }
}
