//! JSON-file-backed model hub registry.
//!
//! The registry is a flat list of model cards persisted as pretty
//! JSON; the core only needs lookup-by-id, list-all, and upsert.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::warn;

use crate::error::Result;

/// A single file belonging to a model card.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelFile {
    pub filename: String,
    pub path: String,
    #[serde(default)]
    pub size_bytes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

/// Hub metadata for a registered model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelCard {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    pub task: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantization: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub targets: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default)]
    pub downloads: u64,
    #[serde(default)]
    pub files: Vec<ModelFile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readme_markdown: Option<String>,
}

/// In-memory registry view backed by a JSON file.
pub struct ModelRegistry {
    path: PathBuf,
    models: RwLock<Vec<ModelCard>>,
}

impl ModelRegistry {
    /// Open the registry at `path`. A missing or unreadable file
    /// yields an empty registry rather than a startup failure; the
    /// file is created on first upsert.
    pub async fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let models = match tokio::fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice::<Vec<ModelCard>>(&bytes) {
                Ok(models) => models,
                Err(err) => {
                    warn!("Registry {} is malformed, starting empty: {}", path.display(), err);
                    Vec::new()
                }
            },
            Err(_) => Vec::new(),
        };

        Self {
            path,
            models: RwLock::new(models),
        }
    }

    /// All registered model cards.
    pub async fn list(&self) -> Vec<ModelCard> {
        self.models.read().await.clone()
    }

    pub async fn count(&self) -> usize {
        self.models.read().await.len()
    }

    /// Look up a card by id.
    pub async fn get(&self, id: &str) -> Option<ModelCard> {
        self.models
            .read()
            .await
            .iter()
            .find(|card| card.id.as_deref() == Some(id))
            .cloned()
    }

    /// Insert or replace a card and persist the registry. Cards
    /// without an id are assigned `model-{n}`.
    pub async fn upsert(&self, mut card: ModelCard) -> Result<ModelCard> {
        let mut models = self.models.write().await;

        if card.id.is_none() {
            card.id = Some(format!("model-{}", models.len() + 1));
        }

        let position = models
            .iter()
            .position(|existing| existing.id == card.id);
        match position {
            Some(index) => models[index] = card.clone(),
            None => models.push(card.clone()),
        }

        let serialized = serde_json::to_vec_pretty(&*models)?;
        tokio::fs::write(&self.path, serialized).await?;

        Ok(card)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(name: &str) -> ModelCard {
        ModelCard {
            id: None,
            name: name.to_string(),
            task: "text-generation".to_string(),
            arch: None,
            quantization: Some("q4".to_string()),
            license: None,
            tags: vec![],
            targets: vec![],
            created_at: None,
            downloads: 0,
            files: vec![],
            readme_markdown: None,
        }
    }

    #[tokio::test]
    async fn missing_file_opens_empty() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ModelRegistry::open(dir.path().join("registry.json")).await;
        assert_eq!(registry.count().await, 0);
    }

    #[tokio::test]
    async fn upsert_assigns_ids_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.json");

        let registry = ModelRegistry::open(&path).await;
        let stored = registry.upsert(card("TinyLlama")).await.unwrap();
        assert_eq!(stored.id.as_deref(), Some("model-1"));

        // Reopen from disk.
        let reopened = ModelRegistry::open(&path).await;
        assert_eq!(reopened.count().await, 1);
        assert_eq!(
            reopened.get("model-1").await.unwrap().name,
            "TinyLlama"
        );
    }

    #[tokio::test]
    async fn upsert_replaces_existing_cards() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ModelRegistry::open(dir.path().join("registry.json")).await;

        let mut first = card("Phi-2");
        first.id = Some("phi-2-q4".to_string());
        registry.upsert(first).await.unwrap();

        let mut updated = card("Phi-2 (updated)");
        updated.id = Some("phi-2-q4".to_string());
        registry.upsert(updated).await.unwrap();

        assert_eq!(registry.count().await, 1);
        assert_eq!(
            registry.get("phi-2-q4").await.unwrap().name,
            "Phi-2 (updated)"
        );
    }

    #[tokio::test]
    async fn malformed_registry_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.json");
        tokio::fs::write(&path, b"{not json").await.unwrap();

        let registry = ModelRegistry::open(&path).await;
        assert_eq!(registry.count().await, 0);
    }
}
