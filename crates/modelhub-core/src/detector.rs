//! Object detection adapter.
//!
//! Detection is an enhancement, never a precondition: a missing or
//! failing detector collaborator degrades to an empty detection list
//! plus a soft error marker, and the vision pipeline proceeds.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Error, Result};

/// Pixel-coordinate bounding box, x1 <= x2 and y1 <= y2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

/// A single detected object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    #[serde(rename = "class")]
    pub class_label: String,
    /// Confidence in [0, 1], passed through unmodified.
    pub confidence: f32,
    pub bbox: BoundingBox,
}

/// Fast object-localization collaborator. Blocking.
pub trait ObjectDetector: Send + Sync {
    fn detect(&self, image: &[u8]) -> Result<Vec<Detection>>;
}

/// Best-effort wrapper around an optional detector collaborator.
///
/// Confidence and bounding boxes are passed through as emitted; no
/// re-ranking or thresholding happens at this layer.
#[derive(Clone, Default)]
pub struct DetectorAdapter {
    inner: Option<Arc<dyn ObjectDetector>>,
}

impl DetectorAdapter {
    pub fn new(detector: Arc<dyn ObjectDetector>) -> Self {
        Self {
            inner: Some(detector),
        }
    }

    /// An adapter with no collaborator; every call reports the soft
    /// unavailability marker.
    pub fn disabled() -> Self {
        Self { inner: None }
    }

    pub fn is_available(&self) -> bool {
        self.inner.is_some()
    }

    /// Run detection, mapping absence or failure of the collaborator
    /// to an empty sequence plus a soft error marker.
    pub fn detect(&self, image: &[u8]) -> (Vec<Detection>, Option<Error>) {
        let Some(detector) = &self.inner else {
            return (
                Vec::new(),
                Some(Error::DetectorUnavailable(
                    "no object detector configured".to_string(),
                )),
            );
        };

        match detector.detect(image) {
            Ok(detections) => (detections, None),
            Err(err) => {
                warn!("Object detection failed: {}", err);
                (
                    Vec::new(),
                    Some(Error::DetectorUnavailable(err.to_string())),
                )
            }
        }
    }
}

impl std::fmt::Debug for DetectorAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectorAdapter")
            .field("available", &self.is_available())
            .finish()
    }
}
