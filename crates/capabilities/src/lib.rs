//! Shared analysis capabilities
//!
//! The expensive inference resources — the image classifier, the video
//! classifier and the face localizer — are constructed lazily, at most
//! once per process on success, and shared by every concurrent job
//! through the [`CapabilityRegistry`]. Nothing else in the system
//! constructs them directly.
//!
//! Construction goes through the [`CapabilityLoader`] seam so the
//! registry's concurrency contract is testable without model files; the
//! production loader ([`OnnxCapabilityLoader`]) builds ONNX Runtime
//! sessions from configured model paths.

mod classifier;
mod localizer;
mod registry;
mod session;

pub use classifier::{ClassifierConfig, OnnxClassifier};
pub use localizer::{LocalizerConfig, OnnxFaceLocalizer};
pub use registry::{CapabilityConfig, CapabilityLoader, CapabilityRegistry, OnnxCapabilityLoader};

use image::RgbImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from capability construction and inference
#[derive(Error, Debug)]
pub enum CapabilityError {
    #[error("Model file not found: {0}")]
    ModelNotFound(String),

    #[error("Failed to load model from {path}: {error}")]
    ModelLoad { path: String, error: String },

    #[error("Failed to run inference: {0}")]
    Inference(String),

    #[error("Preprocessing failed: {0}")]
    Preprocess(String),

    #[error("Postprocessing failed: {0}")]
    Postprocess(String),

    #[error("Capability lock poisoned")]
    Poisoned,
}

/// The kinds of shared capability the registry manages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CapabilityKind {
    ImageClassifier,
    VideoClassifier,
    FaceLocalizer,
}

impl CapabilityKind {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            CapabilityKind::ImageClassifier => "image_classifier",
            CapabilityKind::VideoClassifier => "video_classifier",
            CapabilityKind::FaceLocalizer => "face_localizer",
        }
    }
}

/// A model scoring frames for authenticity
///
/// One probability of the AI-generated class per input frame, in frame
/// order. Implementations preprocess (resize, scale to [0, 1]) as their
/// model requires.
pub trait Classifier: Send + Sync {
    fn predict(&self, frames: &[RgbImage]) -> Result<Vec<f32>, CapabilityError>;
}

/// A model localizing faces in a frame
///
/// Detections come back ordered by model confidence, boxes in normalized
/// coordinates.
pub trait FaceLocalizer: Send + Sync {
    fn detect(&self, frame: &RgbImage) -> Result<Vec<Detection>, CapabilityError>;
}

/// Bounding box in normalized [0, 1] coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    #[must_use]
    #[inline]
    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    #[must_use]
    #[inline]
    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    #[must_use]
    #[inline]
    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Intersection over union with another box
    #[must_use]
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let x1 = self.x1.max(other.x1);
        let y1 = self.y1.max(other.y1);
        let x2 = self.x2.min(other.x2);
        let y2 = self.y2.min(other.y2);

        if x2 < x1 || y2 < y1 {
            return 0.0;
        }

        let intersection = (x2 - x1) * (y2 - y1);
        let union = self.area() + other.area() - intersection;

        intersection / union
    }
}

/// One face detection
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Detection confidence (0.0-1.0)
    pub confidence: f32,
    /// Face bounding box (normalized coordinates)
    pub bbox: BoundingBox,
}
