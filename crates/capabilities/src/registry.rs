//! Capability registry
//!
//! Exactly-once, thread-safe lazy initialization of the shared
//! capabilities. Acquisition is double-checked: a fast uncontended read
//! of an already-initialized handle, then the per-group exclusive lock,
//! a re-check, and construction if the slot is still empty. A failed
//! construction leaves the slot empty, so the next acquiring job retries.
//!
//! The video classifier and the face localizer share one lock (they
//! share lifecycle) but are checked and constructed independently under
//! it, so a partial failure retries only the missing member.

use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use tracing::info;

use serde::{Deserialize, Serialize};

use crate::classifier::{ClassifierConfig, OnnxClassifier};
use crate::localizer::{LocalizerConfig, OnnxFaceLocalizer};
use crate::{CapabilityError, CapabilityKind, Classifier, FaceLocalizer};

/// Constructs capability handles on first use
///
/// The seam between the registry's concurrency contract and actual model
/// loading; production uses [`OnnxCapabilityLoader`], tests count or
/// fail constructions.
pub trait CapabilityLoader: Send + Sync {
    fn load_image_classifier(&self) -> Result<Arc<dyn Classifier>, CapabilityError>;
    fn load_video_classifier(&self) -> Result<Arc<dyn Classifier>, CapabilityError>;
    fn load_face_localizer(&self) -> Result<Arc<dyn FaceLocalizer>, CapabilityError>;
}

/// Model locations and inference settings for the production loader
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityConfig {
    /// Directory containing the ONNX model files
    pub model_dir: PathBuf,
    /// Image classifier model filename
    pub image_model: String,
    /// Video classifier model filename
    pub video_model: String,
    /// Face localizer model filename
    pub face_model: String,
    /// Classifier settings (shared by the image and video models)
    #[serde(default)]
    pub classifier: ClassifierConfig,
    /// Face localizer settings
    #[serde(default)]
    pub localizer: LocalizerConfig,
}

impl Default for CapabilityConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("models"),
            image_model: "image_classifier.onnx".to_string(),
            video_model: "video_classifier.onnx".to_string(),
            face_model: "face_localizer.onnx".to_string(),
            classifier: ClassifierConfig::default(),
            localizer: LocalizerConfig::default(),
        }
    }
}

/// Production loader building ONNX sessions from configured paths
pub struct OnnxCapabilityLoader {
    config: CapabilityConfig,
}

impl OnnxCapabilityLoader {
    #[must_use]
    pub fn new(config: CapabilityConfig) -> Self {
        Self { config }
    }
}

impl CapabilityLoader for OnnxCapabilityLoader {
    fn load_image_classifier(&self) -> Result<Arc<dyn Classifier>, CapabilityError> {
        let path = self.config.model_dir.join(&self.config.image_model);
        Ok(Arc::new(OnnxClassifier::new(
            path,
            self.config.classifier.clone(),
        )?))
    }

    fn load_video_classifier(&self) -> Result<Arc<dyn Classifier>, CapabilityError> {
        let path = self.config.model_dir.join(&self.config.video_model);
        Ok(Arc::new(OnnxClassifier::new(
            path,
            self.config.classifier.clone(),
        )?))
    }

    fn load_face_localizer(&self) -> Result<Arc<dyn FaceLocalizer>, CapabilityError> {
        let path = self.config.model_dir.join(&self.config.face_model);
        Ok(Arc::new(OnnxFaceLocalizer::new(
            path,
            self.config.localizer.clone(),
        )?))
    }
}

/// Slot for the video-lifecycle pair
#[derive(Default)]
struct VideoSlot {
    classifier: Option<Arc<dyn Classifier>>,
    localizer: Option<Arc<dyn FaceLocalizer>>,
}

/// Registry owning the lazily-initialized shared capabilities
///
/// One registry per process, handed to every worker. Handles are never
/// torn down during normal operation.
pub struct CapabilityRegistry {
    loader: Arc<dyn CapabilityLoader>,
    image: RwLock<Option<Arc<dyn Classifier>>>,
    video: RwLock<VideoSlot>,
}

impl CapabilityRegistry {
    #[must_use]
    pub fn new(loader: Arc<dyn CapabilityLoader>) -> Self {
        Self {
            loader,
            image: RwLock::new(None),
            video: RwLock::new(VideoSlot::default()),
        }
    }

    /// Acquire the image classifier, constructing it on first use
    ///
    /// # Errors
    ///
    /// Returns the construction error; the slot stays empty so a later
    /// acquisition retries.
    pub fn image_classifier(&self) -> Result<Arc<dyn Classifier>, CapabilityError> {
        if let Some(handle) = self
            .image
            .read()
            .map_err(|_| CapabilityError::Poisoned)?
            .as_ref()
        {
            return Ok(Arc::clone(handle));
        }

        let mut slot = self.image.write().map_err(|_| CapabilityError::Poisoned)?;
        if let Some(handle) = slot.as_ref() {
            return Ok(Arc::clone(handle));
        }

        info!(
            kind = CapabilityKind::ImageClassifier.name(),
            "loading capability (first use)"
        );
        let handle = self.loader.load_image_classifier()?;
        *slot = Some(Arc::clone(&handle));
        Ok(handle)
    }

    /// Acquire the video classifier and face localizer pair,
    /// constructing whichever is still missing
    ///
    /// # Errors
    ///
    /// Returns the first construction error; successfully constructed
    /// members stay cached.
    pub fn video_capabilities(
        &self,
    ) -> Result<(Arc<dyn Classifier>, Arc<dyn FaceLocalizer>), CapabilityError> {
        {
            let slot = self.video.read().map_err(|_| CapabilityError::Poisoned)?;
            if let (Some(classifier), Some(localizer)) = (&slot.classifier, &slot.localizer) {
                return Ok((Arc::clone(classifier), Arc::clone(localizer)));
            }
        }

        let mut slot = self.video.write().map_err(|_| CapabilityError::Poisoned)?;
        if slot.classifier.is_none() {
            info!(
                kind = CapabilityKind::VideoClassifier.name(),
                "loading capability (first use)"
            );
            slot.classifier = Some(self.loader.load_video_classifier()?);
        }
        if slot.localizer.is_none() {
            info!(
                kind = CapabilityKind::FaceLocalizer.name(),
                "loading capability (first use)"
            );
            slot.localizer = Some(self.loader.load_face_localizer()?);
        }

        // Both present after the fills above
        let classifier = slot.classifier.as_ref().map(Arc::clone);
        let localizer = slot.localizer.as_ref().map(Arc::clone);
        match (classifier, localizer) {
            (Some(c), Some(l)) => Ok((c, l)),
            _ => Err(CapabilityError::Inference(
                "video capability slot unexpectedly empty".to_string(),
            )),
        }
    }
}
