//! Shared fixtures for the workspace test suites
#![allow(dead_code)]

use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use image::{Rgb, RgbImage};

use veriframe_capabilities::{
    BoundingBox, CapabilityError, CapabilityLoader, Classifier, Detection, FaceLocalizer,
};
use veriframe_media_io::{VideoMeta, VideoSink};

/// Classifier returning one fixed score per frame
pub struct FixedClassifier(pub f32);

impl Classifier for FixedClassifier {
    fn predict(&self, frames: &[RgbImage]) -> Result<Vec<f32>, CapabilityError> {
        Ok(vec![self.0; frames.len()])
    }
}

/// Classifier returning a preset score sequence; fails on batch size
/// mismatch so tests catch sampling regressions
pub struct SequenceClassifier(pub Vec<f32>);

impl Classifier for SequenceClassifier {
    fn predict(&self, frames: &[RgbImage]) -> Result<Vec<f32>, CapabilityError> {
        if frames.len() != self.0.len() {
            return Err(CapabilityError::Inference(format!(
                "expected a batch of {}, got {}",
                self.0.len(),
                frames.len()
            )));
        }
        Ok(self.0.clone())
    }
}

/// Localizer reporting one fixed face box on every frame
pub struct FixedBoxLocalizer(pub BoundingBox);

impl FaceLocalizer for FixedBoxLocalizer {
    fn detect(&self, _frame: &RgbImage) -> Result<Vec<Detection>, CapabilityError> {
        Ok(vec![Detection {
            confidence: 0.93,
            bbox: self.0,
        }])
    }
}

/// Localizer that never finds a face
pub struct NoFaces;

impl FaceLocalizer for NoFaces {
    fn detect(&self, _frame: &RgbImage) -> Result<Vec<Detection>, CapabilityError> {
        Ok(Vec::new())
    }
}

/// Loader serving fixed mocks while counting constructions per kind
pub struct CountingLoader {
    pub image_score: f32,
    pub video_score: f32,
    pub image_loads: AtomicUsize,
    pub video_loads: AtomicUsize,
    pub localizer_loads: AtomicUsize,
}

impl CountingLoader {
    pub fn new(image_score: f32, video_score: f32) -> Self {
        Self {
            image_score,
            video_score,
            image_loads: AtomicUsize::new(0),
            video_loads: AtomicUsize::new(0),
            localizer_loads: AtomicUsize::new(0),
        }
    }
}

impl CapabilityLoader for CountingLoader {
    fn load_image_classifier(&self) -> Result<Arc<dyn Classifier>, CapabilityError> {
        self.image_loads.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(FixedClassifier(self.image_score)))
    }

    fn load_video_classifier(&self) -> Result<Arc<dyn Classifier>, CapabilityError> {
        self.video_loads.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(FixedClassifier(self.video_score)))
    }

    fn load_face_localizer(&self) -> Result<Arc<dyn FaceLocalizer>, CapabilityError> {
        self.localizer_loads.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(NoFaces))
    }
}

/// Encode a small PNG in memory
pub fn png_bytes() -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    RgbImage::from_pixel(64, 48, Rgb([90, 120, 30]))
        .write_to(&mut buffer, image::ImageFormat::Png)
        .unwrap();
    buffer.into_inner()
}

/// Synthesize a short test video with deterministic frame content
pub fn write_test_video(
    path: &Path,
    frames: u32,
    width: u32,
    height: u32,
) -> anyhow::Result<()> {
    let meta = VideoMeta {
        width,
        height,
        fps: 15.0,
    };
    let mut sink = VideoSink::create(path, &meta)?;
    for i in 0..frames {
        let frame = RgbImage::from_fn(width, height, |x, y| {
            Rgb([
                (x * 3 + i * 2) as u8,
                (y * 5 + i) as u8,
                ((x + y) * 2) as u8,
            ])
        });
        sink.write_frame(&frame)?;
    }
    sink.finish()?;
    Ok(())
}
