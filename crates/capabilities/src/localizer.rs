//! ONNX-backed face localizer
//!
//! Runs an UltraFace-style detection model: two-class scores plus
//! normalized corner boxes per candidate. Candidates below the
//! confidence threshold are dropped and overlapping boxes suppressed.

use image::RgbImage;
use ndarray::Array4;
use ort::{
    session::{Session, SessionOutputs},
    value::TensorRef,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

use crate::session::create_session;
use crate::{BoundingBox, CapabilityError, Detection, FaceLocalizer};

/// Configuration for face localization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalizerConfig {
    /// Minimum confidence threshold for detections (0.0-1.0)
    pub confidence_threshold: f32,
    /// `IoU` threshold for non-maximum suppression (0.0-1.0)
    pub nms_threshold: f32,
    /// Model input size (width, height)
    pub input_size: (u32, u32),
}

impl Default for LocalizerConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.50,
            // Strict suppression: the model emits many overlapping
            // candidates per face
            nms_threshold: 0.25,
            input_size: (320, 240),
        }
    }
}

/// Face localizer running an ONNX session
pub struct OnnxFaceLocalizer {
    session: Mutex<Session>,
    config: LocalizerConfig,
}

impl OnnxFaceLocalizer {
    /// Load a localizer from an ONNX model file
    ///
    /// # Errors
    ///
    /// Returns an error if the model cannot be loaded.
    pub fn new<P: AsRef<Path>>(
        model_path: P,
        config: LocalizerConfig,
    ) -> Result<Self, CapabilityError> {
        let model_path = model_path.as_ref();
        info!("Loading face localizer model from {:?}", model_path);

        let session = create_session(model_path)?;

        info!(
            "Face localizer model loaded (input size: {}x{})",
            config.input_size.0, config.input_size.1
        );

        Ok(Self {
            session: Mutex::new(session),
            config,
        })
    }

    /// Convert a frame to the model's CHW input with (p - 127) / 128
    /// normalization
    fn preprocess(&self, image: &RgbImage) -> Array4<f32> {
        let (input_width, input_height) = self.config.input_size;
        let resized = image::imageops::resize(
            image,
            input_width,
            input_height,
            image::imageops::FilterType::Triangle,
        );

        let mut input =
            Array4::<f32>::zeros((1, 3, input_height as usize, input_width as usize));
        for y in 0..input_height as usize {
            for x in 0..input_width as usize {
                let pixel = resized.get_pixel(x as u32, y as u32);
                input[[0, 0, y, x]] = (f32::from(pixel[0]) - 127.0) / 128.0;
                input[[0, 1, y, x]] = (f32::from(pixel[1]) - 127.0) / 128.0;
                input[[0, 2, y, x]] = (f32::from(pixel[2]) - 127.0) / 128.0;
            }
        }

        input
    }

    /// Decode scores + boxes into thresholded detections
    fn postprocess(
        outputs: SessionOutputs,
        config: &LocalizerConfig,
    ) -> Result<Vec<Detection>, CapabilityError> {
        // Scores: [1, N, 2] as [background, face] per candidate
        let scores_value = outputs
            .get("confidences")
            .or_else(|| outputs.get("scores"))
            .ok_or_else(|| {
                CapabilityError::Postprocess("confidences/scores output not found".into())
            })?;
        let (scores_shape, scores_data) = scores_value
            .try_extract_tensor::<f32>()
            .map_err(|e| CapabilityError::Postprocess(format!("Failed to extract scores: {e}")))?;

        // Boxes: [1, N, 4] as normalized [x1, y1, x2, y2]
        let boxes_value = outputs
            .get("boxes")
            .ok_or_else(|| CapabilityError::Postprocess("boxes output not found".into()))?;
        let (boxes_shape, boxes_data) = boxes_value
            .try_extract_tensor::<f32>()
            .map_err(|e| CapabilityError::Postprocess(format!("Failed to extract boxes: {e}")))?;

        if scores_shape.len() != 3 || boxes_shape.len() != 3 || scores_shape[1] != boxes_shape[1] {
            return Err(CapabilityError::Postprocess(format!(
                "Invalid output shapes: scores={scores_shape:?}, boxes={boxes_shape:?}"
            )));
        }

        let num_boxes = scores_shape[1] as usize;
        let mut detections = Vec::with_capacity(num_boxes / 2);

        for i in 0..num_boxes {
            // The model emits raw logits; softmax over [background, face]
            let bg_logit = scores_data[i * 2];
            let face_logit = scores_data[i * 2 + 1];
            let exp_bg = bg_logit.exp();
            let exp_face = face_logit.exp();
            let confidence = exp_face / (exp_bg + exp_face);

            if confidence < config.confidence_threshold {
                continue;
            }

            let x1 = boxes_data[i * 4].clamp(0.0, 1.0);
            let y1 = boxes_data[i * 4 + 1].clamp(0.0, 1.0);
            let x2 = boxes_data[i * 4 + 2].clamp(0.0, 1.0);
            let y2 = boxes_data[i * 4 + 3].clamp(0.0, 1.0);

            if x2 <= x1 || y2 <= y1 {
                continue;
            }

            detections.push(Detection {
                confidence,
                bbox: BoundingBox { x1, y1, x2, y2 },
            });
        }

        Ok(non_maximum_suppression(detections, config.nms_threshold))
    }
}

impl FaceLocalizer for OnnxFaceLocalizer {
    fn detect(&self, frame: &RgbImage) -> Result<Vec<Detection>, CapabilityError> {
        let input = self.preprocess(frame);

        let mut session = self.session.lock().map_err(|_| CapabilityError::Poisoned)?;

        let input_tensor = TensorRef::from_array_view(input.view())
            .map_err(|e| CapabilityError::Inference(e.to_string()))?;

        let outputs = session
            .run(ort::inputs![input_tensor])
            .map_err(|e| CapabilityError::Inference(e.to_string()))?;

        let detections = Self::postprocess(outputs, &self.config)?;
        debug!("detected {} faces", detections.len());

        Ok(detections)
    }
}

/// Greedy NMS: keep the highest-confidence box, drop overlaps above the
/// threshold, repeat
fn non_maximum_suppression(mut detections: Vec<Detection>, nms_threshold: f32) -> Vec<Detection> {
    if detections.is_empty() {
        return detections;
    }

    detections.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut kept: Vec<Detection> = Vec::with_capacity(detections.len());
    for candidate in detections {
        if kept
            .iter()
            .all(|d| d.bbox.iou(&candidate.bbox) <= nms_threshold)
        {
            kept.push(candidate);
        }
    }

    kept
}
