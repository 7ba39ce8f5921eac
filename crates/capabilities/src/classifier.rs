//! ONNX-backed authenticity classifier
//!
//! Wraps one classification model scoring frames for the AI-generated
//! class. The same implementation serves the image model (batch of one)
//! and the video model (batch of sampled frames).

use image::RgbImage;
use ndarray::Array4;
use ort::{session::Session, value::TensorRef};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

use crate::session::create_session;
use crate::{CapabilityError, Classifier};

/// Output names probed when the model does not declare a configured one
const DEFAULT_OUTPUT_NAMES: &[&str] = &["predictions", "output", "sigmoid", "dense"];

/// Configuration for an authenticity classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Square input size the model expects
    pub input_size: u32,
    /// Output tensor name; when unset, common names are probed
    pub output_name: Option<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            input_size: 150,
            output_name: None,
        }
    }
}

/// Authenticity classifier running an ONNX session
///
/// The session is wrapped in a `Mutex` for interior mutability
/// (`Session::run` requires `&mut self`); one batch locks it for the
/// duration of inference.
pub struct OnnxClassifier {
    session: Mutex<Session>,
    config: ClassifierConfig,
}

impl OnnxClassifier {
    /// Load a classifier from an ONNX model file
    ///
    /// # Errors
    ///
    /// Returns an error if the model cannot be loaded.
    pub fn new<P: AsRef<Path>>(
        model_path: P,
        config: ClassifierConfig,
    ) -> Result<Self, CapabilityError> {
        let model_path = model_path.as_ref();
        info!("Loading classifier model from {:?}", model_path);

        let session = create_session(model_path)?;

        info!(
            "Classifier model loaded (input size: {0}x{0})",
            config.input_size
        );

        Ok(Self {
            session: Mutex::new(session),
            config,
        })
    }

    /// Assemble a NHWC batch tensor, resizing frames and scaling channel
    /// values to [0, 1]
    fn preprocess(&self, frames: &[RgbImage]) -> Array4<f32> {
        let size = self.config.input_size as usize;
        let mut input = Array4::<f32>::zeros((frames.len(), size, size, 3));

        for (i, frame) in frames.iter().enumerate() {
            let resized;
            let pixels = if frame.dimensions() == (size as u32, size as u32) {
                frame
            } else {
                resized = image::imageops::resize(
                    frame,
                    size as u32,
                    size as u32,
                    image::imageops::FilterType::Triangle,
                );
                &resized
            };

            for y in 0..size {
                for x in 0..size {
                    let pixel = pixels.get_pixel(x as u32, y as u32);
                    input[[i, y, x, 0]] = f32::from(pixel[0]) / 255.0;
                    input[[i, y, x, 1]] = f32::from(pixel[1]) / 255.0;
                    input[[i, y, x, 2]] = f32::from(pixel[2]) / 255.0;
                }
            }
        }

        input
    }
}

impl Classifier for OnnxClassifier {
    fn predict(&self, frames: &[RgbImage]) -> Result<Vec<f32>, CapabilityError> {
        if frames.is_empty() {
            return Ok(Vec::new());
        }

        let input = self.preprocess(frames);

        let mut session = self.session.lock().map_err(|_| CapabilityError::Poisoned)?;

        let input_tensor = TensorRef::from_array_view(input.view())
            .map_err(|e| CapabilityError::Inference(e.to_string()))?;

        let outputs = session
            .run(ort::inputs![input_tensor])
            .map_err(|e| CapabilityError::Inference(e.to_string()))?;

        let value = match &self.config.output_name {
            Some(name) => outputs.get(name.as_str()),
            None => DEFAULT_OUTPUT_NAMES
                .iter()
                .copied()
                .find_map(|name| outputs.get(name)),
        }
        .ok_or_else(|| {
            CapabilityError::Postprocess(format!(
                "No usable output tensor (looked for {:?})",
                self.config
                    .output_name
                    .as_deref()
                    .map_or_else(|| DEFAULT_OUTPUT_NAMES.to_vec(), |n| vec![n])
            ))
        })?;

        let (shape, data) = value
            .try_extract_tensor::<f32>()
            .map_err(|e| CapabilityError::Postprocess(format!("Failed to extract scores: {e}")))?;

        // Accept [n], [n, 1] or any [n, k] layout and take the first
        // score per row
        let rows = if shape.len() == 0 { 0 } else { shape[0] as usize };
        if rows != frames.len() || data.is_empty() {
            return Err(CapabilityError::Postprocess(format!(
                "Score tensor shape {shape:?} does not match batch of {}",
                frames.len()
            )));
        }
        let stride = data.len() / rows;

        let scores: Vec<f32> = (0..rows).map(|i| data[i * stride]).collect();
        debug!("classifier scored {} frames", scores.len());

        Ok(scores)
    }
}
