//! Single-frame image analysis

use std::path::Path;
use tracing::debug;

use veriframe_capabilities::Classifier;
use veriframe_common::{ProcessingError, Result, Verdict};
use veriframe_media_io::load_rgb;

/// Analyze an uploaded image
///
/// Decodes the upload and runs the image classifier on it (the
/// classifier resizes to its model input and scales channels to [0, 1]).
///
/// # Errors
///
/// Returns an error if the image cannot be decoded or inference fails.
pub fn analyze_image(upload_path: &Path, classifier: &dyn Classifier) -> Result<Verdict> {
    let image = load_rgb(upload_path)?;

    let scores = classifier.predict(&[image]).map_err(|e| {
        ProcessingError::Pipeline(format!("image classifier inference failed: {e}"))
    })?;
    let score = scores.first().copied().ok_or_else(|| {
        ProcessingError::Pipeline("image classifier returned no score".to_string())
    })?;

    let verdict = Verdict::from_probability(f64::from(score));
    debug!(
        score,
        label = verdict.label.as_str(),
        "image analysis complete"
    );
    Ok(verdict)
}
