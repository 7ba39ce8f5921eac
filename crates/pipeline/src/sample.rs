//! Stage 3: sampled-frame inference aggregation
//!
//! Reads the augmented video, samples every 15th decoded frame
//! (1-indexed counter), batches the samples through the video classifier
//! once, and averages the per-frame scores into one verdict. Zero
//! sampled frames is a fatal pipeline error, never a default verdict.

use image::RgbImage;
use std::path::Path;
use tracing::info;

use veriframe_capabilities::Classifier;
use veriframe_common::{ProcessingError, Result, Verdict};
use veriframe_media_io::read_frames;

/// Every Nth decoded frame is sampled for inference
pub const SAMPLE_INTERVAL: u64 = 15;

/// Square input size sampled frames are resized to before batching
pub const MODEL_FRAME_SIZE: u32 = 150;

/// Whether the 1-indexed frame counter selects this frame
#[must_use]
pub fn is_sampled(frame_count: u64) -> bool {
    frame_count % SAMPLE_INTERVAL == 0
}

/// Arithmetic mean of per-frame scores; `None` for an empty batch
#[must_use]
pub fn aggregate_scores(scores: &[f32]) -> Option<f64> {
    if scores.is_empty() {
        return None;
    }
    Some(scores.iter().map(|&s| f64::from(s)).sum::<f64>() / scores.len() as f64)
}

/// Run the sampling and aggregation stage
///
/// Returns the verdict and the number of sampled frames.
///
/// # Errors
///
/// Returns a fatal pipeline error when no frames can be sampled (short
/// or unreadable video, or missing upstream stage output), or when
/// inference fails.
pub fn sample_stage(input_path: &Path, classifier: &dyn Classifier) -> Result<(Verdict, usize)> {
    let mut samples: Vec<RgbImage> = Vec::new();

    let decoded = read_frames(input_path, |frame_number, frame| {
        if is_sampled(frame_number + 1) {
            samples.push(image::imageops::resize(
                &frame,
                MODEL_FRAME_SIZE,
                MODEL_FRAME_SIZE,
                image::imageops::FilterType::Triangle,
            ));
        }
        Ok(())
    })
    .map_err(|e| {
        ProcessingError::Pipeline(format!("could not read processed video for analysis: {e}"))
    })?;

    if samples.is_empty() {
        return Err(ProcessingError::Pipeline(
            "no frames extracted from the processed video for analysis".to_string(),
        ));
    }

    let scores = classifier.predict(&samples).map_err(|e| {
        ProcessingError::Pipeline(format!("video classifier inference failed: {e}"))
    })?;
    if scores.len() != samples.len() {
        return Err(ProcessingError::Pipeline(format!(
            "video classifier returned {} scores for {} frames",
            scores.len(),
            samples.len()
        )));
    }

    // Non-empty by the check above
    let mean = aggregate_scores(&scores).unwrap_or(0.0);
    let verdict = Verdict::from_probability(mean);

    info!(
        decoded,
        sampled = samples.len(),
        mean,
        label = verdict.label.as_str(),
        "sampled inference complete"
    );

    Ok((verdict, samples.len()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sampling_selects_every_fifteenth_frame() {
        let sampled: Vec<u64> = (1..=100).filter(|&count| is_sampled(count)).collect();
        assert_eq!(sampled, vec![15, 30, 45, 60, 75, 90]);
    }

    #[test]
    fn test_sample_count_is_floor_of_frames_over_interval() {
        for frames in [0u64, 1, 14, 15, 29, 30, 44, 45, 150] {
            let sampled = (1..=frames).filter(|&count| is_sampled(count)).count() as u64;
            assert_eq!(sampled, frames / SAMPLE_INTERVAL);
        }
    }

    #[test]
    fn test_aggregate_is_arithmetic_mean() {
        let mean = aggregate_scores(&[0.2, 0.4, 0.9]).unwrap();
        assert!((mean - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_aggregate_empty_is_none() {
        assert!(aggregate_scores(&[]).is_none());
    }

    #[test]
    fn test_unreadable_input_is_fatal() {
        struct Unused;
        impl Classifier for Unused {
            fn predict(
                &self,
                _frames: &[RgbImage],
            ) -> std::result::Result<Vec<f32>, veriframe_capabilities::CapabilityError>
            {
                unreachable!("classifier must not run without samples")
            }
        }

        let result = sample_stage(Path::new("/nonexistent/clip_aug.mp4"), &Unused);
        assert!(matches!(result, Err(ProcessingError::Pipeline(_))));
    }
}
