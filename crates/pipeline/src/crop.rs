//! Stage 1: face-localized crop
//!
//! Per frame, independently: localize faces; when at least one is found,
//! crop to the first detection's padded bounding box and resize the crop
//! back to the frame's original dimensions so output geometry is
//! preserved. Frames without a detection pass through unchanged. No
//! temporal tracking or smoothing across frames.

use image::RgbImage;
use std::path::Path;
use tracing::info;

use veriframe_capabilities::{Detection, FaceLocalizer};
use veriframe_common::{ProcessingError, Result};
use veriframe_media_io::{probe, read_frames, VideoSink};

/// Fixed padding added to each side of a detected face box, in pixels
pub const FACE_CROP_PADDING: u32 = 20;

/// Expand a pixel-space face box by the fixed padding and clamp to the
/// frame
///
/// Returns `(x1, y1, x2, y2)` with `x2`/`y2` exclusive.
#[must_use]
pub fn padded_crop_rect(
    x: i64,
    y: i64,
    width: i64,
    height: i64,
    frame_width: u32,
    frame_height: u32,
) -> (u32, u32, u32, u32) {
    let pad = i64::from(FACE_CROP_PADDING);
    let x1 = (x - pad).clamp(0, i64::from(frame_width)) as u32;
    let y1 = (y - pad).clamp(0, i64::from(frame_height)) as u32;
    let x2 = (x + width + pad).clamp(0, i64::from(frame_width)) as u32;
    let y2 = (y + height + pad).clamp(0, i64::from(frame_height)) as u32;
    (x1, y1, x2, y2)
}

/// Crop a frame to a detection's padded box, resized back to the frame's
/// dimensions; degenerate boxes leave the frame unchanged
fn crop_frame_to_face(frame: &RgbImage, face: &Detection) -> RgbImage {
    let (frame_width, frame_height) = frame.dimensions();

    let x = (face.bbox.x1 * frame_width as f32) as i64;
    let y = (face.bbox.y1 * frame_height as f32) as i64;
    let width = (face.bbox.width() * frame_width as f32) as i64;
    let height = (face.bbox.height() * frame_height as f32) as i64;

    let (x1, y1, x2, y2) = padded_crop_rect(x, y, width, height, frame_width, frame_height);
    if x2 <= x1 || y2 <= y1 {
        return frame.clone();
    }

    let cropped = image::imageops::crop_imm(frame, x1, y1, x2 - x1, y2 - y1).to_image();
    image::imageops::resize(
        &cropped,
        frame_width,
        frame_height,
        image::imageops::FilterType::Triangle,
    )
}

/// Run the face-crop stage over a whole video
///
/// # Errors
///
/// Returns an error if the input cannot be decoded, the output cannot be
/// written, or face localization fails. The caller logs the failure and
/// continues; a missing output surfaces downstream as zero sampleable
/// frames.
pub fn crop_stage(
    input_path: &Path,
    output_path: &Path,
    localizer: &dyn FaceLocalizer,
) -> Result<u64> {
    let meta = probe(input_path)?;
    let mut sink = VideoSink::create(output_path, &meta)?;

    read_frames(input_path, |_, frame| {
        let detections = localizer
            .detect(&frame)
            .map_err(|e| ProcessingError::Pipeline(format!("face localization failed: {e}")))?;

        let processed = match detections.first() {
            Some(face) => crop_frame_to_face(&frame, face),
            None => frame,
        };
        sink.write_frame(&processed)
    })?;

    let frames = sink.finish()?;
    info!(
        input = %input_path.display(),
        frames,
        "face crop stage complete"
    );
    Ok(frames)
}
