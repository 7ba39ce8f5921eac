//! Media decode/encode layer
//!
//! Wraps `ffmpeg-next` behind three small surfaces the pipeline needs:
//! sequential per-frame video reading ([`read_frames`], [`first_frame`]),
//! sequential video writing ([`VideoSink`]), and still-image helpers
//! ([`image_io`]). Frames cross the boundary as `image::RgbImage` so the
//! transform stages never touch FFmpeg types.
//!
//! Uses multi-threaded software decoding; frames are converted to RGB24
//! through the software scaler on the way out.

pub mod image_io;
mod read;
mod write;

pub use image_io::{load_rgb, save_jpeg, write_video_thumbnail};
pub use read::{first_frame, read_frames};
pub use write::VideoSink;

use ffmpeg_next as ffmpeg;
use std::path::Path;
use veriframe_common::{ProcessingError, Result};

/// Initialize the `FFmpeg` library
pub(crate) fn init_ffmpeg() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        ffmpeg::init().expect("Failed to initialize FFmpeg");
    });
}

/// Geometry and timing of a video stream
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoMeta {
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Average frame rate; falls back to 30 when the container does not
    /// report one
    pub fps: f64,
}

/// Probe a video file for its stream geometry
///
/// # Errors
///
/// Returns an error if the file cannot be opened or has no video stream.
pub fn probe(input_path: &Path) -> Result<VideoMeta> {
    init_ffmpeg();

    let ictx = ffmpeg::format::input(&input_path)
        .map_err(|e| ProcessingError::FFmpegError(format!("Failed to open input file: {e}")))?;

    let stream = ictx
        .streams()
        .best(ffmpeg::media::Type::Video)
        .ok_or(ProcessingError::NoVideoStream)?;

    let rate = stream.avg_frame_rate();
    let fps = if rate.1 != 0 && rate.0 > 0 {
        f64::from(rate.0) / f64::from(rate.1)
    } else {
        30.0
    };

    let decoder = ffmpeg::codec::context::Context::from_parameters(stream.parameters())
        .map_err(|e| ProcessingError::FFmpegError(format!("Failed to create context: {e}")))?
        .decoder()
        .video()
        .map_err(|e| ProcessingError::FFmpegError(format!("Failed to create decoder: {e}")))?;

    Ok(VideoMeta {
        width: decoder.width(),
        height: decoder.height(),
        fps,
    })
}
