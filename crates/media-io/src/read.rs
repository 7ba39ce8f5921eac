//! Sequential per-frame video reading

use ffmpeg_next as ffmpeg;
use image::RgbImage;
use std::path::Path;

use veriframe_common::{ProcessingError, Result};

use crate::init_ffmpeg;

/// Decode a video and visit every frame in decode order as RGB
///
/// The visitor receives the 0-indexed decoded frame number and the frame
/// pixels. Returns the total number of decoded frames.
///
/// # Errors
///
/// Returns an error if the input cannot be opened, has no video stream,
/// a frame cannot be converted, or the visitor fails.
pub fn read_frames<F>(input_path: &Path, mut visit: F) -> Result<u64>
where
    F: FnMut(u64, RgbImage) -> Result<()>,
{
    init_ffmpeg();

    let mut ictx = ffmpeg::format::input(&input_path)
        .map_err(|e| ProcessingError::FFmpegError(format!("Failed to open input file: {e}")))?;

    let stream = ictx
        .streams()
        .best(ffmpeg::media::Type::Video)
        .ok_or(ProcessingError::NoVideoStream)?;
    let stream_index = stream.index();

    let mut decoder = ffmpeg::codec::context::Context::from_parameters(stream.parameters())
        .map_err(|e| ProcessingError::FFmpegError(format!("Failed to create context: {e}")))?
        .decoder()
        .video()
        .map_err(|e| ProcessingError::FFmpegError(format!("Failed to create decoder: {e}")))?;

    let mut scaler = ffmpeg::software::scaling::Context::get(
        decoder.format(),
        decoder.width(),
        decoder.height(),
        ffmpeg::format::Pixel::RGB24,
        decoder.width(),
        decoder.height(),
        ffmpeg::software::scaling::Flags::BILINEAR,
    )
    .map_err(|e| ProcessingError::FFmpegError(format!("Failed to create scaler: {e}")))?;

    let mut decoded = ffmpeg::util::frame::video::Video::empty();
    let mut converted = ffmpeg::util::frame::video::Video::empty();
    let mut frame_number = 0u64;

    for (stream, packet) in ictx.packets() {
        if stream.index() != stream_index {
            continue;
        }
        if decoder.send_packet(&packet).is_ok() {
            while decoder.receive_frame(&mut decoded).is_ok() {
                scaler.run(&decoded, &mut converted).map_err(|e| {
                    ProcessingError::FFmpegError(format!("Failed to convert frame: {e}"))
                })?;
                visit(frame_number, rgb_frame_to_image(&converted)?)?;
                frame_number += 1;
            }
        }
    }

    // Flush the decoder
    decoder.send_eof().ok();
    while decoder.receive_frame(&mut decoded).is_ok() {
        scaler
            .run(&decoded, &mut converted)
            .map_err(|e| ProcessingError::FFmpegError(format!("Failed to convert frame: {e}")))?;
        visit(frame_number, rgb_frame_to_image(&converted)?)?;
        frame_number += 1;
    }

    Ok(frame_number)
}

/// Decode only the first frame of a video
///
/// Used for thumbnail extraction; stops reading as soon as one frame
/// decodes successfully.
///
/// # Errors
///
/// Returns an error if the input cannot be opened or no frame decodes.
pub fn first_frame(input_path: &Path) -> Result<RgbImage> {
    init_ffmpeg();

    let mut ictx = ffmpeg::format::input(&input_path)
        .map_err(|e| ProcessingError::FFmpegError(format!("Failed to open input file: {e}")))?;

    let stream = ictx
        .streams()
        .best(ffmpeg::media::Type::Video)
        .ok_or(ProcessingError::NoVideoStream)?;
    let stream_index = stream.index();

    let mut decoder = ffmpeg::codec::context::Context::from_parameters(stream.parameters())
        .map_err(|e| ProcessingError::FFmpegError(format!("Failed to create context: {e}")))?
        .decoder()
        .video()
        .map_err(|e| ProcessingError::FFmpegError(format!("Failed to create decoder: {e}")))?;

    let mut scaler = ffmpeg::software::scaling::Context::get(
        decoder.format(),
        decoder.width(),
        decoder.height(),
        ffmpeg::format::Pixel::RGB24,
        decoder.width(),
        decoder.height(),
        ffmpeg::software::scaling::Flags::BILINEAR,
    )
    .map_err(|e| ProcessingError::FFmpegError(format!("Failed to create scaler: {e}")))?;

    let mut decoded = ffmpeg::util::frame::video::Video::empty();
    let mut converted = ffmpeg::util::frame::video::Video::empty();

    for (stream, packet) in ictx.packets() {
        if stream.index() != stream_index {
            continue;
        }
        if decoder.send_packet(&packet).is_ok() && decoder.receive_frame(&mut decoded).is_ok() {
            scaler
                .run(&decoded, &mut converted)
                .map_err(|e| ProcessingError::FFmpegError(format!("Failed to convert frame: {e}")))?;
            return rgb_frame_to_image(&converted);
        }
    }

    // Codecs with decode delay may only surface the frame on flush
    decoder.send_eof().ok();
    if decoder.receive_frame(&mut decoded).is_ok() {
        scaler
            .run(&decoded, &mut converted)
            .map_err(|e| ProcessingError::FFmpegError(format!("Failed to convert frame: {e}")))?;
        return rgb_frame_to_image(&converted);
    }

    Err(ProcessingError::FFmpegError(
        "No decodable frame found".to_string(),
    ))
}

/// Copy an RGB24 frame into a contiguous `RgbImage`, honoring row stride
fn rgb_frame_to_image(frame: &ffmpeg::util::frame::video::Video) -> Result<RgbImage> {
    let width = frame.width() as usize;
    let height = frame.height() as usize;
    let stride = frame.stride(0);
    let plane = frame.data(0);

    let mut data = Vec::with_capacity(width * height * 3);
    for y in 0..height {
        let row_start = y * stride;
        data.extend_from_slice(&plane[row_start..row_start + width * 3]);
    }

    RgbImage::from_raw(frame.width(), frame.height(), data)
        .ok_or_else(|| ProcessingError::ImageError("Frame buffer size mismatch".to_string()))
}
