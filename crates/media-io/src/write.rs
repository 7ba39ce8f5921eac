//! Sequential video writing

use ffmpeg_next as ffmpeg;
use image::RgbImage;
use std::path::Path;
use tracing::debug;

use veriframe_common::{ProcessingError, Result};

use crate::{init_ffmpeg, VideoMeta};

/// Sequential single-stream video encoder
///
/// Writes RGB frames to a file at a fixed geometry, converting to YUV420P
/// on the way in. Frames are timestamped by arrival order at the target
/// frame rate. `finish` must be called to flush the encoder and write the
/// container trailer; a sink dropped without it leaves an unreadable file.
pub struct VideoSink {
    octx: ffmpeg::format::context::Output,
    encoder: ffmpeg::encoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    encoder_time_base: ffmpeg::Rational,
    stream_index: usize,
    frame_index: i64,
    width: u32,
    height: u32,
}

impl VideoSink {
    /// Create a sink writing to `output_path` with the given geometry
    ///
    /// # Errors
    ///
    /// Returns an error if the output cannot be created or the encoder is
    /// unavailable.
    pub fn create(output_path: &Path, meta: &VideoMeta) -> Result<Self> {
        init_ffmpeg();

        let mut octx = ffmpeg::format::output(&output_path).map_err(|e| {
            ProcessingError::FFmpegError(format!("Failed to create output file: {e}"))
        })?;

        let codec = ffmpeg::encoder::find(ffmpeg::codec::Id::MPEG4).ok_or_else(|| {
            ProcessingError::FFmpegError("MPEG4 encoder not available".to_string())
        })?;

        let global_header = octx
            .format()
            .flags()
            .contains(ffmpeg::format::Flags::GLOBAL_HEADER);

        let fps = if meta.fps.is_finite() && meta.fps >= 1.0 {
            meta.fps.round() as i32
        } else {
            30
        };
        let encoder_time_base = ffmpeg::Rational(1, fps);

        let mut video = ffmpeg::codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()
            .map_err(|e| ProcessingError::FFmpegError(format!("Failed to create encoder: {e}")))?;
        video.set_width(meta.width);
        video.set_height(meta.height);
        video.set_format(ffmpeg::format::Pixel::YUV420P);
        video.set_time_base(encoder_time_base);
        video.set_frame_rate(Some(ffmpeg::Rational(fps, 1)));
        video.set_bit_rate(2_000_000);
        if global_header {
            video.set_flags(ffmpeg::codec::Flags::GLOBAL_HEADER);
        }

        let encoder = video
            .open()
            .map_err(|e| ProcessingError::FFmpegError(format!("Failed to open encoder: {e}")))?;

        let stream_index = {
            let mut ost = octx.add_stream(codec).map_err(|e| {
                ProcessingError::FFmpegError(format!("Failed to add output stream: {e}"))
            })?;
            ost.set_parameters(&encoder);
            ost.set_time_base(encoder_time_base);
            ost.index()
        };

        octx.write_header()
            .map_err(|e| ProcessingError::FFmpegError(format!("Failed to write header: {e}")))?;

        let scaler = ffmpeg::software::scaling::Context::get(
            ffmpeg::format::Pixel::RGB24,
            meta.width,
            meta.height,
            ffmpeg::format::Pixel::YUV420P,
            meta.width,
            meta.height,
            ffmpeg::software::scaling::Flags::BILINEAR,
        )
        .map_err(|e| ProcessingError::FFmpegError(format!("Failed to create scaler: {e}")))?;

        debug!(
            path = %output_path.display(),
            width = meta.width,
            height = meta.height,
            fps,
            "video sink opened"
        );

        Ok(Self {
            octx,
            encoder,
            scaler,
            encoder_time_base,
            stream_index,
            frame_index: 0,
            width: meta.width,
            height: meta.height,
        })
    }

    /// Encode one frame; dimensions must match the sink geometry
    ///
    /// # Errors
    ///
    /// Returns an error on geometry mismatch or encoder failure.
    pub fn write_frame(&mut self, image: &RgbImage) -> Result<()> {
        let (width, height) = image.dimensions();
        if (width, height) != (self.width, self.height) {
            return Err(ProcessingError::FFmpegError(format!(
                "Frame size {width}x{height} does not match sink {}x{}",
                self.width, self.height
            )));
        }

        let mut rgb =
            ffmpeg::util::frame::video::Video::new(ffmpeg::format::Pixel::RGB24, width, height);
        {
            let stride = rgb.stride(0);
            let plane = rgb.data_mut(0);
            let row_len = width as usize * 3;
            for (y, row) in image.as_raw().chunks_exact(row_len).enumerate() {
                plane[y * stride..y * stride + row_len].copy_from_slice(row);
            }
        }

        let mut yuv = ffmpeg::util::frame::video::Video::empty();
        self.scaler
            .run(&rgb, &mut yuv)
            .map_err(|e| ProcessingError::FFmpegError(format!("Failed to convert frame: {e}")))?;
        yuv.set_pts(Some(self.frame_index));
        self.frame_index += 1;

        self.encoder
            .send_frame(&yuv)
            .map_err(|e| ProcessingError::FFmpegError(format!("Failed to encode frame: {e}")))?;
        self.drain_packets()
    }

    /// Flush the encoder and finalize the container
    ///
    /// # Errors
    ///
    /// Returns an error if flushing or the trailer write fails.
    pub fn finish(mut self) -> Result<u64> {
        self.encoder
            .send_eof()
            .map_err(|e| ProcessingError::FFmpegError(format!("Failed to flush encoder: {e}")))?;
        self.drain_packets()?;
        self.octx
            .write_trailer()
            .map_err(|e| ProcessingError::FFmpegError(format!("Failed to write trailer: {e}")))?;
        Ok(self.frame_index as u64)
    }

    fn drain_packets(&mut self) -> Result<()> {
        let stream_time_base = self
            .octx
            .stream(self.stream_index)
            .map(|s| s.time_base())
            .unwrap_or(self.encoder_time_base);

        let mut packet = ffmpeg::Packet::empty();
        while self.encoder.receive_packet(&mut packet).is_ok() {
            packet.set_stream(self.stream_index);
            packet.rescale_ts(self.encoder_time_base, stream_time_base);
            packet.write_interleaved(&mut self.octx).map_err(|e| {
                ProcessingError::FFmpegError(format!("Failed to write packet: {e}"))
            })?;
        }
        Ok(())
    }
}
