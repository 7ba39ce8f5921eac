//! Stage 2: stochastic augmentation
//!
//! Each frame independently draws: a horizontal flip, exactly one of
//! color jitter or brightness/contrast perturbation (each offered at
//! 0.8 inside an always-entered branch, so occasionally neither
//! applies), Gaussian noise, and a lossy JPEG recompression with a
//! quality floor. Randomness comes from an explicit generator seeded
//! per job; frames still draw independently from that stream, so the
//! transform is not temporally consistent frame-to-frame.

use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::io::Cursor;
use std::path::Path;
use tracing::info;

use veriframe_common::{ProcessingError, Result};
use veriframe_media_io::{probe, read_frames, VideoSink};

/// Probabilities and ranges for the augmentation draws
#[derive(Debug, Clone)]
pub struct AugmentConfig {
    /// Horizontal flip probability
    pub flip_probability: f64,
    /// Probability that the chosen color-branch transform applies
    pub color_branch_probability: f64,
    /// Gaussian noise probability
    pub noise_probability: f64,
    /// Range the noise variance is drawn from
    pub noise_variance: (f64, f64),
    /// JPEG recompression probability
    pub compression_probability: f64,
    /// Lowest JPEG quality the recompression may pick
    pub compression_quality_floor: u8,
}

impl Default for AugmentConfig {
    fn default() -> Self {
        Self {
            flip_probability: 0.5,
            color_branch_probability: 0.8,
            noise_probability: 0.3,
            noise_variance: (10.0, 50.0),
            compression_probability: 0.5,
            compression_quality_floor: 70,
        }
    }
}

/// Apply one frame's worth of augmentation draws
///
/// # Errors
///
/// Returns an error only if the JPEG recompression round-trip fails.
pub fn augment_frame(
    mut frame: RgbImage,
    rng: &mut StdRng,
    config: &AugmentConfig,
) -> Result<RgbImage> {
    if rng.random::<f64>() < config.flip_probability {
        frame = image::imageops::flip_horizontal(&frame);
    }

    // One-of branch: pick color jitter or brightness/contrast with a fair
    // coin, then apply the pick at its own probability
    let pick_color_jitter = rng.random::<f64>() < 0.5;
    if rng.random::<f64>() < config.color_branch_probability {
        frame = if pick_color_jitter {
            color_jitter(&frame, rng)
        } else {
            brightness_contrast(&frame, rng)
        };
    }

    if rng.random::<f64>() < config.noise_probability {
        let variance = rng.random_range(config.noise_variance.0..=config.noise_variance.1);
        let seed = rng.random::<u64>();
        frame = imageproc::noise::gaussian_noise(&frame, 0.0, variance.sqrt(), seed);
    }

    if rng.random::<f64>() < config.compression_probability {
        let quality = rng.random_range(config.compression_quality_floor..=100);
        frame = recompress_jpeg(&frame, quality)?;
    }

    Ok(frame)
}

/// Run the augmentation stage over a whole video
///
/// # Errors
///
/// Returns an error if the input cannot be decoded or the output cannot
/// be written. The caller logs the failure and continues; a missing
/// output surfaces downstream as zero sampleable frames.
pub fn augment_stage(
    input_path: &Path,
    output_path: &Path,
    seed: u64,
    config: &AugmentConfig,
) -> Result<u64> {
    let meta = probe(input_path)?;
    let mut sink = VideoSink::create(output_path, &meta)?;
    let mut rng = StdRng::seed_from_u64(seed);

    read_frames(input_path, |_, frame| {
        let augmented = augment_frame(frame, &mut rng, config)?;
        sink.write_frame(&augmented)
    })?;

    let frames = sink.finish()?;
    info!(
        input = %input_path.display(),
        frames,
        seed,
        "augmentation stage complete"
    );
    Ok(frames)
}

/// Jitter brightness, contrast and saturation by factors in [0.8, 1.2]
fn color_jitter(frame: &RgbImage, rng: &mut StdRng) -> RgbImage {
    let brightness: f32 = rng.random_range(0.8..=1.2);
    let contrast: f32 = rng.random_range(0.8..=1.2);
    let saturation: f32 = rng.random_range(0.8..=1.2);

    map_pixels(frame, |r, g, b| {
        let luma = 0.299 * r + 0.587 * g + 0.114 * b;
        let adjust = |v: f32| {
            let v = luma + (v - luma) * saturation;
            let v = (v - 128.0) * contrast + 128.0;
            v * brightness
        };
        (adjust(r), adjust(g), adjust(b))
    })
}

/// Perturb brightness and contrast by factors in [0.8, 1.2]
fn brightness_contrast(frame: &RgbImage, rng: &mut StdRng) -> RgbImage {
    let brightness: f32 = 1.0 + rng.random_range(-0.2..=0.2);
    let contrast: f32 = 1.0 + rng.random_range(-0.2..=0.2);

    map_pixels(frame, |r, g, b| {
        let adjust = |v: f32| ((v - 128.0) * contrast + 128.0) * brightness;
        (adjust(r), adjust(g), adjust(b))
    })
}

fn map_pixels(frame: &RgbImage, f: impl Fn(f32, f32, f32) -> (f32, f32, f32)) -> RgbImage {
    let mut out = frame.clone();
    for pixel in out.pixels_mut() {
        let (r, g, b) = f(
            f32::from(pixel[0]),
            f32::from(pixel[1]),
            f32::from(pixel[2]),
        );
        pixel[0] = r.clamp(0.0, 255.0) as u8;
        pixel[1] = g.clamp(0.0, 255.0) as u8;
        pixel[2] = b.clamp(0.0, 255.0) as u8;
    }
    out
}

/// Round-trip the frame through JPEG at the given quality
fn recompress_jpeg(frame: &RgbImage, quality: u8) -> Result<RgbImage> {
    let mut buffer = Cursor::new(Vec::new());
    let mut encoder = JpegEncoder::new_with_quality(&mut buffer, quality);
    encoder
        .encode_image(frame)
        .map_err(|e| ProcessingError::ImageError(format!("JPEG recompression failed: {e}")))?;

    let decoded = image::load_from_memory(buffer.get_ref())
        .map_err(|e| ProcessingError::ImageError(format!("JPEG re-decode failed: {e}")))?;
    Ok(decoded.to_rgb8())
}
