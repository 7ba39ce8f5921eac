//! Still-image load/save helpers

use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tracing::debug;

use veriframe_common::Result;

use crate::first_frame;

/// JPEG quality used for generated thumbnails
const THUMBNAIL_QUALITY: u8 = 90;

/// Load an image file as RGB pixels
///
/// # Errors
///
/// Returns an error if the file cannot be read or decoded.
pub fn load_rgb(path: &Path) -> Result<RgbImage> {
    Ok(image::open(path)?.to_rgb8())
}

/// Write RGB pixels as a JPEG file with the given quality
///
/// # Errors
///
/// Returns an error if the file cannot be created or encoding fails.
pub fn save_jpeg(path: &Path, image: &RgbImage, quality: u8) -> Result<()> {
    let file = File::create(path)?;
    let mut encoder = JpegEncoder::new_with_quality(BufWriter::new(file), quality);
    encoder.encode_image(image)?;
    Ok(())
}

/// Save the first decodable frame of a video as a JPEG thumbnail
///
/// # Errors
///
/// Returns an error if no frame decodes or the thumbnail cannot be
/// written.
pub fn write_video_thumbnail(video_path: &Path, thumbnail_path: &Path) -> Result<()> {
    let frame = first_frame(video_path)?;
    save_jpeg(thumbnail_path, &frame, THUMBNAIL_QUALITY)?;
    debug!(
        video = %video_path.display(),
        thumbnail = %thumbnail_path.display(),
        "thumbnail written"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_jpeg_round_trip_preserves_geometry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.jpg");

        let image = RgbImage::from_pixel(32, 24, Rgb([200, 40, 40]));
        save_jpeg(&path, &image, 85).unwrap();

        let loaded = load_rgb(&path).unwrap();
        assert_eq!(loaded.dimensions(), (32, 24));
    }

    #[test]
    fn test_load_missing_image_fails() {
        assert!(load_rgb(Path::new("/nonexistent/photo.png")).is_err());
    }
}
