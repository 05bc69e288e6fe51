//! Preparing images for the model API.

use crate::Result;
use base64::Engine as _;
use geoharvest_render::fit_within;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use std::path::Path;

/// Longest edge sent to the model.
pub const MAX_UPLOAD_EDGE: u32 = 1024;

/// JPEG quality of the uploaded copy.
pub const UPLOAD_QUALITY: u8 = 75;

/// Decode `path`, convert to RGB, bound its longer edge by `max_edge` and
/// return the JPEG re-encoding as standard base64.
pub fn encode_image(path: &Path, max_edge: u32) -> Result<String> {
    let image = image::open(path)?.to_rgb8();

    let (width, height) = image.dimensions();
    let (w, h) = fit_within(width, height, max_edge);
    let image = if (w, h) == (width, height) {
        image
    } else {
        imageops::resize(&image, w, h, FilterType::Lanczos3)
    };

    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, UPLOAD_QUALITY).encode_image(&image)?;
    Ok(base64::engine::general_purpose::STANDARD.encode(jpeg))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn decode(b64: &str) -> image::DynamicImage {
        let bytes = base64::engine::general_purpose::STANDARD.decode(b64).unwrap();
        image::load_from_memory(&bytes).unwrap()
    }

    #[test]
    fn test_large_image_is_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.jpg");
        RgbImage::from_pixel(3000, 1500, Rgb([10, 120, 200])).save(&path).unwrap();

        let img = decode(&encode_image(&path, MAX_UPLOAD_EDGE).unwrap());
        assert_eq!((img.width(), img.height()), (1024, 512));
    }

    #[test]
    fn test_small_image_keeps_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("small.png");
        image::GrayImage::from_pixel(20, 10, image::Luma([77])).save(&path).unwrap();

        let img = decode(&encode_image(&path, MAX_UPLOAD_EDGE).unwrap());
        assert_eq!((img.width(), img.height()), (20, 10));
        assert_eq!(img.color(), image::ColorType::Rgb8);
    }

    #[test]
    fn test_unreadable_image_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.jpg");
        std::fs::write(&path, b"nope").unwrap();
        assert!(encode_image(&path, MAX_UPLOAD_EDGE).is_err());
    }
}
