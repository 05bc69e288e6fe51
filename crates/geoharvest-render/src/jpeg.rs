//! JPEG output.

use crate::Result;
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use std::fs;
use std::path::Path;

/// Encode `image` as a baseline JPEG and write it to `dest`.
///
/// The file is written beside `dest` and renamed into place, so `dest` either
/// holds a complete image or is left as it was.
pub fn write_jpeg(image: &RgbImage, dest: &Path, quality: u8) -> Result<()> {
    let mut encoded = Vec::new();
    JpegEncoder::new_with_quality(&mut encoded, quality).encode_image(image)?;

    if let Some(parent) = dest.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut part = dest.as_os_str().to_os_string();
    part.push(".part");
    fs::write(&part, &encoded)?;
    if let Err(e) = fs::rename(&part, dest) {
        let _ = fs::remove_file(&part);
        return Err(e.into());
    }
    Ok(())
}
