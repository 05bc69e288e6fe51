//! TIFF raster reading.

use crate::{RenderError, Result};
use image::RgbImage;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::ColorType;

/// One single-band raster as `f32` samples in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct Band {
    /// Raster width in pixels.
    pub width: u32,
    /// Raster height in pixels.
    pub height: u32,
    /// Samples, `width * height` long.
    pub data: Vec<f32>,
}

impl Band {
    /// Raster size as `(width, height)`.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

fn open_decoder(path: &Path) -> Result<Decoder<BufReader<File>>> {
    let file = File::open(path)?;
    let decoder = Decoder::new(BufReader::new(file))?;

    // A 10980 x 10980 Sentinel-2 band at 16 bits is ~240 MB decoded.
    let mut limits = Limits::default();
    limits.decoding_buffer_size = 1024 * 1024 * 1024;
    limits.intermediate_buffer_size = 1024 * 1024 * 1024;
    limits.ifd_value_size = 1024 * 1024 * 1024;
    Ok(decoder.with_limits(limits))
}

/// Colour layout of the first image in a TIFF file.
pub fn color_type(path: &Path) -> Result<ColorType> {
    let mut decoder = open_decoder(path)?;
    Ok(decoder.colortype()?)
}

/// Read a single-band raster of any sample type.
pub fn read_band(path: &Path) -> Result<Band> {
    let mut decoder = open_decoder(path)?;

    match decoder.colortype()? {
        ColorType::Gray(_) => {}
        other => {
            return Err(RenderError::UnsupportedLayout {
                path: path.to_path_buf(),
                message: format!("expected one band, found {:?}", other),
            })
        }
    }

    let (width, height) = decoder.dimensions()?;
    let data = match decoder.read_image()? {
        DecodingResult::F32(data) => data,
        DecodingResult::F64(data) => data.into_iter().map(|v| v as f32).collect(),
        DecodingResult::I16(data) => data.into_iter().map(|v| v as f32).collect(),
        DecodingResult::I32(data) => data.into_iter().map(|v| v as f32).collect(),
        DecodingResult::U16(data) => data.into_iter().map(|v| v as f32).collect(),
        DecodingResult::U32(data) => data.into_iter().map(|v| v as f32).collect(),
        DecodingResult::U8(data) => data.into_iter().map(|v| v as f32).collect(),
        DecodingResult::I8(data) => data.into_iter().map(|v| v as f32).collect(),
        DecodingResult::U64(data) => data.into_iter().map(|v| v as f32).collect(),
        DecodingResult::I64(data) => data.into_iter().map(|v| v as f32).collect(),
    };

    Ok(Band {
        width,
        height,
        data,
    })
}

/// Read a 3-band 8-bit RGB TIFF.
pub fn read_rgb8(path: &Path) -> Result<RgbImage> {
    let mut decoder = open_decoder(path)?;
    let color = decoder.colortype()?;
    if color != ColorType::RGB(8) {
        return Err(RenderError::UnsupportedLayout {
            path: path.to_path_buf(),
            message: format!("expected 8-bit RGB, found {:?}", color),
        });
    }

    let (width, height) = decoder.dimensions()?;
    match decoder.read_image()? {
        DecodingResult::U8(data) => {
            RgbImage::from_raw(width, height, data).ok_or_else(|| RenderError::UnsupportedLayout {
                path: path.to_path_buf(),
                message: "sample count does not match dimensions".to_string(),
            })
        }
        _ => Err(RenderError::UnsupportedLayout {
            path: path.to_path_buf(),
            message: "8-bit RGB without u8 samples".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tiff::encoder::{colortype, TiffEncoder};

    #[test]
    fn test_read_gray16_band() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("B04.tif");
        let samples: Vec<u16> = (0..12).map(|i| i * 100).collect();
        let mut encoder = TiffEncoder::new(File::create(&path).unwrap()).unwrap();
        encoder
            .write_image::<colortype::Gray16>(4, 3, &samples)
            .unwrap();

        let band = read_band(&path).unwrap();
        assert_eq!(band.dimensions(), (4, 3));
        assert_eq!(band.data[5], 500.0);
        assert_eq!(color_type(&path).unwrap(), ColorType::Gray(16));
    }

    #[test]
    fn test_rgb_is_not_a_band() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rgb.tif");
        let mut encoder = TiffEncoder::new(File::create(&path).unwrap()).unwrap();
        encoder
            .write_image::<colortype::RGB8>(2, 2, &[0u8; 12])
            .unwrap();

        assert!(matches!(
            read_band(&path),
            Err(RenderError::UnsupportedLayout { .. })
        ));
        let img = read_rgb8(&path).unwrap();
        assert_eq!(img.dimensions(), (2, 2));
    }
}
