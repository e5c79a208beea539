//! Local pixel-region extraction.
//!
//! Crop is the one replace-shaped edit that never touches the generation
//! service: the region is cut out of the decoded bitmap and re-encoded, then
//! fed to the synchronizer exactly like a network-backed edit.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use image::codecs::jpeg::JpegEncoder;
use std::io::Cursor;

use crate::error::PipelineError;
use crate::model::ImagePart;

/// A pixel-space crop rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

const JPEG_QUALITY: u8 = 95;

/// Crop `src` (a data URI) to `region`, clamped to the image bounds, and
/// return the result as a JPEG data URI.
pub fn crop_data_uri(src: &str, region: CropRegion) -> Result<String, PipelineError> {
    let part = ImagePart::from_data_uri(src)
        .ok_or_else(|| PipelineError::Crop("source is not a data URI".to_string()))?;
    let bytes = BASE64
        .decode(&part.data)
        .map_err(|e| PipelineError::Crop(format!("invalid base64 payload: {}", e)))?;
    let img = image::load_from_memory(&bytes)
        .map_err(|e| PipelineError::Crop(format!("failed to decode image: {}", e)))?;

    let (w, h) = (img.width(), img.height());
    let x = region.x.min(w.saturating_sub(1));
    let y = region.y.min(h.saturating_sub(1));
    let width = region.width.min(w - x);
    let height = region.height.min(h - y);
    if width == 0 || height == 0 {
        return Err(PipelineError::Crop("crop region is empty".to_string()));
    }

    let cropped = img.crop_imm(x, y, width, height).to_rgb8();

    let mut buf = Vec::new();
    let encoder = JpegEncoder::new_with_quality(Cursor::new(&mut buf), JPEG_QUALITY);
    cropped
        .write_with_encoder(encoder)
        .map_err(|e| PipelineError::Crop(format!("failed to encode crop: {}", e)))?;

    Ok(ImagePart {
        mime_type: "image/jpeg".to_string(),
        data: BASE64.encode(&buf),
    }
    .to_data_uri())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, RgbImage};

    fn checkered_data_uri(w: u32, h: u32) -> String {
        let img = RgbImage::from_fn(w, h, |x, y| {
            if (x + y) % 2 == 0 {
                image::Rgb([255, 255, 255])
            } else {
                image::Rgb([0, 0, 0])
            }
        });
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        format!("data:image/png;base64,{}", BASE64.encode(&buf))
    }

    fn decoded_dimensions(uri: &str) -> (u32, u32) {
        let part = ImagePart::from_data_uri(uri).unwrap();
        let bytes = BASE64.decode(&part.data).unwrap();
        let img = image::load_from_memory(&bytes).unwrap();
        (img.width(), img.height())
    }

    #[test]
    fn test_crop_extracts_requested_region() {
        let src = checkered_data_uri(64, 48);
        let out = crop_data_uri(
            &src,
            CropRegion {
                x: 8,
                y: 8,
                width: 32,
                height: 16,
            },
        )
        .unwrap();
        assert!(out.starts_with("data:image/jpeg;base64,"));
        assert_eq!(decoded_dimensions(&out), (32, 16));
    }

    #[test]
    fn test_crop_clamps_to_bounds() {
        let src = checkered_data_uri(20, 20);
        let out = crop_data_uri(
            &src,
            CropRegion {
                x: 10,
                y: 10,
                width: 100,
                height: 100,
            },
        )
        .unwrap();
        assert_eq!(decoded_dimensions(&out), (10, 10));
    }

    #[test]
    fn test_crop_rejects_empty_region_and_bad_input() {
        let src = checkered_data_uri(20, 20);
        assert!(crop_data_uri(
            &src,
            CropRegion {
                x: 0,
                y: 0,
                width: 0,
                height: 5
            }
        )
        .is_err());
        assert!(crop_data_uri("not-a-uri", CropRegion { x: 0, y: 0, width: 1, height: 1 }).is_err());
    }
}
