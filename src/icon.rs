//! Weather icon decoding and scaling.
//!
//! The companion sends the icon as an opaque asset; once resolved to bytes it is
//! decoded here into an RGBA bitmap. Scaling is proportional scale-to-width:
//! `ratio = target_size / source_width`, applied to both axes so the aspect ratio
//! is preserved.

use image::imageops::{self, FilterType};
use image::RgbaImage;
use thiserror::Error;

/// Errors raised while turning an asset byte stream into an [`Icon`]
#[derive(Error, Debug)]
pub enum IconError {
    /// The channel resolved the asset to zero bytes
    #[error("asset stream is empty")]
    Empty,

    /// The bytes are not a supported image
    #[error("image decode failed: {0}")]
    Decode(#[from] image::ImageError),

    /// The decoded image has no pixels
    #[error("decoded image has zero size")]
    ZeroSize,
}

/// A decoded weather condition icon
#[derive(Clone, Debug)]
pub struct Icon {
    pixels: RgbaImage,
}

impl Icon {
    /// Decode an encoded image (PNG) from an asset byte stream.
    pub fn decode(bytes: &[u8]) -> Result<Self, IconError> {
        if bytes.is_empty() {
            return Err(IconError::Empty);
        }
        let decoded = image::load_from_memory(bytes)?;
        Self::from_rgba(decoded.to_rgba8())
    }

    /// Wrap an already decoded bitmap.
    pub fn from_rgba(pixels: RgbaImage) -> Result<Self, IconError> {
        if pixels.width() == 0 || pixels.height() == 0 {
            return Err(IconError::ZeroSize);
        }
        Ok(Icon { pixels })
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    /// Uniform scale factor that maps the icon width onto `target_size`.
    pub fn scale_ratio(&self, target_size: u32) -> f32 {
        target_size as f32 / self.width() as f32
    }

    /// Dimensions after scaling to `target_size` wide.
    pub fn scaled_size(&self, target_size: u32) -> (u32, u32) {
        let ratio = self.scale_ratio(target_size);
        let height = (self.height() as f32 * ratio).round().max(1.0) as u32;
        (target_size.max(1), height)
    }

    /// Bitmap scaled to `target_size` wide.
    ///
    /// `smoothing` selects bilinear filtering; without it pixels are replicated
    /// (nearest neighbour), which is what low-bit displays handle best.
    pub fn scaled(&self, target_size: u32, smoothing: bool) -> RgbaImage {
        let (width, height) = self.scaled_size(target_size);
        let filter = if smoothing {
            FilterType::Triangle
        } else {
            FilterType::Nearest
        };
        imageops::resize(&self.pixels, width, height, filter)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, Rgba};
    use std::io::Cursor;

    /// Encode a solid colour PNG for tests
    pub(crate) fn png_bytes(width: u32, height: u32, colour: [u8; 4]) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, Rgba(colour));
        let mut buffer = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img)
            .write_to(&mut buffer, ImageFormat::Png)
            .unwrap();
        buffer.into_inner()
    }

    #[test]
    fn test_decode_png() {
        let icon = Icon::decode(&png_bytes(8, 4, [255, 0, 0, 255])).unwrap();
        assert_eq!(icon.width(), 8);
        assert_eq!(icon.height(), 4);
        assert_eq!(icon.pixels().get_pixel(0, 0), &Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let result = Icon::decode(b"definitely not a png");
        assert!(matches!(result, Err(IconError::Decode(_))));
    }

    #[test]
    fn test_decode_rejects_empty_stream() {
        assert!(matches!(Icon::decode(&[]), Err(IconError::Empty)));
    }

    #[test]
    fn test_scale_to_width_preserves_aspect() {
        let icon = Icon::decode(&png_bytes(80, 40, [0, 0, 0, 255])).unwrap();
        assert!((icon.scale_ratio(40) - 0.5).abs() < 1e-6);
        assert_eq!(icon.scaled_size(40), (40, 20));

        let scaled = icon.scaled(40, true);
        assert_eq!(scaled.dimensions(), (40, 20));
    }

    #[test]
    fn test_upscale_without_smoothing_keeps_colours() {
        let icon = Icon::from_rgba(RgbaImage::from_pixel(2, 2, Rgba([10, 20, 30, 255]))).unwrap();
        let scaled = icon.scaled(8, false);
        assert_eq!(scaled.dimensions(), (8, 8));
        assert!(scaled.pixels().all(|p| *p == Rgba([10, 20, 30, 255])));
    }
}
