//! Source and working rasters.

use std::path::Path;

use image::{DynamicImage, RgbaImage};

use crate::error::{Result, TracerError};

use super::ops;

/// A user-supplied photograph, decoded to RGBA.
#[derive(Clone, Debug)]
pub struct SourceImage {
    pixels: RgbaImage,
}

impl SourceImage {
    /// Wrap an RGBA buffer. Empty rasters are rejected.
    pub fn new(pixels: RgbaImage) -> Result<Self> {
        if pixels.width() == 0 || pixels.height() == 0 {
            return Err(TracerError::InvalidRaster(format!(
                "source image has zero size ({}x{})",
                pixels.width(),
                pixels.height()
            )));
        }
        Ok(Self { pixels })
    }

    /// Convert any decoded image.
    pub fn from_dynamic(image: DynamicImage) -> Result<Self> {
        Self::new(image.to_rgba8())
    }

    /// Decode an encoded image (PNG, JPEG, ...) from memory.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let image = image::load_from_memory(bytes)?;
        Self::from_dynamic(image)
    }

    /// Decode an image file.
    pub fn open(path: &Path) -> Result<Self> {
        let image = image::open(path)?;
        Self::from_dynamic(image)
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
}

/// Dimensions of the working image for a source of `width`x`height`:
/// the long edge becomes `long_edge`, the short edge keeps the aspect ratio.
pub fn working_dimensions(width: u32, height: u32, long_edge: u32) -> (u32, u32) {
    if width >= height {
        let scaled = (height as f64 * long_edge as f64 / width as f64).round() as u32;
        (long_edge, scaled.max(1))
    } else {
        let scaled = (width as f64 * long_edge as f64 / height as f64).round() as u32;
        (scaled.max(1), long_edge)
    }
}

/// The source resized to the fixed working resolution.
///
/// Every filter constant is calibrated against this resolution, so the
/// pipelines behave the same regardless of the photo's original size.
#[derive(Clone, Debug)]
pub struct WorkingImage {
    pixels: RgbaImage,
}

impl WorkingImage {
    /// Resize `source` so its long edge equals `long_edge` (area-averaged).
    pub fn from_source(source: &SourceImage, long_edge: u32) -> Result<Self> {
        if long_edge == 0 {
            return Err(TracerError::InvalidRaster(
                "working resolution must be positive".to_string(),
            ));
        }
        let (width, height) = working_dimensions(source.width(), source.height(), long_edge);
        let pixels = if (width, height) == source.pixels.dimensions() {
            source.pixels.clone()
        } else {
            ops::resize_area(&source.pixels, width, height)
        };
        Ok(Self { pixels })
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// Total pixel count.
    pub fn area(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_source_rejects_empty() {
        assert!(matches!(
            SourceImage::new(RgbaImage::new(0, 10)),
            Err(TracerError::InvalidRaster(_))
        ));
    }

    #[test]
    fn test_decode_failure_is_decode_error() {
        let result = SourceImage::decode(b"definitely not an image");
        assert!(matches!(result, Err(TracerError::Decode(_))));
    }

    #[test]
    fn test_working_dimensions_landscape_and_portrait() {
        assert_eq!(working_dimensions(2000, 1200, 1000), (1000, 600));
        assert_eq!(working_dimensions(1200, 2000, 1000), (600, 1000));
        assert_eq!(working_dimensions(500, 500, 1000), (1000, 1000));
        assert_eq!(working_dimensions(5000, 1, 1000), (1000, 1));
    }

    #[test]
    fn test_working_image_preserves_aspect() {
        let source = SourceImage::new(RgbaImage::from_pixel(400, 300, Rgba([10, 20, 30, 255])))
            .unwrap();
        let working = WorkingImage::from_source(&source, 1000).unwrap();
        assert_eq!((working.width(), working.height()), (1000, 750));
        assert_eq!(working.area(), 750_000);
    }

    #[test]
    fn test_working_image_skips_resize_at_target_size() {
        let source = SourceImage::new(RgbaImage::from_pixel(1000, 600, Rgba([7, 7, 7, 255])))
            .unwrap();
        let working = WorkingImage::from_source(&source, 1000).unwrap();
        assert_eq!(working.pixels(), source.pixels());
    }
}
