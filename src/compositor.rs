//! Compositing and presentation
//!
//! The filtered working image is letterboxed onto a white canvas the size of
//! the viewport. Presentation then applies the overlay's visual filter and
//! multiplies it over the camera frame, so only the dark lines show.

use std::sync::Arc;

use image::imageops;
use image::{GrayImage, Rgba, RgbaImage};
use parking_lot::Mutex;
use serde::Serialize;

use crate::config::OverlayStyle;
use crate::error::{Result, TracerError};
use crate::imaging::{ops, RasterScope};

const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Region of the canvas covered by the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Letterbox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Fit `width`x`height` into the canvas with a uniform scale of
/// `min(canvas_w / width, canvas_h / height)`, centered.
pub fn letterbox(width: u32, height: u32, canvas_width: u32, canvas_height: u32) -> Letterbox {
    let scale = (canvas_width as f64 / width as f64).min(canvas_height as f64 / height as f64);
    let fit_width = ((width as f64 * scale).round() as u32).clamp(1, canvas_width.max(1));
    let fit_height = ((height as f64 * scale).round() as u32).clamp(1, canvas_height.max(1));
    Letterbox {
        x: (canvas_width - fit_width) / 2,
        y: (canvas_height - fit_height) / 2,
        width: fit_width,
        height: fit_height,
    }
}

/// The overlay canvas shown over the camera feed.
#[derive(Debug, Clone)]
pub struct OutputCanvas {
    pixels: RgbaImage,
    letterbox: Option<Letterbox>,
}

/// Canvas handle shared with the display layer.
pub type SharedCanvas = Arc<Mutex<OutputCanvas>>;

impl OutputCanvas {
    /// A white canvas with nothing drawn on it.
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            pixels: RgbaImage::from_pixel(width, height, WHITE),
            letterbox: None,
        }
    }

    pub fn shared(width: u32, height: u32) -> SharedCanvas {
        Arc::new(Mutex::new(Self::blank(width, height)))
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

    /// Where the last result was placed, if anything was drawn.
    pub fn letterbox(&self) -> Option<Letterbox> {
        self.letterbox
    }

    pub fn into_pixels(self) -> RgbaImage {
        self.pixels
    }
}

/// Scale a filtered result into a new white canvas of the given size.
pub fn compose(
    result: &GrayImage,
    canvas_width: u32,
    canvas_height: u32,
    scope: &RasterScope,
) -> Result<OutputCanvas> {
    if result.width() == 0 || result.height() == 0 {
        return Err(TracerError::InvalidRaster(
            "cannot compose an empty result".to_string(),
        ));
    }
    if canvas_width == 0 || canvas_height == 0 {
        return Err(TracerError::InvalidRaster(format!(
            "canvas has zero size ({canvas_width}x{canvas_height})"
        )));
    }

    let region = letterbox(result.width(), result.height(), canvas_width, canvas_height);
    let rgba = scope.track(ops::gray_to_rgba(result));
    let scaled = scope.track(ops::resize_linear(&rgba, region.width, region.height));

    let mut canvas = OutputCanvas::blank(canvas_width, canvas_height);
    imageops::replace(&mut canvas.pixels, &*scaled, region.x as i64, region.y as i64);
    canvas.letterbox = Some(region);
    Ok(canvas)
}

fn filter_channel(value: u8, style: &OverlayStyle) -> f32 {
    let v = value as f32 / 255.0;
    let contrasted = ((v - 0.5) * style.contrast + 0.5).clamp(0.0, 1.0);
    (contrasted * style.brightness).clamp(0.0, 1.0)
}

/// Apply the contrast, brightness, and grayscale filter to the canvas.
pub fn apply_visual_filter(canvas: &RgbaImage, style: &OverlayStyle) -> RgbaImage {
    let mut out = canvas.clone();
    for pixel in out.pixels_mut() {
        let r = filter_channel(pixel[0], style);
        let g = filter_channel(pixel[1], style);
        let b = filter_channel(pixel[2], style);
        let luma = 0.2126 * r + 0.7152 * g + 0.0722 * b;
        let mix = |c: f32| c + (luma - c) * style.grayscale;
        pixel[0] = (mix(r) * 255.0).round() as u8;
        pixel[1] = (mix(g) * 255.0).round() as u8;
        pixel[2] = (mix(b) * 255.0).round() as u8;
    }
    out
}

/// Scale a camera frame to fill the viewport and crop the overflow, centered.
pub fn fit_cover(frame: &RgbaImage, width: u32, height: u32) -> RgbaImage {
    if frame.dimensions() == (width, height) {
        return frame.clone();
    }
    let scale = (width as f64 / frame.width() as f64).max(height as f64 / frame.height() as f64);
    let scaled_width = ((frame.width() as f64 * scale).ceil() as u32).max(width);
    let scaled_height = ((frame.height() as f64 * scale).ceil() as u32).max(height);
    let scaled = ops::resize_linear(frame, scaled_width, scaled_height);
    let x = (scaled_width - width) / 2;
    let y = (scaled_height - height) / 2;
    imageops::crop_imm(&scaled, x, y, width, height).to_image()
}

/// Multiply `overlay` onto `backdrop` at the given opacity.
pub fn blend_multiply(backdrop: &RgbaImage, overlay: &RgbaImage, opacity: f32) -> Result<RgbaImage> {
    if backdrop.dimensions() != overlay.dimensions() {
        return Err(TracerError::InvalidRaster(format!(
            "blend size mismatch: {:?} vs {:?}",
            backdrop.dimensions(),
            overlay.dimensions()
        )));
    }
    let alpha = opacity.clamp(0.0, 1.0);
    let mut out = backdrop.clone();
    for (dst, top) in out.pixels_mut().zip(overlay.pixels()) {
        let coverage = alpha * top[3] as f32 / 255.0;
        for c in 0..3 {
            let factor = 1.0 - coverage + coverage * top[c] as f32 / 255.0;
            dst[c] = (dst[c] as f32 * factor).round().clamp(0.0, 255.0) as u8;
        }
        dst[3] = 255;
    }
    Ok(out)
}

/// Final presented frame: the filtered canvas multiplied over the camera frame.
pub fn present_over(
    frame: &RgbaImage,
    canvas: &OutputCanvas,
    style: &OverlayStyle,
) -> Result<RgbaImage> {
    let backdrop = fit_cover(frame, canvas.width(), canvas.height());
    let overlay = apply_visual_filter(canvas.pixels(), style);
    blend_multiply(&backdrop, &overlay, style.opacity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::BufferLedger;
    use image::Luma;

    #[test]
    fn test_letterbox_wide_image_in_tall_canvas() {
        let region = letterbox(1000, 600, 400, 800);
        assert_eq!(region.width, 400);
        assert_eq!(region.height, 240);
        assert_eq!(region.x, 0);
        assert_eq!(region.y, 280);
    }

    #[test]
    fn test_letterbox_preserves_aspect_within_a_pixel() {
        for &(w, h, cw, ch) in &[
            (1000, 600, 1280, 720),
            (600, 1000, 1920, 1080),
            (1000, 1000, 333, 777),
            (1000, 7, 640, 480),
        ] {
            let region = letterbox(w, h, cw, ch);
            assert!(region.width <= cw && region.height <= ch);
            // Cross-multiplied aspect error of at most one pixel on the long side.
            let skew = (region.width as i64 * h as i64 - region.height as i64 * w as i64).abs();
            assert!(
                skew <= w.max(h) as i64,
                "{w}x{h} in {cw}x{ch} -> {region:?}"
            );
            // One axis fills the canvas.
            assert!(
                region.width == cw || region.height == ch,
                "{w}x{h} in {cw}x{ch} -> {region:?}"
            );
        }
    }

    #[test]
    fn test_compose_centers_result_on_white() {
        let ledger = BufferLedger::new();
        let scope = RasterScope::new(&ledger, "test");
        let black = GrayImage::from_pixel(100, 50, Luma([0]));
        let canvas = compose(&black, 200, 200, &scope).unwrap();

        let region = canvas.letterbox().unwrap();
        assert_eq!(region, Letterbox { x: 0, y: 50, width: 200, height: 100 });
        assert_eq!(canvas.pixels().get_pixel(100, 10).0, [255, 255, 255, 255]);
        assert_eq!(canvas.pixels().get_pixel(100, 100).0, [0, 0, 0, 255]);
        assert_eq!(canvas.pixels().get_pixel(100, 190).0, [255, 255, 255, 255]);
    }

    #[test]
    fn test_compose_rejects_empty_canvas() {
        let ledger = BufferLedger::new();
        let scope = RasterScope::new(&ledger, "test");
        let result = GrayImage::from_pixel(10, 10, Luma([0]));
        assert!(compose(&result, 0, 10, &scope).is_err());
    }

    #[test]
    fn test_visual_filter_keeps_white_and_black() {
        let style = OverlayStyle::default();
        let mut canvas = RgbaImage::from_pixel(2, 1, WHITE);
        canvas.put_pixel(1, 0, Rgba([0, 0, 0, 255]));
        let filtered = apply_visual_filter(&canvas, &style);
        assert_eq!(filtered.get_pixel(0, 0).0, [255, 255, 255, 255]);
        assert_eq!(filtered.get_pixel(1, 0).0, [0, 0, 0, 255]);
    }

    #[test]
    fn test_visual_filter_grayscales_color() {
        let style = OverlayStyle::default();
        let canvas = RgbaImage::from_pixel(1, 1, Rgba([200, 100, 50, 255]));
        let filtered = apply_visual_filter(&canvas, &style);
        let p = filtered.get_pixel(0, 0);
        assert_eq!(p[0], p[1]);
        assert_eq!(p[1], p[2]);
    }

    #[test]
    fn test_multiply_blend() {
        let backdrop = RgbaImage::from_pixel(2, 1, Rgba([200, 100, 50, 255]));
        let mut overlay = RgbaImage::from_pixel(2, 1, WHITE);
        overlay.put_pixel(1, 0, Rgba([0, 0, 0, 255]));

        let full = blend_multiply(&backdrop, &overlay, 1.0).unwrap();
        assert_eq!(full.get_pixel(0, 0).0, [200, 100, 50, 255]);
        assert_eq!(full.get_pixel(1, 0).0, [0, 0, 0, 255]);

        let half = blend_multiply(&backdrop, &overlay, 0.5).unwrap();
        assert_eq!(half.get_pixel(1, 0).0, [100, 50, 25, 255]);

        assert!(blend_multiply(&backdrop, &RgbaImage::new(1, 1), 1.0).is_err());
    }

    #[test]
    fn test_fit_cover_fills_viewport() {
        let frame = RgbaImage::from_pixel(1280, 720, Rgba([10, 20, 30, 255]));
        let fitted = fit_cover(&frame, 400, 800);
        assert_eq!(fitted.dimensions(), (400, 800));
        assert_eq!(fitted.get_pixel(200, 400).0, [10, 20, 30, 255]);
    }

    #[test]
    fn test_present_over_matches_canvas_size() {
        let frame = RgbaImage::from_pixel(64, 48, Rgba([120, 120, 120, 255]));
        let canvas = OutputCanvas::blank(32, 32);
        let presented = present_over(&frame, &canvas, &OverlayStyle::default()).unwrap();
        assert_eq!(presented.dimensions(), (32, 32));
        assert_eq!(presented.get_pixel(5, 5).0, [120, 120, 120, 255]);
    }
}
