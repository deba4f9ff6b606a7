//! Character mode
//!
//! Clean, closed line art for portraits. Strong smoothing erases skin
//! texture, a high threshold offset drops faint shadow edges, and a small
//! closing removes the remaining specks.

use image::GrayImage;

use crate::config::CharacterParams;
use crate::error::Result;
use crate::imaging::{ops, AdaptiveMethod, RasterScope, WorkingImage};

use super::{FilterPipeline, RenderMode};

/// Character-mode pipeline runtime
pub struct CharacterPipeline {
    params: CharacterParams,
}

impl CharacterPipeline {
    pub fn new(params: CharacterParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &CharacterParams {
        &self.params
    }
}

impl Default for CharacterPipeline {
    fn default() -> Self {
        Self::new(CharacterParams::default())
    }
}

impl FilterPipeline for CharacterPipeline {
    fn mode(&self) -> RenderMode {
        RenderMode::Character
    }

    fn display_name(&self) -> &'static str {
        "Character"
    }

    fn apply(&self, working: &WorkingImage, scope: &RasterScope) -> Result<GrayImage> {
        let gray = scope.track(ops::to_gray(working.pixels()));
        let smooth = scope.track(ops::bilateral_filter(&gray, &self.params.bilateral));
        let binary = scope.track(ops::adaptive_threshold(
            &smooth,
            AdaptiveMethod::Mean,
            &self.params.threshold,
        )?);
        Ok(ops::close_ellipse(&binary, self.params.close_kernel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::{BufferLedger, SourceImage};
    use image::{Rgba, RgbaImage};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn working(image: RgbaImage) -> WorkingImage {
        let long_edge = image.width().max(image.height());
        WorkingImage::from_source(&SourceImage::new(image).unwrap(), long_edge).unwrap()
    }

    #[test]
    fn test_flat_input_is_all_white() {
        let ledger = BufferLedger::new();
        let scope = RasterScope::new(&ledger, "test");
        let input = working(RgbaImage::from_pixel(80, 48, Rgba([128, 128, 128, 255])));
        let out = CharacterPipeline::default().apply(&input, &scope).unwrap();
        assert_eq!(out.dimensions(), (80, 48));
        assert!(out.pixels().all(|p| p[0] == 255));
    }

    #[test]
    fn test_output_is_binary() {
        let ledger = BufferLedger::new();
        let scope = RasterScope::new(&ledger, "test");
        let input = working(RgbaImage::from_fn(64, 64, |x, y| {
            let v = ((x * 7 + y * 13) % 256) as u8;
            Rgba([v, v / 2, 255 - v, 255])
        }));
        let out = CharacterPipeline::default().apply(&input, &scope).unwrap();
        assert!(out.pixels().all(|p| p[0] == 0 || p[0] == 255));
    }

    #[test]
    fn test_noisy_input_has_no_isolated_specks() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut image = RgbaImage::from_pixel(120, 90, Rgba([235, 235, 235, 255]));
        for _ in 0..600 {
            let x = rng.random_range(0..120);
            let y = rng.random_range(0..90);
            let v: u8 = rng.random_range(0..60);
            image.put_pixel(x, y, Rgba([v, v, v, 255]));
        }

        let ledger = BufferLedger::new();
        let scope = RasterScope::new(&ledger, "test");
        let out = CharacterPipeline::default()
            .apply(&working(image), &scope)
            .unwrap();

        let (w, h) = out.dimensions();
        for y in 0..h {
            for x in 0..w {
                if out.get_pixel(x, y)[0] != 0 {
                    continue;
                }
                let mut dark_neighbor = false;
                for dy in -1i64..=1 {
                    for dx in -1i64..=1 {
                        if dx == 0 && dy == 0 {
                            continue;
                        }
                        let nx = x as i64 + dx;
                        let ny = y as i64 + dy;
                        if nx < 0 || ny < 0 || nx >= w as i64 || ny >= h as i64 {
                            continue;
                        }
                        if out.get_pixel(nx as u32, ny as u32)[0] == 0 {
                            dark_neighbor = true;
                        }
                    }
                }
                assert!(dark_neighbor, "isolated dark pixel at ({x}, {y})");
            }
        }
    }

    #[test]
    fn test_intermediates_are_released() {
        let ledger = BufferLedger::new();
        let input = working(RgbaImage::from_pixel(32, 32, Rgba([50, 60, 70, 255])));
        {
            let scope = RasterScope::new(&ledger, "test");
            let _ = CharacterPipeline::default().apply(&input, &scope).unwrap();
            assert_eq!(scope.tracked(), 3);
        }
        assert_eq!(ledger.live(), 0);
    }

    #[test]
    fn test_is_deterministic() {
        let input = working(RgbaImage::from_fn(50, 40, |x, y| {
            Rgba([(x * 5) as u8, (y * 6) as u8, ((x + y) * 2) as u8, 255])
        }));
        let ledger = BufferLedger::new();
        let scope = RasterScope::new(&ledger, "test");
        let pipeline = CharacterPipeline::default();
        let first = pipeline.apply(&input, &scope).unwrap();
        let second = pipeline.apply(&input, &scope).unwrap();
        assert_eq!(first, second);
    }
}
