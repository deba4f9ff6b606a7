//! Scenery mode
//!
//! Flat tone bands from a posterized, smoothed image, with fine edges from a
//! Gaussian adaptive threshold punched in as dark marks.

use image::GrayImage;

use crate::config::SceneryParams;
use crate::error::Result;
use crate::imaging::{ops, AdaptiveMethod, RasterScope, WorkingImage};

use super::{FilterPipeline, RenderMode};

/// Scenery-mode pipeline runtime
pub struct SceneryPipeline {
    params: SceneryParams,
}

impl SceneryPipeline {
    pub fn new(params: SceneryParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &SceneryParams {
        &self.params
    }
}

impl Default for SceneryPipeline {
    fn default() -> Self {
        Self::new(SceneryParams::default())
    }
}

impl FilterPipeline for SceneryPipeline {
    fn mode(&self) -> RenderMode {
        RenderMode::Scenery
    }

    fn display_name(&self) -> &'static str {
        "Scenery"
    }

    fn apply(&self, working: &WorkingImage, scope: &RasterScope) -> Result<GrayImage> {
        let gray = scope.track(ops::to_gray(working.pixels()));
        let smooth = scope.track(ops::bilateral_filter(&gray, &self.params.bilateral));
        let tones = scope.track(ops::posterize(&smooth, self.params.posterize_step));
        // Edges come from the smoothed image before quantization.
        let edges = scope.track(ops::adaptive_threshold(
            &smooth,
            AdaptiveMethod::Gaussian,
            &self.params.threshold,
        )?);
        ops::bitwise_and(&tones, &edges)
    }
}
