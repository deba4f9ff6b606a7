//! Complexity classifier
//!
//! Picks a render mode from the edge density of the working image. Busy
//! scenes produce many Canny edges and portraits few. The edge map is taken
//! without a pre-blur so fine texture counts.

use serde::Serialize;

use crate::config::ClassifierConfig;
use crate::error::{Result, TracerError};
use crate::imaging::{ops, RasterScope, WorkingImage};
use crate::pipeline::RenderMode;

/// Result of classifying one image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Classification {
    /// Selected mode
    pub mode: RenderMode,
    /// Fraction of edge pixels, in [0, 1]
    pub density: f64,
}

impl Classification {
    /// Status label for the selected mode
    pub fn label(&self) -> &'static str {
        self.mode.label()
    }
}

/// Edge-density classifier
#[derive(Debug, Clone, Copy, Default)]
pub struct ComplexityClassifier {
    config: ClassifierConfig,
}

impl ComplexityClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Mode for a given edge density. Densities at the threshold stay
    /// in character mode.
    pub fn mode_for_density(&self, density: f64) -> RenderMode {
        if density > self.config.density_threshold {
            RenderMode::Scenery
        } else {
            RenderMode::Character
        }
    }

    /// Edge density of the working image.
    pub fn edge_density(&self, working: &WorkingImage, scope: &RasterScope) -> Result<f64> {
        let area = working.area();
        if area == 0 {
            return Err(TracerError::InvalidRaster(
                "cannot classify an empty image".to_string(),
            ));
        }
        let gray = scope.track(ops::to_gray(working.pixels()));
        let edges = scope.track(ops::canny_edges(
            &gray,
            self.config.canny_low,
            self.config.canny_high,
        ));
        let edge_pixels = ops::count_non_zero(&edges) as f64;
        Ok(edge_pixels / area as f64)
    }

    /// Classify the working image.
    pub fn classify(&self, working: &WorkingImage, scope: &RasterScope) -> Result<Classification> {
        let density = self.edge_density(working, scope)?;
        let mode = self.mode_for_density(density);
        log::info!(
            "Classified {}x{} image: density {:.4} -> {}",
            working.width(),
            working.height(),
            density,
            mode
        );
        Ok(Classification { mode, density })
    }
}
