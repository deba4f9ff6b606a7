//! Configuration and serialization module.
//!
//! Every tuning constant of the classifier and the two filter pipelines lives
//! here. The defaults are the calibrated values; changing them changes the
//! look of the overlay.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TracerError};

/// Long edge of the working image, in pixels.
pub const DEFAULT_WORKING_RESOLUTION: u32 = 1000;

/// Top-level tracer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TracerConfig {
    /// Long edge of the working image.
    pub working_resolution: u32,
    /// Complexity classifier settings.
    pub classifier: ClassifierConfig,
    /// Character-mode pipeline constants.
    pub character: CharacterParams,
    /// Scenery-mode pipeline constants.
    pub scenery: SceneryParams,
    /// Overlay presentation.
    pub overlay: OverlayStyle,
    /// Import scheduling and status display.
    pub session: SessionConfig,
    /// Preferences passed to the camera provider.
    pub capture: CaptureRequest,
}

impl Default for TracerConfig {
    fn default() -> Self {
        Self {
            working_resolution: DEFAULT_WORKING_RESOLUTION,
            classifier: ClassifierConfig::default(),
            character: CharacterParams::default(),
            scenery: SceneryParams::default(),
            overlay: OverlayStyle::default(),
            session: SessionConfig::default(),
            capture: CaptureRequest::default(),
        }
    }
}

impl TracerConfig {
    /// Load a configuration from a JSON file.
    ///
    /// Missing fields fall back to their defaults. The result is validated
    /// before it is returned.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let config: TracerConfig = serde_json::from_str(&text)?;
        config.validate()?;
        log::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Save the configuration as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let text = self.to_json()?;
        fs::write(path, text)?;
        Ok(())
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check that every constant is usable by the pipelines.
    pub fn validate(&self) -> Result<()> {
        if self.working_resolution < 16 {
            return Err(TracerError::InvalidConfig(format!(
                "working_resolution must be at least 16, got {}",
                self.working_resolution
            )));
        }
        self.classifier.validate()?;
        self.character.validate()?;
        self.scenery.validate()?;
        self.overlay.validate()?;
        Ok(())
    }
}

/// Complexity classifier settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Canny low hysteresis threshold (8-bit intensity scale).
    pub canny_low: f32,
    /// Canny high hysteresis threshold.
    pub canny_high: f32,
    /// Edge density above which an image is treated as scenery.
    pub density_threshold: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            canny_low: 80.0,
            canny_high: 150.0,
            density_threshold: 0.08,
        }
    }
}

impl ClassifierConfig {
    fn validate(&self) -> Result<()> {
        if !(self.canny_low >= 0.0 && self.canny_low <= self.canny_high) {
            return Err(TracerError::InvalidConfig(format!(
                "canny thresholds must satisfy 0 <= low <= high, got {}/{}",
                self.canny_low, self.canny_high
            )));
        }
        if !(0.0..=1.0).contains(&self.density_threshold) {
            return Err(TracerError::InvalidConfig(format!(
                "density_threshold must be within [0, 1], got {}",
                self.density_threshold
            )));
        }
        Ok(())
    }
}

/// Bilateral smoothing parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BilateralParams {
    /// Neighborhood diameter in pixels.
    pub diameter: u32,
    /// Range (intensity) sigma.
    pub sigma_color: f32,
    /// Spatial sigma.
    pub sigma_space: f32,
}

impl BilateralParams {
    fn validate(&self, name: &str) -> Result<()> {
        if self.diameter == 0 {
            return Err(TracerError::InvalidConfig(format!(
                "{name}: bilateral diameter must be positive"
            )));
        }
        if self.sigma_color <= 0.0 || self.sigma_space <= 0.0 {
            return Err(TracerError::InvalidConfig(format!(
                "{name}: bilateral sigmas must be positive"
            )));
        }
        Ok(())
    }
}

/// Adaptive threshold parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdParams {
    /// Odd neighborhood size.
    pub block_size: u32,
    /// Constant subtracted from the local mean.
    pub offset: i32,
}

impl ThresholdParams {
    fn validate(&self, name: &str) -> Result<()> {
        if self.block_size < 3 || self.block_size % 2 == 0 {
            return Err(TracerError::InvalidConfig(format!(
                "{name}: threshold block size must be odd and >= 3, got {}",
                self.block_size
            )));
        }
        Ok(())
    }
}

/// Character-mode constants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CharacterParams {
    pub bilateral: BilateralParams,
    /// Mean-weighted threshold. The offset is the main tuning knob: lower
    /// values bring noise specks back, higher values erase real lines.
    pub threshold: ThresholdParams,
    /// Elliptical closing kernel size (odd).
    pub close_kernel: u32,
}

impl Default for CharacterParams {
    fn default() -> Self {
        Self {
            bilateral: BilateralParams {
                diameter: 12,
                sigma_color: 100.0,
                sigma_space: 100.0,
            },
            threshold: ThresholdParams {
                block_size: 17,
                offset: 7,
            },
            close_kernel: 3,
        }
    }
}

impl CharacterParams {
    fn validate(&self) -> Result<()> {
        self.bilateral.validate("character")?;
        self.threshold.validate("character")?;
        if self.close_kernel == 0 || self.close_kernel % 2 == 0 {
            return Err(TracerError::InvalidConfig(format!(
                "character: close kernel must be odd, got {}",
                self.close_kernel
            )));
        }
        Ok(())
    }
}

/// Scenery-mode constants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneryParams {
    pub bilateral: BilateralParams,
    /// Width of each posterized tone band.
    pub posterize_step: u8,
    /// Gaussian-weighted threshold for the fine edge mask.
    pub threshold: ThresholdParams,
}

impl Default for SceneryParams {
    fn default() -> Self {
        Self {
            bilateral: BilateralParams {
                diameter: 9,
                sigma_color: 75.0,
                sigma_space: 75.0,
            },
            posterize_step: 40,
            threshold: ThresholdParams {
                block_size: 9,
                offset: 3,
            },
        }
    }
}

impl SceneryParams {
    fn validate(&self) -> Result<()> {
        self.bilateral.validate("scenery")?;
        self.threshold.validate("scenery")?;
        if self.posterize_step == 0 {
            return Err(TracerError::InvalidConfig(
                "scenery: posterize_step must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Opacity slider bounds.
pub const MIN_OPACITY: f32 = 0.1;
pub const MAX_OPACITY: f32 = 1.0;
pub const OPACITY_STEP: f32 = 0.05;

/// How the overlay canvas is presented over the camera frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayStyle {
    /// Overlay opacity (0.1-1.0).
    pub opacity: f32,
    /// Contrast multiplier applied around mid-gray.
    pub contrast: f32,
    /// Brightness multiplier.
    pub brightness: f32,
    /// Grayscale amount (0.0-1.0).
    pub grayscale: f32,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            opacity: 0.75,
            contrast: 1.6,
            brightness: 1.05,
            grayscale: 1.0,
        }
    }
}

impl OverlayStyle {
    /// Set opacity from slider input, clamped and snapped to the slider step.
    /// Non-finite input is ignored and returns false.
    pub fn set_opacity(&mut self, value: f32) -> bool {
        if !value.is_finite() {
            return false;
        }
        let clamped = value.clamp(MIN_OPACITY, MAX_OPACITY);
        let snapped = (clamped / OPACITY_STEP).round() * OPACITY_STEP;
        self.opacity = snapped.clamp(MIN_OPACITY, MAX_OPACITY);
        true
    }

    fn validate(&self) -> Result<()> {
        if !(MIN_OPACITY..=MAX_OPACITY).contains(&self.opacity) {
            return Err(TracerError::InvalidConfig(format!(
                "opacity must be within [{MIN_OPACITY}, {MAX_OPACITY}], got {}",
                self.opacity
            )));
        }
        if !(self.contrast >= 0.0 && self.brightness >= 0.0)
            || !self.contrast.is_finite()
            || !self.brightness.is_finite()
        {
            return Err(TracerError::InvalidConfig(
                "contrast and brightness must be non-negative".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.grayscale) {
            return Err(TracerError::InvalidConfig(format!(
                "grayscale must be within [0, 1], got {}",
                self.grayscale
            )));
        }
        Ok(())
    }
}

/// Import scheduling and status display timings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Delay between import and processing, so the source is fully decoded.
    pub settle_delay_ms: u64,
    /// How long the classification label stays visible.
    pub status_ttl_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: 100,
            status_ttl_ms: 2000,
        }
    }
}

/// Which physical camera to prefer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Facing {
    /// Rear camera, pointed at the drawing surface.
    #[default]
    Environment,
    /// Front camera.
    User,
}

/// Preferences handed to the camera provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureRequest {
    pub facing: Facing,
    pub ideal_width: u32,
    pub ideal_height: u32,
    /// Some recorders refuse to start on a stream without audio.
    pub audio: bool,
}

impl Default for CaptureRequest {
    fn default() -> Self {
        Self {
            facing: Facing::Environment,
            ideal_width: 1280,
            ideal_height: 720,
            audio: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_calibrated_values() {
        let config = TracerConfig::default();
        assert_eq!(config.working_resolution, 1000);
        assert_eq!(config.classifier.canny_low, 80.0);
        assert_eq!(config.classifier.canny_high, 150.0);
        assert_eq!(config.classifier.density_threshold, 0.08);
        assert_eq!(config.character.threshold.block_size, 17);
        assert_eq!(config.character.threshold.offset, 7);
        assert_eq!(config.scenery.posterize_step, 40);
        assert_eq!(config.scenery.threshold.block_size, 9);
        assert_eq!(config.overlay.opacity, 0.75);
        assert_eq!(config.session.settle_delay_ms, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_json_roundtrip_with_missing_fields() {
        let config: TracerConfig =
            serde_json::from_str(r#"{ "working_resolution": 800 }"#).unwrap();
        assert_eq!(config.working_resolution, 800);
        assert_eq!(config.character, CharacterParams::default());

        let json = config.to_json().unwrap();
        let parsed: TracerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_validate_rejects_even_block_size() {
        let mut config = TracerConfig::default();
        config.character.threshold.block_size = 16;
        assert!(matches!(
            config.validate(),
            Err(TracerError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_validate_rejects_zero_posterize_step() {
        let mut config = TracerConfig::default();
        config.scenery.posterize_step = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_density_out_of_range() {
        let mut config = TracerConfig::default();
        config.classifier.density_threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_opacity_slider_snaps_and_clamps() {
        let mut style = OverlayStyle::default();
        style.set_opacity(0.62);
        assert!((style.opacity - 0.6).abs() < 1e-6);
        style.set_opacity(0.0);
        assert!((style.opacity - MIN_OPACITY).abs() < 1e-6);
        style.set_opacity(3.0);
        assert!((style.opacity - MAX_OPACITY).abs() < 1e-6);
    }

    #[test]
    fn test_opacity_ignores_non_finite() {
        let mut style = OverlayStyle::default();
        assert!(!style.set_opacity(f32::NAN));
        assert!(!style.set_opacity(f32::INFINITY));
        assert_eq!(style.opacity, 0.75);
        assert!(style.set_opacity(0.5));

        let mut config = TracerConfig::default();
        config.overlay.opacity = f32::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracer.json");
        let mut config = TracerConfig::default();
        config.classifier.density_threshold = 0.1;
        config.save(&path).unwrap();

        let loaded = TracerConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }
}
