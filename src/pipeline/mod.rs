//! Filter pipelines
//!
//! Each render mode has one fixed sequence of image operations that turns
//! the working image into single-channel line art. Pipelines implement
//! [`FilterPipeline`] and are looked up through the [`PipelineRegistry`].

pub mod character;
pub mod registry;
pub mod scenery;

use std::fmt;
use std::str::FromStr;

use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TracerError};
use crate::imaging::{RasterScope, WorkingImage};

pub use character::CharacterPipeline;
pub use registry::PipelineRegistry;
pub use scenery::SceneryPipeline;

/// Render modes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum RenderMode {
    /// Clean closed line art for portraits and single subjects
    #[default]
    Character,
    /// Tone bands plus line work for landscapes and detailed scenes
    Scenery,
}

impl RenderMode {
    /// Label shown after this mode is picked automatically.
    pub fn label(&self) -> &'static str {
        match self {
            RenderMode::Character => "Character mode",
            RenderMode::Scenery => "Scenery mode",
        }
    }

    /// Stable identifier used on the command line and in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            RenderMode::Character => "character",
            RenderMode::Scenery => "scenery",
        }
    }
}

impl fmt::Display for RenderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RenderMode {
    type Err = TracerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "character" => Ok(RenderMode::Character),
            "scenery" => Ok(RenderMode::Scenery),
            other => Err(TracerError::InvalidConfig(format!(
                "unknown render mode '{other}'"
            ))),
        }
    }
}

/// A fixed sequence of image operations for one render mode.
///
/// Implementations must be pure: the same working image always produces the
/// same output. Intermediate rasters are acquired through `scope`; only the
/// returned image outlives the call.
pub trait FilterPipeline: Send + Sync {
    /// Mode this pipeline renders
    fn mode(&self) -> RenderMode;

    /// Human-readable name
    fn display_name(&self) -> &'static str;

    /// Run the pipeline on a working image.
    fn apply(&self, working: &WorkingImage, scope: &RasterScope) -> Result<GrayImage>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_mode_default_is_character() {
        assert_eq!(RenderMode::default(), RenderMode::Character);
    }

    #[test]
    fn test_render_mode_parse_and_display() {
        assert_eq!("Scenery".parse::<RenderMode>().unwrap(), RenderMode::Scenery);
        assert_eq!("character".parse::<RenderMode>().unwrap(), RenderMode::Character);
        assert!("portrait".parse::<RenderMode>().is_err());
        assert_eq!(RenderMode::Scenery.to_string(), "scenery");
    }
}
