//! Camera frame sources
//!
//! The live feed is only a visual backdrop for the overlay. Anything that
//! can hand out its latest RGBA frame implements [`FrameSource`]; a still
//! image stands in for the camera on the command line.

use std::path::Path;
use std::time::Instant;

use image::RgbaImage;

use crate::config::CaptureRequest;
use crate::error::{Result, TracerError};

/// Camera frame data
#[derive(Clone, Debug)]
pub struct CameraFrame {
    /// RGBA pixels
    pub image: RgbaImage,
    /// Frame number
    pub frame_number: u64,
    /// Frame timestamp
    pub timestamp: Instant,
}

impl CameraFrame {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// A provider of live frames.
pub trait FrameSource {
    /// Latest captured frame, if any has arrived yet.
    fn latest_frame(&self) -> Option<CameraFrame>;

    /// Resolution of the frames this source produces.
    fn resolution(&self) -> (u32, u32);
}

/// A single still image served as a never-changing camera feed.
pub struct StillFrameSource {
    frame: CameraFrame,
}

impl StillFrameSource {
    pub fn new(image: RgbaImage) -> Self {
        Self {
            frame: CameraFrame {
                image,
                frame_number: 0,
                timestamp: Instant::now(),
            },
        }
    }

    /// Open an image file as the backdrop.
    ///
    /// An unreadable file is reported as capture-unavailable, the same way a
    /// denied camera permission is.
    pub fn open(path: &Path, request: &CaptureRequest) -> Result<Self> {
        let image = image::open(path).map_err(|e| {
            TracerError::CaptureUnavailable(format!("{}: {}", path.display(), e))
        })?;
        let source = Self::new(image.to_rgba8());
        let (width, height) = source.resolution();
        if (width, height) != (request.ideal_width, request.ideal_height) {
            log::debug!(
                "Backdrop is {}x{} (requested {}x{})",
                width,
                height,
                request.ideal_width,
                request.ideal_height
            );
        }
        Ok(source)
    }
}

impl FrameSource for StillFrameSource {
    fn latest_frame(&self) -> Option<CameraFrame> {
        Some(self.frame.clone())
    }

    fn resolution(&self) -> (u32, u32) {
        (self.frame.width(), self.frame.height())
    }
}
