//! Error types shared across the tracer.

use thiserror::Error;

/// Errors that can occur while importing, processing, or exporting.
#[derive(Error, Debug)]
pub enum TracerError {
    #[error("Failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("Invalid raster: {0}")]
    InvalidRaster(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Capture unavailable: {0}")]
    CaptureUnavailable(String),
    #[error("Recording failed: {0}")]
    Recording(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse configuration: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, TracerError>;
