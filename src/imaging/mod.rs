//! Raster types and the image primitives the pipelines are built from.
//!
//! Decoding, resampling, edge detection, and morphology come from the
//! `image` and `imageproc` crates. The remaining primitives are small
//! single-channel helpers in [`ops`].

pub mod ops;
pub mod raster;
pub mod scope;

pub use ops::AdaptiveMethod;
pub use raster::{working_dimensions, SourceImage, WorkingImage};
pub use scope::{BufferLedger, RasterScope, Scoped};
