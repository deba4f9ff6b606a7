//! Sketch Tracer - turn a photo into a traceable line overlay
//!
//! An imported image is classified by edge density and rendered through one
//! of two filter pipelines: Character mode for portraits and line subjects,
//! Scenery mode for busy scenes. The result is letterboxed onto a white
//! canvas and multiplied over a live camera feed so it can be traced on
//! paper.

pub mod capture;
pub mod classifier;
pub mod compositor;
pub mod config;
pub mod error;
pub mod imaging;
pub mod pipeline;
pub mod recording;
pub mod session;

pub use classifier::{Classification, ComplexityClassifier};
pub use config::TracerConfig;
pub use error::{Result, TracerError};
pub use pipeline::{FilterPipeline, PipelineRegistry, RenderMode};
pub use session::{PassReport, TracerSession};
