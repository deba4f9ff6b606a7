//! Pipeline registry
//!
//! Holds one pipeline per render mode. The defaults are registered from the
//! configuration at startup; registering again for a mode replaces it.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::TracerConfig;

use super::{CharacterPipeline, FilterPipeline, RenderMode, SceneryPipeline};

/// Registry of filter pipelines by render mode
pub struct PipelineRegistry {
    pipelines: HashMap<RenderMode, Arc<dyn FilterPipeline>>,
}

impl Default for PipelineRegistry {
    fn default() -> Self {
        Self::from_config(&TracerConfig::default())
    }
}

impl PipelineRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            pipelines: HashMap::new(),
        }
    }

    /// Registry with both built-in pipelines configured from `config`
    pub fn from_config(config: &TracerConfig) -> Self {
        let mut registry = Self::new();
        registry.register(CharacterPipeline::new(config.character));
        registry.register(SceneryPipeline::new(config.scenery));
        registry
    }

    /// Register a pipeline for its mode, replacing any previous one
    pub fn register(&mut self, pipeline: impl FilterPipeline + 'static) {
        let mode = pipeline.mode();
        if self.pipelines.insert(mode, Arc::new(pipeline)).is_some() {
            log::debug!("Replaced pipeline for {} mode", mode);
        }
    }

    /// Get the pipeline for a mode
    pub fn get(&self, mode: RenderMode) -> Option<Arc<dyn FilterPipeline>> {
        self.pipelines.get(&mode).cloned()
    }

    /// Check if a mode has a pipeline
    pub fn contains(&self, mode: RenderMode) -> bool {
        self.pipelines.contains_key(&mode)
    }

    /// Number of registered pipelines
    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }
}
