//! Tracer session
//!
//! Owns the state the UI shell drives: the current import, the render mode,
//! the overlay style, and the shared output canvas. Processing is
//! synchronous and happens in [`TracerSession::tick`] once an import has
//! settled.
//!
//! Each import gets its own [`ProcessingRequest`]. The request records
//! whether its image still needs classifying, was classified, or was
//! overridden by the user, so an automatic result can never replace a
//! manual choice and results for older imports are dropped.

use std::time::{Duration, Instant};

use image::RgbaImage;

use crate::capture::CameraFrame;
use crate::classifier::{Classification, ComplexityClassifier};
use crate::compositor::{self, Letterbox, OutputCanvas, SharedCanvas};
use crate::config::{OverlayStyle, TracerConfig};
use crate::error::{Result, TracerError};
use crate::imaging::{BufferLedger, RasterScope, SourceImage, WorkingImage};
use crate::pipeline::{PipelineRegistry, RenderMode};

/// Label shown while an import waits for classification.
pub const ANALYZING_LABEL: &str = "Analyzing...";

/// Identifier of one import.
pub type RequestId = u64;

/// Where an import stands with respect to automatic mode selection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClassificationState {
    /// The next pass classifies the image.
    PendingClassification,
    /// The user picked a mode; automatic results are ignored.
    UserOverridden(RenderMode),
    /// The classifier picked the mode.
    Classified(Classification),
}

/// One imported image and its processing state.
#[derive(Debug)]
pub struct ProcessingRequest {
    id: RequestId,
    source: SourceImage,
    state: ClassificationState,
    ready_at: Instant,
    pass_scheduled: bool,
}

impl ProcessingRequest {
    fn new(id: RequestId, source: SourceImage, ready_at: Instant) -> Self {
        Self {
            id,
            source,
            state: ClassificationState::PendingClassification,
            ready_at,
            pass_scheduled: true,
        }
    }

    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn state(&self) -> ClassificationState {
        self.state
    }

    pub fn source(&self) -> &SourceImage {
        &self.source
    }

    pub fn needs_classification(&self) -> bool {
        self.state == ClassificationState::PendingClassification
    }

    /// Whether a pass is waiting to run.
    pub fn is_scheduled(&self) -> bool {
        self.pass_scheduled
    }

    fn override_mode(&mut self, mode: RenderMode) {
        self.state = ClassificationState::UserOverridden(mode);
    }

    /// Record an automatic result. Only a request still waiting for one
    /// accepts it.
    fn resolve(&mut self, classification: Classification) -> bool {
        if self.needs_classification() {
            self.state = ClassificationState::Classified(classification);
            true
        } else {
            false
        }
    }

    /// Schedule a re-render no earlier than the original settle time.
    fn schedule(&mut self, now: Instant) {
        self.ready_at = self.ready_at.max(now);
        self.pass_scheduled = true;
    }
}

/// Summary of a successful pass.
#[derive(Debug, Clone)]
pub struct PassReport {
    pub request_id: RequestId,
    pub mode: RenderMode,
    /// Set when this pass classified the image.
    pub classification: Option<Classification>,
    pub letterbox: Letterbox,
    pub elapsed: Duration,
}

struct RenderedPass {
    canvas: OutputCanvas,
    mode: RenderMode,
    classification: Option<Classification>,
}

#[derive(Debug, Clone, Copy)]
struct StatusLabel {
    text: &'static str,
    expires_at: Option<Instant>,
}

/// Session state driven by the UI shell.
pub struct TracerSession {
    config: TracerConfig,
    classifier: ComplexityClassifier,
    pipelines: PipelineRegistry,
    ledger: BufferLedger,
    canvas: SharedCanvas,
    canvas_size: (u32, u32),
    mode: RenderMode,
    overlay: OverlayStyle,
    request: Option<ProcessingRequest>,
    next_request_id: RequestId,
    processing: bool,
    status: Option<StatusLabel>,
    locked: bool,
}

impl TracerSession {
    /// Create a session rendering into a canvas of the viewport size.
    pub fn new(config: TracerConfig, canvas_width: u32, canvas_height: u32) -> Result<Self> {
        config.validate()?;
        if canvas_width == 0 || canvas_height == 0 {
            return Err(TracerError::InvalidConfig(format!(
                "canvas has zero size ({canvas_width}x{canvas_height})"
            )));
        }
        Ok(Self {
            classifier: ComplexityClassifier::new(config.classifier),
            pipelines: PipelineRegistry::from_config(&config),
            ledger: BufferLedger::new(),
            canvas: OutputCanvas::shared(canvas_width, canvas_height),
            canvas_size: (canvas_width, canvas_height),
            mode: RenderMode::default(),
            overlay: config.overlay,
            request: None,
            next_request_id: 1,
            processing: false,
            status: None,
            locked: false,
            config,
        })
    }

    /// Replace the pipeline registry.
    pub fn with_pipelines(mut self, pipelines: PipelineRegistry) -> Self {
        self.pipelines = pipelines;
        self
    }

    pub fn config(&self) -> &TracerConfig {
        &self.config
    }

    /// Current render mode. Persists across imports until changed.
    pub fn mode(&self) -> RenderMode {
        self.mode
    }

    pub fn overlay(&self) -> &OverlayStyle {
        &self.overlay
    }

    pub fn is_processing(&self) -> bool {
        self.processing
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn current_request(&self) -> Option<&ProcessingRequest> {
        self.request.as_ref()
    }

    /// Live-buffer counters for the scoped rasters of every pass.
    pub fn ledger(&self) -> &BufferLedger {
        &self.ledger
    }

    /// Handle to the canvas, shared with the display layer.
    pub fn canvas(&self) -> SharedCanvas {
        self.canvas.clone()
    }

    /// Copy of the current canvas.
    pub fn canvas_snapshot(&self) -> OutputCanvas {
        self.canvas.lock().clone()
    }

    /// Status text to show at `now`, if any.
    pub fn status_label(&self, now: Instant) -> Option<&'static str> {
        let status = self.status?;
        match status.expires_at {
            Some(expires_at) if now >= expires_at => None,
            _ => Some(status.text),
        }
    }

    /// Import a decoded image. Processing starts after the settle delay.
    pub fn import_image(&mut self, source: SourceImage, now: Instant) -> Option<RequestId> {
        if self.locked {
            log::debug!("Import ignored while locked");
            return None;
        }
        let id = self.next_request_id;
        self.next_request_id += 1;

        let ready_at = now + Duration::from_millis(self.config.session.settle_delay_ms);
        log::info!(
            "Imported image #{} ({}x{})",
            id,
            source.width(),
            source.height()
        );
        self.request = Some(ProcessingRequest::new(id, source, ready_at));
        self.processing = true;
        self.status = Some(StatusLabel {
            text: ANALYZING_LABEL,
            expires_at: None,
        });
        Some(id)
    }

    /// Decode and import an encoded image. A file that fails to decode is
    /// dropped and the session returns to idle.
    pub fn import_bytes(&mut self, bytes: &[u8], now: Instant) -> Option<RequestId> {
        if self.locked {
            log::debug!("Import ignored while locked");
            return None;
        }
        match SourceImage::decode(bytes) {
            Ok(source) => self.import_image(source, now),
            Err(e) => {
                log::warn!("Dropping import that failed to decode: {}", e);
                // A pass still scheduled for the previous import keeps running.
                let pending = self
                    .request
                    .as_ref()
                    .is_some_and(ProcessingRequest::is_scheduled);
                if !pending {
                    self.processing = false;
                    self.status = None;
                }
                None
            }
        }
    }

    /// Manually select a render mode.
    ///
    /// The choice sticks for the current import: no automatic result for it
    /// is applied afterwards. The current image is re-rendered.
    pub fn set_mode(&mut self, mode: RenderMode, now: Instant) -> bool {
        if self.locked {
            log::debug!("Mode change ignored while locked");
            return false;
        }
        self.mode = mode;
        if let Some(request) = self.request.as_mut() {
            request.override_mode(mode);
            request.schedule(now);
            self.processing = true;
            if matches!(self.status, Some(StatusLabel { text: ANALYZING_LABEL, .. })) {
                self.status = None;
            }
        }
        log::info!("Mode set to {}", mode);
        true
    }

    /// Set overlay opacity from the slider. Returns false when the value was
    /// ignored.
    pub fn set_opacity(&mut self, value: f32) -> bool {
        if self.locked {
            return false;
        }
        self.overlay.set_opacity(value)
    }

    /// Hide the controls; mode, opacity, and import are ignored until unlocked.
    pub fn lock(&mut self) {
        self.locked = true;
    }

    pub fn unlock(&mut self) {
        self.locked = false;
    }

    /// The viewport changed size. The current image is re-rendered without
    /// classifying it again.
    pub fn resize_canvas(&mut self, width: u32, height: u32, now: Instant) -> Result<()> {
        if width == 0 || height == 0 {
            return Err(TracerError::InvalidConfig(format!(
                "canvas has zero size ({width}x{height})"
            )));
        }
        if (width, height) == self.canvas_size {
            return Ok(());
        }
        self.canvas_size = (width, height);
        match self.request.as_mut() {
            Some(request) => {
                request.schedule(now);
                self.processing = true;
            }
            None => *self.canvas.lock() = OutputCanvas::blank(width, height),
        }
        Ok(())
    }

    /// Apply an automatic classification for `request_id`.
    ///
    /// Returns false, leaving the mode untouched, when the result belongs to
    /// an older import or the user already picked a mode.
    pub fn record_classification(
        &mut self,
        request_id: RequestId,
        classification: Classification,
        now: Instant,
    ) -> bool {
        let Some(request) = self.request.as_mut() else {
            return false;
        };
        if request.id != request_id {
            log::debug!(
                "Ignoring classification for import #{} (current is #{})",
                request_id,
                request.id
            );
            return false;
        }
        if !request.resolve(classification) {
            log::debug!("Ignoring classification for import #{}: mode already set", request_id);
            return false;
        }
        self.mode = classification.mode;
        self.status = Some(StatusLabel {
            text: classification.label(),
            expires_at: Some(now + Duration::from_millis(self.config.session.status_ttl_ms)),
        });
        true
    }

    /// Run the scheduled pass if it is due.
    pub fn tick(&mut self, now: Instant) -> Option<Result<PassReport>> {
        let due = self
            .request
            .as_ref()
            .is_some_and(|r| r.pass_scheduled && r.ready_at <= now);
        if due {
            Some(self.run_pass(now))
        } else {
            None
        }
    }

    /// Run the current request immediately, ignoring the settle delay.
    pub fn process_now(&mut self, now: Instant) -> Result<PassReport> {
        if self.request.is_none() {
            return Err(TracerError::InvalidRaster("no image imported".to_string()));
        }
        self.run_pass(now)
    }

    fn run_pass(&mut self, now: Instant) -> Result<PassReport> {
        let started = Instant::now();
        let request_id = match self.request.as_mut() {
            Some(request) => {
                request.pass_scheduled = false;
                request.id
            }
            None => return Err(TracerError::InvalidRaster("no image imported".to_string())),
        };

        let rendered = self.render_current();
        self.processing = false;

        let rendered = match rendered {
            Ok(rendered) => rendered,
            Err(e) => {
                log::error!("Processing pass for import #{} failed: {}", request_id, e);
                if matches!(self.status, Some(StatusLabel { text: ANALYZING_LABEL, .. })) {
                    self.status = None;
                }
                return Err(e);
            }
        };

        if let Some(classification) = rendered.classification {
            self.record_classification(request_id, classification, now);
        }

        let letterbox = rendered
            .canvas
            .letterbox()
            .ok_or_else(|| TracerError::InvalidRaster("pass produced no image".to_string()))?;
        *self.canvas.lock() = rendered.canvas;

        let elapsed = started.elapsed();
        log::info!(
            "Rendered import #{} in {} mode ({:.1} ms)",
            request_id,
            rendered.mode,
            elapsed.as_secs_f64() * 1000.0
        );
        Ok(PassReport {
            request_id,
            mode: rendered.mode,
            classification: rendered.classification,
            letterbox,
            elapsed,
        })
    }

    /// Render the current request without touching session state.
    fn render_current(&self) -> Result<RenderedPass> {
        let request = self
            .request
            .as_ref()
            .ok_or_else(|| TracerError::InvalidRaster("no image imported".to_string()))?;

        let scope = RasterScope::new(&self.ledger, "pass");
        let working = scope.track(WorkingImage::from_source(
            &request.source,
            self.config.working_resolution,
        )?);

        let (mode, classification) = if request.needs_classification() {
            let classification = self.classifier.classify(&working, &scope)?;
            (classification.mode, Some(classification))
        } else {
            (self.mode, None)
        };

        let pipeline = self.pipelines.get(mode).ok_or_else(|| {
            TracerError::InvalidConfig(format!("no pipeline registered for {mode} mode"))
        })?;
        log::debug!("Running {} pipeline", pipeline.display_name());
        let result = scope.track(pipeline.apply(&working, &scope)?);

        let (width, height) = self.canvas_size;
        let canvas = compositor::compose(&result, width, height, &scope)?;
        Ok(RenderedPass {
            canvas,
            mode,
            classification,
        })
    }

    /// Presented frame: the current canvas over a camera frame.
    pub fn present(&self, frame: &CameraFrame) -> Result<RgbaImage> {
        let canvas = self.canvas.lock();
        compositor::present_over(&frame.image, &canvas, &self.overlay)
    }
}
