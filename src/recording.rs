//! Recording and export of the presented view
//!
//! The encoder itself lives behind [`RecorderBackend`]; this module handles
//! container negotiation, the record/preview/save cycle, and export naming.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::error::{Result, TracerError};

/// MIME type used when the backend does not report one.
pub const FALLBACK_MIME: &str = "video/webm";

/// Container formats in order of preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerFormat {
    Mp4,
    WebmH264,
    WebmVp9,
    Webm,
}

impl ContainerFormat {
    pub const PREFERRED: [ContainerFormat; 4] = [
        ContainerFormat::Mp4,
        ContainerFormat::WebmH264,
        ContainerFormat::WebmVp9,
        ContainerFormat::Webm,
    ];

    pub fn mime_type(&self) -> &'static str {
        match self {
            ContainerFormat::Mp4 => "video/mp4",
            ContainerFormat::WebmH264 => "video/webm;codecs=h264",
            ContainerFormat::WebmVp9 => "video/webm;codecs=vp9",
            ContainerFormat::Webm => "video/webm",
        }
    }
}

/// Encoder that records the presented view.
pub trait RecorderBackend {
    /// Whether a live stream exists to record.
    fn stream_available(&self) -> bool;

    /// Whether the encoder can produce this MIME type.
    fn supports(&self, mime_type: &str) -> bool;

    /// Begin recording. `None` lets the encoder pick its default format.
    fn start(&mut self, mime_type: Option<&str>) -> Result<()>;

    /// Stop recording and hand back the encoded chunks.
    fn stop(&mut self) -> Result<Vec<Vec<u8>>>;

    /// MIME type of the recording, if the encoder reports one.
    fn mime_type(&self) -> Option<String>;
}

/// First preferred format the backend supports.
pub fn negotiate_format<B: RecorderBackend + ?Sized>(backend: &B) -> Option<ContainerFormat> {
    ContainerFormat::PREFERRED
        .into_iter()
        .find(|format| backend.supports(format.mime_type()))
}

/// A finished recording awaiting save or discard.
#[derive(Debug, Clone, PartialEq)]
pub struct Clip {
    pub data: Vec<u8>,
    pub mime_type: String,
}

impl Clip {
    /// File extension for the clip's container.
    pub fn extension(&self) -> &'static str {
        if self.mime_type.contains("mp4") {
            "mp4"
        } else {
            "webm"
        }
    }
}

/// Export name for a clip saved at `at`, e.g.
/// `Sketch_Video_2024-05-01T12-30-00.mp4`.
pub fn export_file_name(clip: &Clip, at: DateTime<Utc>) -> String {
    format!(
        "Sketch_Video_{}.{}",
        at.format("%Y-%m-%dT%H-%M-%S"),
        clip.extension()
    )
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecorderState {
    Idle,
    Recording,
    Preview(Clip),
}

/// Record, preview, then save or discard.
pub struct Recorder<B: RecorderBackend> {
    backend: B,
    state: RecorderState,
}

impl<B: RecorderBackend> Recorder<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            state: RecorderState::Idle,
        }
    }

    pub fn state(&self) -> &RecorderState {
        &self.state
    }

    pub fn is_recording(&self) -> bool {
        self.state == RecorderState::Recording
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Clip waiting in preview, if any.
    pub fn preview(&self) -> Option<&Clip> {
        match &self.state {
            RecorderState::Preview(clip) => Some(clip),
            _ => None,
        }
    }

    /// Start if idle, stop if recording.
    pub fn toggle(&mut self) -> Result<()> {
        if self.is_recording() {
            self.stop()
        } else {
            self.start().map(|_| ())
        }
    }

    /// Start recording. Returns false without doing anything when there is
    /// no stream or the recorder is not idle.
    pub fn start(&mut self) -> Result<bool> {
        if self.state != RecorderState::Idle {
            return Ok(false);
        }
        if !self.backend.stream_available() {
            log::debug!("No stream to record");
            return Ok(false);
        }
        let format = negotiate_format(&self.backend);
        match format {
            Some(format) => log::info!("Recording as {}", format.mime_type()),
            None => log::info!("Recording with the encoder's default format"),
        }
        self.backend
            .start(format.map(|f| f.mime_type()))
            .map_err(|e| TracerError::Recording(format!("failed to start: {e}")))?;
        self.state = RecorderState::Recording;
        Ok(true)
    }

    /// Stop recording and move the clip into preview.
    pub fn stop(&mut self) -> Result<()> {
        if !self.is_recording() {
            return Ok(());
        }
        // Stays in Recording when the encoder fails, so stop can be retried.
        let chunks = self
            .backend
            .stop()
            .map_err(|e| TracerError::Recording(format!("failed to stop: {e}")))?;
        let data: Vec<u8> = chunks
            .into_iter()
            .filter(|chunk| !chunk.is_empty())
            .flatten()
            .collect();
        let mime_type = self
            .backend
            .mime_type()
            .filter(|mime| !mime.is_empty())
            .unwrap_or_else(|| FALLBACK_MIME.to_string());
        log::info!("Recorded {} bytes of {}", data.len(), mime_type);
        self.state = RecorderState::Preview(Clip { data, mime_type });
        Ok(())
    }

    /// Write the previewed clip into `dir` and return to idle.
    pub fn save_to(&mut self, dir: &Path, at: DateTime<Utc>) -> Result<PathBuf> {
        let clip = match &self.state {
            RecorderState::Preview(clip) => clip,
            _ => return Err(TracerError::Recording("no clip to save".to_string())),
        };
        let path = dir.join(export_file_name(clip, at));
        fs::write(&path, &clip.data)?;
        log::info!("Saved recording to {}", path.display());
        self.state = RecorderState::Idle;
        Ok(path)
    }

    /// Drop the previewed clip.
    pub fn discard(&mut self) -> bool {
        if self.preview().is_some() {
            self.state = RecorderState::Idle;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[derive(Default)]
    struct MemoryBackend {
        stream: bool,
        supported: Vec<&'static str>,
        started_with: Option<Option<String>>,
        chunks: Vec<Vec<u8>>,
        reported_mime: Option<String>,
        failed_stops: usize,
    }

    impl RecorderBackend for MemoryBackend {
        fn stream_available(&self) -> bool {
            self.stream
        }

        fn supports(&self, mime_type: &str) -> bool {
            self.supported.contains(&mime_type)
        }

        fn start(&mut self, mime_type: Option<&str>) -> Result<()> {
            self.started_with = Some(mime_type.map(str::to_string));
            Ok(())
        }

        fn stop(&mut self) -> Result<Vec<Vec<u8>>> {
            if self.failed_stops > 0 {
                self.failed_stops -= 1;
                return Err(TracerError::Io(std::io::Error::other("encoder stalled")));
            }
            Ok(std::mem::take(&mut self.chunks))
        }

        fn mime_type(&self) -> Option<String> {
            self.reported_mime.clone()
        }
    }

    fn backend() -> MemoryBackend {
        MemoryBackend {
            stream: true,
            supported: vec!["video/webm;codecs=vp9", "video/webm"],
            chunks: vec![vec![1, 2], Vec::new(), vec![3]],
            reported_mime: Some("video/webm;codecs=vp9".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_negotiates_first_supported_format() {
        assert_eq!(negotiate_format(&backend()), Some(ContainerFormat::WebmVp9));

        let mut all = backend();
        all.supported = ContainerFormat::PREFERRED.iter().map(|f| f.mime_type()).collect();
        assert_eq!(negotiate_format(&all), Some(ContainerFormat::Mp4));

        let mut none = backend();
        none.supported.clear();
        assert_eq!(negotiate_format(&none), None);
    }

    #[test]
    fn test_start_without_stream_is_noop() {
        let mut recorder = Recorder::new(MemoryBackend::default());
        assert!(!recorder.start().unwrap());
        assert_eq!(recorder.state(), &RecorderState::Idle);
        assert!(recorder.backend().started_with.is_none());
    }

    #[test]
    fn test_toggle_cycle_drops_empty_chunks() {
        let mut recorder = Recorder::new(backend());
        recorder.toggle().unwrap();
        assert!(recorder.is_recording());
        assert_eq!(
            recorder.backend().started_with,
            Some(Some("video/webm;codecs=vp9".to_string()))
        );

        recorder.toggle().unwrap();
        let clip = recorder.preview().unwrap();
        assert_eq!(clip.data, vec![1, 2, 3]);
        assert_eq!(clip.extension(), "webm");

        assert!(recorder.discard());
        assert_eq!(recorder.state(), &RecorderState::Idle);
        assert!(!recorder.discard());
    }

    #[test]
    fn test_failed_stop_keeps_recording() {
        let mut backend = backend();
        backend.failed_stops = 1;
        let mut recorder = Recorder::new(backend);
        recorder.start().unwrap();

        let result = recorder.stop();
        assert!(matches!(result, Err(TracerError::Recording(_))));
        assert!(recorder.is_recording());

        recorder.stop().unwrap();
        assert_eq!(recorder.preview().unwrap().data, vec![1, 2, 3]);
    }

    #[test]
    fn test_mime_falls_back_to_webm() {
        let mut backend = backend();
        backend.reported_mime = Some(String::new());
        let mut recorder = Recorder::new(backend);
        recorder.start().unwrap();
        recorder.stop().unwrap();
        assert_eq!(recorder.preview().unwrap().mime_type, FALLBACK_MIME);
    }

    #[test]
    fn test_export_file_name() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 9).unwrap();
        let mp4 = Clip {
            data: Vec::new(),
            mime_type: "video/mp4".to_string(),
        };
        assert_eq!(export_file_name(&mp4, at), "Sketch_Video_2024-05-01T12-30-09.mp4");

        let webm = Clip {
            data: Vec::new(),
            mime_type: "video/webm;codecs=h264".to_string(),
        };
        assert_eq!(export_file_name(&webm, at), "Sketch_Video_2024-05-01T12-30-09.webm");
    }

    #[test]
    fn test_save_writes_clip_and_returns_to_idle() {
        let dir = tempfile::tempdir().unwrap();
        let mut recorder = Recorder::new(backend());
        assert!(recorder.save_to(dir.path(), Utc::now()).is_err());

        recorder.start().unwrap();
        recorder.stop().unwrap();
        let at = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        let path = recorder.save_to(dir.path(), at).unwrap();

        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "Sketch_Video_2025-01-02T03-04-05.webm"
        );
        assert_eq!(std::fs::read(&path).unwrap(), vec![1, 2, 3]);
        assert_eq!(recorder.state(), &RecorderState::Idle);
    }
}
