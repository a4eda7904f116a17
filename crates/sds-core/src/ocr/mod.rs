//! Optical recognition for pages without a usable text layer.
//!
//! Recognition is a capability: a [`RecognitionBackend`] reports whether it can
//! run before it is asked to, so callers branch on availability instead of
//! discovering a missing backend halfway through a document.

#[cfg(feature = "native")]
mod pure_engine;
mod runner;
mod tesseract;

#[cfg(feature = "native")]
pub use pure_engine::OnnxBackend;
pub use runner::{PageDeadline, RecognitionJob, recognize_pages, worker_count};
pub use tesseract::TesseractBackend;

use std::sync::Arc;

use image::DynamicImage;
use serde::Serialize;

use crate::error::OcrError;
use crate::models::config::{OcrBackendKind, OcrConfig};

/// Diagnostics for a recognition backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OcrStatus {
    /// Backend name.
    pub backend: String,
    /// Whether the backend was compiled into this build.
    pub importable: bool,
    /// Whether the executable or model files were found.
    pub executable_found: bool,
    /// Version reported by the backend.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Why the backend cannot run, if it cannot.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl OcrStatus {
    /// Whether recognition can run at all.
    pub fn is_available(&self) -> bool {
        self.importable && self.executable_found
    }
}

/// Why recognition did not produce text for a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum SkipReason {
    /// No backend could run in this process.
    BackendUnavailable,
    /// The page had no raster image to recognize.
    NoPageImage(String),
    /// The backend did not answer within the timeout.
    TimedOut,
    /// The backend ran and returned an error.
    Failed(String),
    /// Processing was cancelled before the page was recognized.
    Cancelled,
}

/// What happened when a low-density page was sent to recognition.
///
/// `Recognized("")` means recognition ran and found nothing; `Skipped` means
/// it never produced a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum RecognitionOutcome {
    Recognized(String),
    Skipped(SkipReason),
}

impl RecognitionOutcome {
    pub fn ran(&self) -> bool {
        matches!(self, RecognitionOutcome::Recognized(_))
    }
}

/// Trait for optical recognition backends.
pub trait RecognitionBackend: Send + Sync {
    /// Short backend name for logs and diagnostics.
    fn name(&self) -> &str;

    /// Availability and version information.
    fn status(&self) -> OcrStatus;

    /// How many pages the backend can recognize at once, if limited.
    fn max_concurrency(&self) -> Option<usize> {
        None
    }

    /// Recognize the text in a page image.
    ///
    /// Backends that run external work should stop it and return the
    /// deadline's error once [`PageDeadline::check`] fails.
    fn recognize(&self, image: &DynamicImage, deadline: &PageDeadline) -> Result<String, OcrError>;
}

/// Backend that never runs. Used when recognition is disabled or not compiled in.
pub struct UnavailableBackend {
    name: String,
    importable: bool,
    reason: String,
}

impl UnavailableBackend {
    /// Recognition switched off in configuration.
    pub fn disabled() -> Self {
        Self {
            name: "disabled".to_string(),
            importable: false,
            reason: "recognition disabled in configuration".to_string(),
        }
    }

    /// A backend that this build does not include.
    pub fn not_compiled(name: &str) -> Self {
        Self {
            name: name.to_string(),
            importable: false,
            reason: format!("{} support not compiled into this build", name),
        }
    }
}

impl RecognitionBackend for UnavailableBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn status(&self) -> OcrStatus {
        OcrStatus {
            backend: self.name.clone(),
            importable: self.importable,
            executable_found: false,
            version: None,
            error: Some(self.reason.clone()),
        }
    }

    fn recognize(&self, _image: &DynamicImage, _deadline: &PageDeadline) -> Result<String, OcrError> {
        Err(OcrError::Unavailable(self.reason.clone()))
    }
}

/// Create the backend selected in configuration.
pub fn create_backend(config: &OcrConfig) -> Arc<dyn RecognitionBackend> {
    match config.backend {
        OcrBackendKind::Tesseract => Arc::new(TesseractBackend::new(
            config.tesseract_path.clone(),
            config.language.clone(),
        )),
        #[cfg(feature = "native")]
        OcrBackendKind::Onnx => Arc::new(OnnxBackend::new(config.model_dir.clone())),
        #[cfg(not(feature = "native"))]
        OcrBackendKind::Onnx => Arc::new(UnavailableBackend::not_compiled("onnx")),
        OcrBackendKind::Disabled => Arc::new(UnavailableBackend::disabled()),
    }
}
