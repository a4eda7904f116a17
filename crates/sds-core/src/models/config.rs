//! Configuration structures for the extraction pipeline.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable overriding the register CSV destination.
pub const REGISTER_CSV_ENV: &str = "SDS_REGISTER_CSV";

/// Main configuration for the sds pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SdsConfig {
    /// PDF processing configuration.
    pub pdf: PdfConfig,

    /// OCR configuration.
    pub ocr: OcrConfig,

    /// Field extraction configuration.
    pub extraction: ExtractionConfig,

    /// Output configuration.
    pub output: OutputConfig,
}

/// Which recognition backend to use for sparse pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OcrBackendKind {
    /// External `tesseract` executable.
    Tesseract,
    /// Pure Rust ONNX models from `model_dir`.
    Onnx,
    /// Never run recognition.
    Disabled,
}

/// OCR configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Backend used for low-density pages.
    pub backend: OcrBackendKind,

    /// Explicit path to the tesseract executable. Looked up on PATH when unset.
    pub tesseract_path: Option<PathBuf>,

    /// Tesseract language code.
    pub language: String,

    /// Directory with det.onnx, latin_rec.onnx and latin_dict.txt.
    pub model_dir: PathBuf,

    /// Per-page recognition timeout in seconds, counted from when a worker
    /// starts on the page.
    pub timeout_secs: u64,

    /// Pages recognized at once per document (0 = one per core).
    pub workers: usize,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            backend: OcrBackendKind::Tesseract,
            tesseract_path: None,
            language: "eng".to_string(),
            model_dir: PathBuf::from("models"),
            timeout_secs: 60,
            workers: 0,
        }
    }
}

/// PDF processing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfConfig {
    /// Maximum pages to read (0 = unlimited).
    pub max_pages: usize,

    /// Run OCR on low-density pages.
    pub ocr_low_density_pages: bool,
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self {
            max_pages: 0,
            ocr_low_density_pages: true,
        }
    }
}

/// Field extraction configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// JSON file with field rules merged over the built-in table.
    pub patterns_path: Option<PathBuf>,

    /// Use only the rules from `patterns_path`, dropping the built-in table.
    pub replace_builtin: bool,
}

/// Output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Register CSV destination.
    pub register_csv: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            register_csv: PathBuf::from("data/chemical_register.csv"),
        }
    }
}

impl OutputConfig {
    /// Register path after applying the environment override.
    pub fn resolved_register_csv(&self) -> PathBuf {
        resolve_register_csv(&self.register_csv, std::env::var(REGISTER_CSV_ENV).ok())
    }
}

fn resolve_register_csv(configured: &Path, env_value: Option<String>) -> PathBuf {
    match env_value {
        Some(v) if !v.trim().is_empty() => PathBuf::from(v.trim()),
        _ => configured.to_path_buf(),
    }
}

impl SdsConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        std::fs::write(path, content)
    }
}
