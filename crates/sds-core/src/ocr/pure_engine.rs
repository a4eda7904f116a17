//! Pure Rust recognition backend using `pure-onnx-ocr`.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

use image::DynamicImage;
use tracing::{debug, info};

use super::{OcrStatus, PageDeadline, RecognitionBackend};
use crate::error::OcrError;

const DETECTION_MODEL: &str = "det.onnx";
const RECOGNITION_MODEL: &str = "latin_rec.onnx";
const DICTIONARY: &str = "latin_dict.txt";

type Engine = pure_onnx_ocr::engine::OcrEngine;

/// ONNX OCR backend reading its models from a directory.
///
/// Models are loaded on the first page and reused for the rest of the run.
pub struct OnnxBackend {
    model_dir: PathBuf,
    engine: Mutex<Option<Engine>>,
}

impl OnnxBackend {
    pub fn new(model_dir: PathBuf) -> Self {
        Self {
            model_dir,
            engine: Mutex::new(None),
        }
    }

    /// Lock the shared engine, loading the models if this is the first use.
    fn engine(&self) -> Result<MutexGuard<'_, Option<Engine>>, OcrError> {
        let mut guard = self
            .engine
            .lock()
            .map_err(|_| OcrError::Recognition("OCR engine lock poisoned".to_string()))?;
        if guard.is_none() {
            *guard = Some(Self::build_engine(&self.model_dir)?);
            debug!("Loaded pure-onnx-ocr engine from {}", self.model_dir.display());
        }
        Ok(guard)
    }

    fn missing_models(&self) -> Vec<&'static str> {
        [DETECTION_MODEL, RECOGNITION_MODEL, DICTIONARY]
            .into_iter()
            .filter(|name| !self.model_dir.join(name).is_file())
            .collect()
    }

    fn build_engine(model_dir: &Path) -> Result<Engine, OcrError> {
        pure_onnx_ocr::engine::OcrEngineBuilder::new()
            .det_model_path(&model_dir.join(DETECTION_MODEL))
            .rec_model_path(&model_dir.join(RECOGNITION_MODEL))
            .dictionary_path(&model_dir.join(DICTIONARY))
            .build()
            .map_err(|e| OcrError::ModelLoad(format!("pure-onnx-ocr: {}", e)))
    }
}

impl RecognitionBackend for OnnxBackend {
    fn name(&self) -> &str {
        "onnx"
    }

    fn status(&self) -> OcrStatus {
        let missing = self.missing_models();
        OcrStatus {
            backend: "onnx".to_string(),
            importable: true,
            executable_found: missing.is_empty(),
            version: None,
            error: (!missing.is_empty()).then(|| {
                format!(
                    "missing {} in {}",
                    missing.join(", "),
                    self.model_dir.display()
                )
            }),
        }
    }

    fn max_concurrency(&self) -> Option<usize> {
        Some(1)
    }

    fn recognize(&self, image: &DynamicImage, deadline: &PageDeadline) -> Result<String, OcrError> {
        let missing = self.missing_models();
        if !missing.is_empty() {
            return Err(OcrError::Unavailable(format!(
                "missing {} in {}",
                missing.join(", "),
                self.model_dir.display()
            )));
        }

        let guard = self.engine()?;
        deadline.check()?;
        let engine = guard
            .as_ref()
            .ok_or_else(|| OcrError::ModelLoad("engine not loaded".to_string()))?;

        let start = Instant::now();
        let results = engine
            .run_from_image(image)
            .map_err(|e| OcrError::Recognition(format!("pure-onnx-ocr: {}", e)))?;

        // Reading order: rows of ~20px top to bottom, then left to right.
        let mut lines: Vec<((i32, f32), String)> = results
            .iter()
            .map(|r| {
                let (x, y) = top_left(&r.bounding_box);
                (((y / 20.0) as i32, x), r.text.replace("[UNK]", " "))
            })
            .collect();
        lines.sort_by(|a, b| {
            a.0 .0
                .cmp(&b.0 .0)
                .then(a.0 .1.partial_cmp(&b.0 .1).unwrap_or(std::cmp::Ordering::Equal))
        });

        info!(
            "OCR complete: {} text regions in {}ms",
            lines.len(),
            start.elapsed().as_millis()
        );

        Ok(lines
            .into_iter()
            .map(|(_, text)| text)
            .collect::<Vec<_>>()
            .join("\n"))
    }
}

/// Top-left corner of a detected text polygon.
fn top_left(polygon: &pure_onnx_ocr::Polygon<f64>) -> (f32, f32) {
    polygon
        .exterior()
        .coords()
        .take(4)
        .fold((f32::INFINITY, f32::INFINITY), |(x, y), c| {
            (x.min(c.x as f32), y.min(c.y as f32))
        })
}
