//! Core library for Safety Data Sheet extraction.
//!
//! This crate provides:
//! - Per-page PDF text acquisition with low-density page detection
//! - Optional optical recognition of sparse pages (tesseract or ONNX)
//! - Configurable first-match-wins field rules
//! - Hazard summary, date normalization and risk rating
//! - Chemical register records with a fixed column set

pub mod cancel;
pub mod error;
pub mod models;
pub mod ocr;
pub mod pdf;
pub mod pipeline;
pub mod sds;

#[cfg(test)]
mod test_support;

pub use cancel::CancelFlag;
pub use error::{ConfigError, DocumentReadError, OcrError, Result, SdsError};
pub use models::config::SdsConfig;
pub use models::document::{Document, Page, LOW_DENSITY_THRESHOLD};
pub use models::record::{Column, Record};
pub use ocr::{
    create_backend, OcrStatus, PageDeadline, RecognitionBackend, RecognitionOutcome, SkipReason,
};
pub use pdf::{PdfExtractor, PdfProcessor, PdfType};
pub use pipeline::{
    document_hash, DocumentOutcome, Extraction, OutcomeStatus, Provenance, SdsPipeline,
};
pub use sds::rules::{ExtractionResult, FieldConfig};
pub use sds::{RecordOverrides, SdsParser};
