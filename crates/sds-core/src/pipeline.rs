//! End-to-end processing of one safety data sheet into a register record.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::cancel::CancelFlag;
use crate::error::{DocumentReadError, Result, SdsError};
use crate::models::config::SdsConfig;
use crate::models::document::{Document, Page};
use crate::models::record::Record;
use crate::ocr::{
    create_backend, recognize_pages, OcrStatus, RecognitionBackend, RecognitionJob,
    RecognitionOutcome, SkipReason,
};
use crate::pdf::{PdfExtractor, PdfProcessor, PdfType};
use crate::sds::rules::{ExtractionResult, FieldConfig};
use crate::sds::{assemble, ParsedSds, RecordOverrides, SdsParser};

/// Where a document's text came from.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Provenance {
    /// Hex SHA-256 of the source bytes.
    pub document_hash: String,
    pub page_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdf_type: Option<PdfType>,
    /// Backend used for low-density pages.
    pub ocr_backend: String,
    /// Pages flagged as low density.
    pub ocr_pages: Vec<u32>,
    /// Pages where recognition ran.
    pub recognized_pages: Vec<u32>,
    /// Flagged pages that were not recognized, and why.
    pub skipped_pages: BTreeMap<u32, SkipReason>,
    pub from_recognition: bool,
    pub processing_time_ms: u64,
}

/// A successfully processed document.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub record: Record,
    pub parsed: ParsedSds,
    pub provenance: Provenance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Ok,
    Failed,
    Cancelled,
}

/// Result of processing one input, successful or not.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentOutcome {
    pub source: String,
    pub status: OutcomeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub record: Record,
    pub fields: BTreeMap<String, ExtractionResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provenance: Option<Provenance>,
}

impl DocumentOutcome {
    fn ok(source: String, extraction: Extraction) -> Self {
        Self {
            source,
            status: OutcomeStatus::Ok,
            error: None,
            record: extraction.record,
            fields: extraction.parsed.fields,
            provenance: Some(extraction.provenance),
        }
    }

    /// A failed document still yields a full record.
    pub fn failed(source: String, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            source,
            status: OutcomeStatus::Failed,
            record: Record::failed(&reason),
            error: Some(reason),
            fields: BTreeMap::new(),
            provenance: None,
        }
    }

    /// A document the run stopped before finishing. Not a register row.
    pub fn cancelled(source: String) -> Self {
        Self {
            status: OutcomeStatus::Cancelled,
            ..Self::failed(source, "processing cancelled")
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == OutcomeStatus::Ok
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == OutcomeStatus::Cancelled
    }

    pub fn document_hash(&self) -> Option<&str> {
        self.provenance.as_ref().map(|p| p.document_hash.as_str())
    }
}

/// Document to record pipeline. Shareable across threads; holds no per-document state.
#[derive(Clone)]
pub struct SdsPipeline {
    parser: SdsParser,
    backend: Arc<dyn RecognitionBackend>,
    backend_status: OcrStatus,
    recognize_low_density: bool,
    timeout: Duration,
    workers: usize,
    max_pages: usize,
    overrides: RecordOverrides,
}

impl SdsPipeline {
    /// Build a pipeline from application configuration.
    ///
    /// Fails if the pattern configuration is invalid; nothing should be
    /// processed with a broken rule table.
    pub fn from_config(config: &SdsConfig) -> Result<Self> {
        let fields = FieldConfig::load(&config.extraction)?;
        let pipeline = Self::new(Arc::new(fields), create_backend(&config.ocr))
            .with_timeout(Duration::from_secs(config.ocr.timeout_secs))
            .with_workers(config.ocr.workers)
            .with_max_pages(config.pdf.max_pages)
            .with_low_density_recognition(config.pdf.ocr_low_density_pages);
        Ok(pipeline)
    }

    pub fn new(fields: Arc<FieldConfig>, backend: Arc<dyn RecognitionBackend>) -> Self {
        let backend_status = backend.status();
        Self {
            parser: SdsParser::new(fields),
            backend,
            backend_status,
            recognize_low_density: true,
            timeout: Duration::from_secs(60),
            workers: 0,
            max_pages: 0,
            overrides: RecordOverrides::default(),
        }
    }

    /// Swap the recognition backend; its availability is checked once here.
    pub fn with_backend(mut self, backend: Arc<dyn RecognitionBackend>) -> Self {
        self.backend_status = backend.status();
        self.backend = backend;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Recognition workers per document (0 = one per core).
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Read at most `max_pages` pages (0 = all).
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn with_low_density_recognition(mut self, enabled: bool) -> Self {
        self.recognize_low_density = enabled;
        self
    }

    pub fn with_overrides(mut self, overrides: RecordOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn backend_status(&self) -> &OcrStatus {
        &self.backend_status
    }

    pub fn field_config(&self) -> &FieldConfig {
        self.parser.config()
    }

    /// Read every page's text, recognizing low-density pages when possible.
    pub fn acquire(&self, data: &[u8], cancel: &CancelFlag) -> Result<Document> {
        if cancel.is_cancelled() {
            return Err(SdsError::Cancelled);
        }

        let mut extractor = PdfExtractor::new();
        extractor.load(data)?;

        let mut pages = extractor.extract_pages()?;
        if self.max_pages > 0 && pages.len() > self.max_pages {
            debug!("Reading {} of {} pages", self.max_pages, pages.len());
            pages.truncate(self.max_pages);
        }

        let flagged: Vec<u32> = pages
            .iter()
            .filter(|p| p.needs_recognition)
            .map(|p| p.number)
            .collect();

        if flagged.is_empty() {
            return Ok(Document::new(pages));
        }

        if !self.recognize_low_density {
            debug!("{} low-text pages left as is; recognition disabled", flagged.len());
            return Ok(Document::new(pages));
        }

        if !self.backend_status.is_available() {
            warn!(
                "recognition unavailable ({}); keeping native text for {} low-text pages",
                self.backend_status.error.as_deref().unwrap_or("backend not ready"),
                flagged.len()
            );
            for page in pages.iter_mut().filter(|p| p.needs_recognition) {
                page.apply_recognition(RecognitionOutcome::Skipped(SkipReason::BackendUnavailable));
            }
            return Ok(Document::new(pages));
        }

        let mut outcomes = BTreeMap::new();
        let mut jobs = Vec::with_capacity(flagged.len());
        for &number in &flagged {
            match extractor.render_page(number) {
                Ok(image) => jobs.push(RecognitionJob {
                    page: number,
                    image,
                }),
                Err(e) => {
                    debug!("Page {} has no image to recognize: {}", number, e);
                    outcomes.insert(
                        number,
                        RecognitionOutcome::Skipped(SkipReason::NoPageImage(e.to_string())),
                    );
                }
            }
        }

        outcomes.extend(recognize_pages(
            Arc::clone(&self.backend),
            jobs,
            self.timeout,
            self.workers,
            cancel,
        ));

        if cancel.is_cancelled() {
            return Err(SdsError::Cancelled);
        }

        apply_outcomes(&mut pages, outcomes);
        Ok(Document::new(pages))
    }

    /// Extract a record from already-acquired text.
    pub fn extract_from_text(&self, text: &str, from_recognition: bool) -> (Record, ParsedSds) {
        let parsed = self.parser.parse(text, from_recognition);
        let record = assemble(&parsed, &self.overrides);
        (record, parsed)
    }

    /// Process an in-memory PDF.
    pub fn process_bytes(&self, data: &[u8], cancel: &CancelFlag) -> Result<Extraction> {
        let start = Instant::now();
        let document = self.acquire(data, cancel)?;

        let from_recognition = document.includes_recognized_text();
        let (record, parsed) = self.extract_from_text(&document.merged_text(), from_recognition);
        let mut provenance = self.provenance(&document, start.elapsed());
        provenance.document_hash = document_hash(data);

        info!(
            "Extracted record from {} pages ({} recognized) in {}ms",
            provenance.page_count,
            provenance.recognized_pages.len(),
            provenance.processing_time_ms
        );

        Ok(Extraction {
            record,
            parsed,
            provenance,
        })
    }

    /// Process a PDF on disk. Never fails: errors become a failed outcome.
    pub fn process_path(&self, path: &Path, cancel: &CancelFlag) -> DocumentOutcome {
        let source = path.display().to_string();
        let result = std::fs::read(path)
            .map_err(|source| {
                SdsError::from(DocumentReadError::Open {
                    path: path.display().to_string(),
                    source,
                })
            })
            .and_then(|data| self.process_bytes(&data, cancel));

        match result {
            Ok(extraction) => DocumentOutcome::ok(source, extraction),
            Err(SdsError::Cancelled) => {
                debug!("Cancelled before {} finished", source);
                DocumentOutcome::cancelled(source)
            }
            Err(e) => {
                warn!("Failed to process {}: {}", source, e);
                DocumentOutcome::failed(source, e.to_string())
            }
        }
    }

    fn provenance(&self, document: &Document, elapsed: Duration) -> Provenance {
        let pages = document.pages();
        let mut recognized_pages = Vec::new();
        let mut skipped_pages = BTreeMap::new();
        for page in pages {
            match &page.recognition {
                Some(RecognitionOutcome::Recognized(_)) => recognized_pages.push(page.number),
                Some(RecognitionOutcome::Skipped(reason)) => {
                    skipped_pages.insert(page.number, reason.clone());
                }
                None => {}
            }
        }

        Provenance {
            document_hash: String::new(),
            page_count: document.page_count(),
            pdf_type: (!pages.is_empty()).then(|| PdfType::classify(pages)),
            ocr_backend: self.backend.name().to_string(),
            ocr_pages: document.low_density_pages(),
            recognized_pages,
            skipped_pages,
            from_recognition: document.includes_recognized_text(),
            processing_time_ms: elapsed.as_millis() as u64,
        }
    }
}

/// Hex SHA-256 fingerprint of a document's bytes.
pub fn document_hash(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

fn apply_outcomes(pages: &mut [Page], mut outcomes: BTreeMap<u32, RecognitionOutcome>) {
    for page in pages.iter_mut() {
        if let Some(outcome) = outcomes.remove(&page.number) {
            page.apply_recognition(outcome);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OcrError;
    use crate::models::record::{Column, COLUMN_COUNT};
    use crate::ocr::{PageDeadline, UnavailableBackend};
    use crate::test_support::{build_pdf, build_scanned_pdf};
    use image::DynamicImage;
    use pretty_assertions::assert_eq;

    struct FixedBackend(&'static str);

    impl RecognitionBackend for FixedBackend {
        fn name(&self) -> &str {
            "fixed"
        }

        fn status(&self) -> OcrStatus {
            OcrStatus {
                backend: "fixed".to_string(),
                importable: true,
                executable_found: true,
                version: None,
                error: None,
            }
        }

        fn recognize(
            &self,
            _image: &DynamicImage,
            _deadline: &PageDeadline,
        ) -> std::result::Result<String, OcrError> {
            Ok(self.0.to_string())
        }
    }

    fn pipeline(backend: Arc<dyn RecognitionBackend>) -> SdsPipeline {
        SdsPipeline::new(Arc::new(FieldConfig::builtin().unwrap()), backend)
            .with_timeout(Duration::from_secs(5))
    }

    fn no_backend() -> SdsPipeline {
        pipeline(Arc::new(UnavailableBackend::disabled()))
    }

    #[test]
    fn test_text_pdf_to_record() {
        let data = build_pdf(&[
            &[
                "Product Name: Acetone",
                "Manufacturer/Supplier: Acme Chemicals Pty Ltd",
                "Issue Date: 12/04/2023",
            ],
            &[
                "SECTION 2: Hazards identification",
                "Signal word: Danger",
                "H225 Highly flammable liquid and vapour.",
            ],
        ]);
        let extraction = no_backend().process_bytes(&data, &CancelFlag::new()).unwrap();
        let record = &extraction.record;

        assert!(record.get(Column::ProductName).contains("Acetone"));
        assert!(record.get(Column::Vendor).contains("Acme Chemicals Pty Ltd"));
        assert_eq!(record.get(Column::IssueDate), "12/04/2023");
        assert!(record.get(Column::Description).contains("H225"));
        assert_eq!(extraction.provenance.page_count, 2);
        assert_eq!(extraction.provenance.pdf_type, Some(PdfType::Text));
        assert!(!extraction.provenance.from_recognition);
    }

    #[test]
    fn test_sparse_page_without_backend_keeps_text() {
        let data = build_pdf(&[&["Page 2 of"]]);
        let document = no_backend().acquire(&data, &CancelFlag::new()).unwrap();
        let page = &document.pages()[0];

        assert!(page.needs_recognition);
        assert!(page.text.contains("Page 2 of"));
        assert_eq!(
            page.recognition,
            Some(RecognitionOutcome::Skipped(SkipReason::BackendUnavailable))
        );
        assert!(document.merged_text().contains("Page 2 of"));
    }

    #[test]
    fn test_recognized_text_is_appended() {
        let data = build_scanned_pdf(&[&["Scan"]]);
        let extraction = pipeline(Arc::new(FixedBackend("Product Name: Sodium Hydroxide")))
            .process_bytes(&data, &CancelFlag::new())
            .unwrap();

        assert_eq!(extraction.record.get(Column::ProductName), "Sodium Hydroxide");
        assert_eq!(extraction.provenance.recognized_pages, vec![1]);
        assert!(extraction.provenance.from_recognition);
        assert!(
            extraction
                .parsed
                .fields
                .values()
                .all(|r| r.from_recognition)
        );
    }

    #[test]
    fn test_page_without_image_is_skipped() {
        let data = build_pdf(&[&["Scan"]]);
        let extraction = pipeline(Arc::new(FixedBackend("ignored")))
            .process_bytes(&data, &CancelFlag::new())
            .unwrap();
        assert!(matches!(
            extraction.provenance.skipped_pages.get(&1),
            Some(SkipReason::NoPageImage(_))
        ));
        assert!(extraction.provenance.recognized_pages.is_empty());
    }

    #[test]
    fn test_dense_pages_skip_recognition() {
        let data = build_scanned_pdf(&[&["Product Name: Isopropyl Alcohol 99 percent"]]);
        let extraction = pipeline(Arc::new(FixedBackend("Product Name: Wrong")))
            .process_bytes(&data, &CancelFlag::new())
            .unwrap();
        assert!(extraction.provenance.ocr_pages.is_empty());
        assert!(extraction.record.get(Column::ProductName).contains("Isopropyl"));
    }

    #[test]
    fn test_cancelled_document_fails() {
        let cancel = CancelFlag::new();
        cancel.cancel();
        let err = no_backend()
            .process_bytes(&build_pdf(&[&["x"]]), &cancel)
            .unwrap_err();
        assert!(matches!(err, SdsError::Cancelled));
    }

    #[test]
    fn test_unreadable_file_gives_failed_outcome() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"not a pdf").unwrap();

        let outcome = no_backend().process_path(&path, &CancelFlag::new());
        assert!(!outcome.is_ok());
        assert_eq!(outcome.record.to_row().len(), COLUMN_COUNT);
        assert!(outcome.record.get(Column::Comments).starts_with("Extraction failed:"));
        assert!(outcome.error.is_some());

        let missing = no_backend().process_path(&dir.path().join("missing.pdf"), &CancelFlag::new());
        assert_eq!(missing.status, OutcomeStatus::Failed);
    }

    #[test]
    fn test_invalid_patterns_are_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let patterns = dir.path().join("patterns.json");
        std::fs::write(&patterns, r#"{ "vendor": ["(unclosed"] }"#).unwrap();

        let mut config = SdsConfig::default();
        config.extraction.patterns_path = Some(patterns);
        let err = SdsPipeline::from_config(&config).err().unwrap();
        assert!(matches!(err, SdsError::Config(_)));
    }

    #[test]
    fn test_overrides_reach_record() {
        let (record, _) = no_backend()
            .with_overrides(RecordOverrides::new(Some("moderate".into()), Some("likely".into())))
            .extract_from_text("Product Name: Acetone", false);
        assert_eq!(record.get(Column::RiskRating), "High (12)");
    }

    #[test]
    fn test_document_hash_fingerprints_bytes() {
        let data = build_pdf(&[&["Product Name: Acetone"]]);
        let extraction = no_backend().process_bytes(&data, &CancelFlag::new()).unwrap();

        assert_eq!(extraction.provenance.document_hash, document_hash(&data));
        assert_eq!(extraction.provenance.document_hash.len(), 64);
        assert_eq!(
            document_hash(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_ne!(document_hash(&data), document_hash(b"other"));
    }

    #[test]
    fn test_cancelled_path_is_not_a_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("acetone.pdf");
        std::fs::write(&path, build_pdf(&[&["Product Name: Acetone"]])).unwrap();

        let cancel = CancelFlag::new();
        cancel.cancel();
        let outcome = no_backend().process_path(&path, &cancel);
        assert!(outcome.is_cancelled());
        assert!(!outcome.is_ok());
        assert_eq!(outcome.status, OutcomeStatus::Cancelled);
        assert_eq!(outcome.document_hash(), None);
    }
}
