//! PDF page text acquisition.

mod extractor;

pub use extractor::PdfExtractor;

use crate::error::DocumentReadError;
use crate::models::document::Page;
use image::DynamicImage;
use serde::Serialize;

/// How much of a document came from its native text layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PdfType {
    /// Every page has a usable text layer.
    Text,
    /// Every page is too sparse and needs recognition.
    Image,
    /// Some pages have text, some need recognition.
    Hybrid,
}

impl PdfType {
    /// Classify a document from its low-density flags.
    pub fn classify(pages: &[Page]) -> Self {
        let sparse = pages.iter().filter(|p| p.needs_recognition).count();
        match sparse {
            0 => PdfType::Text,
            n if n == pages.len() => PdfType::Image,
            _ => PdfType::Hybrid,
        }
    }
}

/// Result type for PDF operations.
pub type Result<T> = std::result::Result<T, DocumentReadError>;

/// Trait for sources of per-page text and page images.
pub trait PdfProcessor {
    /// Load a PDF from bytes.
    fn load(&mut self, data: &[u8]) -> Result<()>;

    /// Get the number of pages in the PDF.
    fn page_count(&self) -> u32;

    /// Extract the native text layer of every page, in page order.
    fn extract_pages(&self) -> Result<Vec<Page>>;

    /// Raster image of a page, for recognition.
    fn render_page(&self, page: u32) -> Result<DynamicImage>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        let dense = "x".repeat(40);
        assert_eq!(PdfType::classify(&[Page::new(1, dense.clone())]), PdfType::Text);
        assert_eq!(PdfType::classify(&[Page::new(1, "")]), PdfType::Image);
        assert_eq!(
            PdfType::classify(&[Page::new(1, dense), Page::new(2, "short")]),
            PdfType::Hybrid
        );
    }
}
