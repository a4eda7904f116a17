//! Document and page model for a single Safety Data Sheet.

use serde::Serialize;

use crate::ocr::RecognitionOutcome;

/// Pages with fewer trimmed characters than this are candidates for OCR.
pub const LOW_DENSITY_THRESHOLD: usize = 30;

/// Whether a page with `char_count` characters of native text needs recognition.
pub fn needs_recognition(char_count: usize) -> bool {
    char_count < LOW_DENSITY_THRESHOLD
}

/// Count the characters of a page text layer, ignoring surrounding whitespace.
pub fn page_char_count(text: &str) -> usize {
    text.trim().chars().count()
}

/// A single page of a document.
#[derive(Debug, Clone, Serialize)]
pub struct Page {
    /// Page number (1-indexed).
    pub number: u32,
    /// Native text layer.
    pub text: String,
    /// Trimmed character count of the native text.
    pub char_count: usize,
    /// True when the native text is too sparse to trust.
    pub needs_recognition: bool,
    /// Text produced by OCR, if recognition ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recognized: Option<String>,
    /// What happened when recognition was attempted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recognition: Option<RecognitionOutcome>,
}

impl Page {
    /// Create a page from its native text layer.
    pub fn new(number: u32, text: impl Into<String>) -> Self {
        let text = text.into();
        let char_count = page_char_count(&text);
        Self {
            number,
            text,
            char_count,
            needs_recognition: needs_recognition(char_count),
            recognized: None,
            recognition: None,
        }
    }

    /// Record the outcome of a recognition attempt.
    ///
    /// Recognized text is kept alongside the native text, never in place of it.
    pub fn apply_recognition(&mut self, outcome: RecognitionOutcome) {
        if let RecognitionOutcome::Recognized(text) = &outcome {
            self.recognized = Some(text.clone());
        }
        self.recognition = Some(outcome);
    }

    /// Native text followed by any recognized text.
    pub fn merged_text(&self) -> String {
        match self.recognized.as_deref().map(str::trim) {
            Some(extra) if !extra.is_empty() => {
                let native = self.text.trim_end();
                if native.is_empty() {
                    extra.to_string()
                } else {
                    format!("{}\n{}", native, extra)
                }
            }
            _ => self.text.clone(),
        }
    }

    /// Whether recognized content contributed to this page.
    pub fn has_recognized_text(&self) -> bool {
        self.recognized
            .as_deref()
            .is_some_and(|t| !t.trim().is_empty())
    }
}

/// An ordered, immutable sequence of pages.
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    pages: Vec<Page>,
}

impl Document {
    /// Build a document; pages are sorted by number so merging is deterministic.
    pub fn new(mut pages: Vec<Page>) -> Self {
        pages.sort_by_key(|p| p.number);
        Self { pages }
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Whole-document text in page order.
    pub fn merged_text(&self) -> String {
        self.pages
            .iter()
            .map(Page::merged_text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Whether any page contributed recognized text.
    pub fn includes_recognized_text(&self) -> bool {
        self.pages.iter().any(Page::has_recognized_text)
    }

    /// Numbers of the pages flagged for recognition.
    pub fn low_density_pages(&self) -> Vec<u32> {
        self.pages
            .iter()
            .filter(|p| p.needs_recognition)
            .map(|p| p.number)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::SkipReason;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_threshold_boundary() {
        assert!(needs_recognition(0));
        assert!(needs_recognition(29));
        assert!(!needs_recognition(30));
        assert!(!needs_recognition(31));
    }

    #[test]
    fn test_page_counts_trimmed_characters() {
        let page = Page::new(1, "   0123456789   \n");
        assert_eq!(page.char_count, 10);
        assert!(page.needs_recognition);

        let page = Page::new(2, "a".repeat(30));
        assert!(!page.needs_recognition);
    }

    #[test]
    fn test_recognized_text_is_appended() {
        let mut page = Page::new(1, "Header only");
        page.apply_recognition(RecognitionOutcome::Recognized("Product Name: Solvent X".into()));
        assert_eq!(page.merged_text(), "Header only\nProduct Name: Solvent X");
        assert!(page.has_recognized_text());
    }

    #[test]
    fn test_skipped_recognition_keeps_native_text() {
        let mut page = Page::new(1, "0123456789");
        page.apply_recognition(RecognitionOutcome::Skipped(SkipReason::BackendUnavailable));
        assert_eq!(page.merged_text(), "0123456789");
        assert!(!page.has_recognized_text());
    }

    #[test]
    fn test_document_preserves_page_order() {
        let doc = Document::new(vec![
            Page::new(2, "second"),
            Page::new(1, "first"),
            Page::new(3, "third"),
        ]);
        assert_eq!(doc.merged_text(), "first\nsecond\nthird");
        assert_eq!(doc.low_density_pages(), vec![1, 2, 3]);
    }
}
