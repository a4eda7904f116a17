//! Per-page PDF text and page image extraction using lopdf and pdf-extract.

use std::path::Path;

use image::{DynamicImage, ImageBuffer, Rgba};
use lopdf::{Document, Object, ObjectId};
use tracing::{debug, trace, warn};

use super::{PdfProcessor, Result};
use crate::error::DocumentReadError;
use crate::models::document::Page;

/// PDF content extractor using lopdf.
pub struct PdfExtractor {
    document: Option<Document>,
    raw_data: Vec<u8>,
}

impl PdfExtractor {
    /// Create a new PDF extractor.
    pub fn new() -> Self {
        Self {
            document: None,
            raw_data: Vec::new(),
        }
    }

    /// Open and load a PDF file.
    pub fn open(path: &Path) -> Result<Self> {
        let data = std::fs::read(path).map_err(|source| DocumentReadError::Open {
            path: path.display().to_string(),
            source,
        })?;
        let mut extractor = Self::new();
        extractor.load(&data)?;
        Ok(extractor)
    }

    fn document(&self) -> Result<&Document> {
        self.document
            .as_ref()
            .ok_or_else(|| DocumentReadError::Parse("No document loaded".to_string()))
    }

    /// Page texts from the layout-aware extractor, if it agrees on the page count.
    fn layout_page_texts(&self, expected: usize) -> Option<Vec<String>> {
        // pdf-extract panics on some malformed content streams
        let data = &self.raw_data;
        let outcome =
            std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem_by_pages(data));

        match outcome {
            Ok(Ok(pages)) if pages.len() == expected => Some(pages),
            Ok(Ok(pages)) => {
                debug!(
                    "pdf-extract returned {} pages, expected {}; using lopdf",
                    pages.len(),
                    expected
                );
                None
            }
            Ok(Err(e)) => {
                debug!("pdf-extract failed: {}; using lopdf", e);
                None
            }
            Err(_) => {
                warn!("pdf-extract panicked; using lopdf text extraction");
                None
            }
        }
    }

    /// Page texts from lopdf's content stream walker.
    fn object_page_texts(&self, doc: &Document) -> Vec<String> {
        doc.get_pages()
            .keys()
            .map(|&number| {
                doc.extract_text(&[number]).unwrap_or_else(|e| {
                    debug!("lopdf could not extract text from page {}: {}", number, e);
                    String::new()
                })
            })
            .collect()
    }

    fn try_extract_image_from_object(&self, doc: &Document, obj: &Object) -> Option<DynamicImage> {
        let Object::Stream(stream) = obj else {
            return None;
        };
        let dict = &stream.dict;

        let subtype = dict.get(b"Subtype").ok()?;
        if subtype.as_name().ok()? != b"Image" {
            return None;
        }

        let width = dict.get(b"Width").ok()?.as_i64().ok()? as u32;
        let height = dict.get(b"Height").ok()?.as_i64().ok()? as u32;

        trace!("Found image object: {}x{}", width, height);

        if let Ok(filter) = dict.get(b"Filter") {
            let filter_name = match filter {
                Object::Name(name) => Some(name.as_slice()),
                Object::Array(arr) => arr.first().and_then(|o| o.as_name().ok()),
                _ => None,
            };

            match filter_name {
                Some(b"DCTDecode") => {
                    return image::load_from_memory_with_format(
                        &stream.content,
                        image::ImageFormat::Jpeg,
                    )
                    .ok();
                }
                Some(b"JPXDecode") | Some(b"CCITTFaxDecode") | Some(b"JBIG2Decode") => {
                    trace!("Unsupported scan image filter");
                    return None;
                }
                _ => {}
            }
        }

        let data = stream
            .decompressed_content()
            .unwrap_or_else(|_| stream.content.clone());

        let color_space = dict
            .get(b"ColorSpace")
            .ok()
            .and_then(|o| match o {
                Object::Name(name) => Some(name.as_slice()),
                Object::Array(arr) => arr.first().and_then(|o| o.as_name().ok()),
                Object::Reference(r) => doc.get_object(*r).ok().and_then(|o| o.as_name().ok()),
                _ => None,
            })
            .unwrap_or(b"DeviceRGB");

        let bits = dict
            .get(b"BitsPerComponent")
            .ok()
            .and_then(|o| o.as_i64().ok())
            .unwrap_or(8);

        if bits != 8 {
            trace!("Unsupported bits per component: {}", bits);
            return None;
        }

        raw_to_image(&data, width, height, color_space)
    }

    /// Resources dictionary of a page, following inheritance up the page tree.
    fn page_resources(&self, doc: &Document, node_id: ObjectId) -> Option<lopdf::Dictionary> {
        let Object::Dictionary(dict) = doc.get_object(node_id).ok()? else {
            return None;
        };

        if let Ok(resources) = dict.get(b"Resources") {
            if let Ok((_, Object::Dictionary(res_dict))) = doc.dereference(resources) {
                return Some(res_dict.clone());
            }
        }

        match dict.get(b"Parent") {
            Ok(Object::Reference(parent_id)) => self.page_resources(doc, *parent_id),
            _ => None,
        }
    }
}

fn raw_to_image(data: &[u8], width: u32, height: u32, color_space: &[u8]) -> Option<DynamicImage> {
    let pixels = (width as usize) * (height as usize);

    let rgba: Vec<u8> = match color_space {
        b"DeviceRGB" | b"RGB" if data.len() >= pixels * 3 => data[..pixels * 3]
            .chunks_exact(3)
            .flat_map(|c| [c[0], c[1], c[2], 255])
            .collect(),
        b"DeviceGray" | b"G" if data.len() >= pixels => data[..pixels]
            .iter()
            .flat_map(|&g| [g, g, g, 255])
            .collect(),
        _ => {
            trace!(
                "Could not decode image: colorspace={:?}, data_len={}",
                String::from_utf8_lossy(color_space),
                data.len()
            );
            return None;
        }
    };

    ImageBuffer::<Rgba<u8>, _>::from_raw(width, height, rgba).map(DynamicImage::ImageRgba8)
}

impl Default for PdfExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfProcessor for PdfExtractor {
    fn load(&mut self, data: &[u8]) -> Result<()> {
        let mut doc =
            Document::load_mem(data).map_err(|e| DocumentReadError::Parse(e.to_string()))?;

        if doc.is_encrypted() {
            if doc.decrypt("").is_err() {
                return Err(DocumentReadError::Encrypted);
            }
            debug!("Decrypted PDF with empty password");

            let mut decrypted_data = Vec::new();
            doc.save_to(&mut decrypted_data).map_err(|e| {
                DocumentReadError::Parse(format!("Failed to save decrypted PDF: {}", e))
            })?;
            self.raw_data = decrypted_data;
        } else {
            self.raw_data = data.to_vec();
        }

        let page_count = doc.get_pages().len();
        if page_count == 0 {
            return Err(DocumentReadError::NoPages);
        }

        debug!("Loaded PDF with {} pages", page_count);
        self.document = Some(doc);
        Ok(())
    }

    fn page_count(&self) -> u32 {
        self.document
            .as_ref()
            .map(|doc| doc.get_pages().len() as u32)
            .unwrap_or(0)
    }

    fn extract_pages(&self) -> Result<Vec<Page>> {
        let doc = self.document()?;
        let expected = doc.get_pages().len();

        let texts = self
            .layout_page_texts(expected)
            .unwrap_or_else(|| self.object_page_texts(doc));

        let pages: Vec<Page> = texts
            .into_iter()
            .enumerate()
            .map(|(i, text)| Page::new(i as u32 + 1, text))
            .collect();

        for page in &pages {
            trace!(
                "Page {}: {} chars, needs_recognition={}",
                page.number, page.char_count, page.needs_recognition
            );
        }

        Ok(pages)
    }

    fn render_page(&self, page: u32) -> Result<DynamicImage> {
        let doc = self.document()?;
        let pages = doc.get_pages();
        let page_id = pages.get(&page).ok_or(DocumentReadError::InvalidPage(page))?;

        let resources = self.page_resources(doc, *page_id);
        let xobjects = resources
            .as_ref()
            .and_then(|r| r.get(b"XObject").ok())
            .and_then(|x| match doc.dereference(x) {
                Ok((_, Object::Dictionary(d))) => Some(d.clone()),
                _ => None,
            });

        // Scanned pages carry one image per page; take the largest if there are several.
        let image = xobjects
            .iter()
            .flat_map(|dict| dict.iter())
            .filter_map(|(_, obj_ref)| doc.dereference(obj_ref).ok())
            .filter_map(|(_, obj)| self.try_extract_image_from_object(doc, obj))
            .max_by_key(|img| u64::from(img.width()) * u64::from(img.height()));

        image.ok_or_else(|| {
            DocumentReadError::ImageExtraction(format!("no decodable image on page {}", page))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::build_pdf;

    #[test]
    fn test_pdf_extractor_new() {
        let extractor = PdfExtractor::new();
        assert!(extractor.document.is_none());
        assert_eq!(extractor.page_count(), 0);
    }

    #[test]
    fn test_garbage_is_a_document_error() {
        let mut extractor = PdfExtractor::new();
        let err = extractor.load(b"definitely not a pdf").unwrap_err();
        assert!(matches!(err, DocumentReadError::Parse(_)));
    }

    #[test]
    fn test_missing_file_is_a_document_error() {
        let err = PdfExtractor::open(Path::new("/nonexistent/sds.pdf")).err().unwrap();
        assert!(matches!(err, DocumentReadError::Open { .. }));
    }

    #[test]
    fn test_pages_in_order() {
        let data = build_pdf(&[
            &["Product Name: Solvent Blue 42", "Company Name: ExampleCorp Pty Ltd"],
            &["SECTION 14: TRANSPORT INFORMATION", "Packing Group: II"],
        ]);
        let mut extractor = PdfExtractor::new();
        extractor.load(&data).unwrap();
        assert_eq!(extractor.page_count(), 2);

        let pages = extractor.extract_pages().unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].number, 1);
        assert!(pages[0].text.contains("Solvent Blue 42"));
        assert!(pages[1].text.contains("Packing Group"));
        assert!(!pages[0].needs_recognition);
    }

    #[test]
    fn test_sparse_page_is_flagged() {
        let data = build_pdf(&[&["Page 2 of 9"]]);
        let mut extractor = PdfExtractor::new();
        extractor.load(&data).unwrap();
        let pages = extractor.extract_pages().unwrap();
        assert!(pages[0].needs_recognition);
    }

    #[test]
    fn test_render_page_without_image() {
        let data = build_pdf(&[&["Text only"]]);
        let mut extractor = PdfExtractor::new();
        extractor.load(&data).unwrap();
        assert!(matches!(
            extractor.render_page(1),
            Err(DocumentReadError::ImageExtraction(_))
        ));
        assert!(matches!(
            extractor.render_page(7),
            Err(DocumentReadError::InvalidPage(7))
        ));
    }
}
