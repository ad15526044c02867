//! PDF structure inspection and text-layer extraction using lopdf and pdf-extract.

use std::path::Path;

use lopdf::{Document, Object, ObjectId};
use tracing::{debug, trace};

use super::{ClipRect, Result};
use crate::error::PdfError;
use crate::ocr::Token;

/// Page dimensions in PDF points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

impl PageSize {
    /// Whether `clip` lies entirely on the page.
    pub fn contains(&self, clip: &ClipRect) -> bool {
        clip.x0 >= 0.0 && clip.y0 >= 0.0 && clip.x1 <= self.width && clip.y1 <= self.height
    }
}

/// A loaded PDF document.
pub struct PdfDocument {
    document: Document,
}

impl PdfDocument {
    /// Load a PDF from a file.
    pub fn open(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)
            .map_err(|e| PdfError::Parse(format!("{}: {}", path.display(), e)))?;
        Self::load(&data)
    }

    /// Load a PDF from bytes.
    pub fn load(data: &[u8]) -> Result<Self> {
        let mut doc = Document::load_mem(data).map_err(|e| PdfError::Parse(e.to_string()))?;

        // Handle PDFs with empty password encryption
        if doc.is_encrypted() {
            if doc.decrypt("").is_err() {
                return Err(PdfError::Encrypted);
            }
            debug!("Decrypted PDF with empty password");
        }

        let page_count = doc.get_pages().len();
        if page_count == 0 {
            return Err(PdfError::NoPages);
        }

        debug!("Loaded PDF with {} pages", page_count);
        Ok(Self { document: doc })
    }

    /// Number of pages.
    pub fn page_count(&self) -> u32 {
        self.document.get_pages().len() as u32
    }

    /// Size of a page (zero-based index) from its MediaBox, following inheritance.
    pub fn page_size(&self, page_index: u32) -> Option<PageSize> {
        let pages = self.document.get_pages();
        let page_id = pages.get(&(page_index + 1))?;
        let media_box = self.inherited_attribute(*page_id, b"MediaBox")?;

        let values = media_box
            .as_array()
            .ok()?
            .iter()
            .map(|o| self.number(o))
            .collect::<Option<Vec<f32>>>()?;

        if values.len() != 4 {
            trace!("MediaBox has {} entries", values.len());
            return None;
        }

        Some(PageSize {
            width: (values[2] - values[0]).abs(),
            height: (values[3] - values[1]).abs(),
        })
    }

    /// Extract the embedded text of one page (zero-based index).
    pub fn page_text(&self, page_index: u32) -> Result<String> {
        let page_count = self.page_count();
        if page_index >= page_count {
            return Err(PdfError::InvalidPage(page_index));
        }

        // Reduce a copy to the single page so text from other pages never leaks in.
        let mut single = self.document.clone();
        let others: Vec<u32> = (1..=page_count).filter(|p| *p != page_index + 1).collect();
        if !others.is_empty() {
            single.delete_pages(&others);
        }

        let mut data = Vec::new();
        single
            .save_to(&mut data)
            .map_err(|e| PdfError::TextExtraction(e.to_string()))?;

        let text = pdf_extract::extract_text_from_mem(&data)
            .map_err(|e| PdfError::TextExtraction(e.to_string()))?;
        debug!("Page {} text layer: {} chars", page_index, text.len());
        Ok(text)
    }

    /// Tokenize the embedded text of one page into whitespace-separated words.
    pub fn text_tokens(&self, page_index: u32) -> Result<Vec<Token>> {
        Ok(tokenize_text(&self.page_text(page_index)?))
    }

    fn inherited_attribute(&self, node_id: ObjectId, key: &[u8]) -> Option<&Object> {
        let node = self.document.get_object(node_id).ok()?;
        let dict = node.as_dict().ok()?;

        if let Ok(value) = dict.get(key) {
            return match value {
                Object::Reference(id) => self.document.get_object(*id).ok(),
                other => Some(other),
            };
        }

        // Continue up the page tree
        match dict.get(b"Parent") {
            Ok(Object::Reference(parent_id)) => self.inherited_attribute(*parent_id, key),
            _ => None,
        }
    }

    fn number(&self, obj: &Object) -> Option<f32> {
        match obj {
            Object::Integer(i) => Some(*i as f32),
            Object::Real(r) => Some(*r),
            Object::Reference(id) => self
                .document
                .get_object(*id)
                .ok()
                .and_then(|o| self.number(o)),
            _ => None,
        }
    }
}

/// Split plain text into word tokens in reading order.
pub(crate) fn tokenize_text(text: &str) -> Vec<Token> {
    text.split_whitespace().map(Token::new).collect()
}
