//! Fixtures shared by unit tests across modules.

use std::cell::Cell;
use std::path::Path;

use image::{DynamicImage, GrayImage, Luma};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, Stream, dictionary};

use crate::error::{OcrError, PdfError};
use crate::ocr::{OcrEngine, Token};
use crate::pdf::{PageRenderer, RenderRequest};

/// Build a PDF whose pages each show one line of text.
pub(crate) fn create_test_pdf(page_texts: &[&str]) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids = Vec::new();
    for text in page_texts {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![50.into(), 700.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id =
            doc.add_object(Stream::new(Dictionary::new(), content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(Object::Reference(page_id));
    }

    // MediaBox lives on the page tree root and is inherited by every page.
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_texts.len() as i64,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

/// Renderer that returns a white RGB canvas sized from the request.
#[derive(Default)]
pub(crate) struct FakeRenderer {
    pub calls: Cell<usize>,
    pub last: Cell<Option<RenderRequest>>,
}

impl PageRenderer for FakeRenderer {
    fn name(&self) -> &str {
        "fake-renderer"
    }

    fn render(&self, _pdf: &Path, request: &RenderRequest) -> Result<DynamicImage, PdfError> {
        self.calls.set(self.calls.get() + 1);
        self.last.set(Some(*request));
        let (_, _, width, height) = request.clip.to_pixels(request.scale);
        let gray = GrayImage::from_pixel(width.max(1), height.max(1), Luma([255u8]));
        Ok(DynamicImage::ImageRgb8(DynamicImage::ImageLuma8(gray).to_rgb8()))
    }
}

/// OCR engine that returns a fixed token list.
pub(crate) struct FakeEngine {
    pub tokens: Vec<&'static str>,
    pub calls: Cell<usize>,
}

impl FakeEngine {
    pub(crate) fn new(tokens: Vec<&'static str>) -> Self {
        Self {
            tokens,
            calls: Cell::new(0),
        }
    }
}

impl OcrEngine for FakeEngine {
    fn name(&self) -> &str {
        "fake-engine"
    }

    fn recognize(&self, _image: &Path) -> Result<Vec<Token>, OcrError> {
        self.calls.set(self.calls.get() + 1);
        Ok(self.tokens.iter().copied().map(Token::new).collect())
    }
}

/// OCR engine that always fails.
pub(crate) struct BrokenEngine;

impl OcrEngine for BrokenEngine {
    fn name(&self) -> &str {
        "broken-engine"
    }

    fn recognize(&self, _image: &Path) -> Result<Vec<Token>, OcrError> {
        Err(OcrError::MalformedOutput("garbage".to_string()))
    }
}
