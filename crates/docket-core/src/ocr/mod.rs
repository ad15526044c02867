//! OCR adapter over external recognition engines.

mod tesseract;
mod tsv;

pub use tesseract::TesseractEngine;
pub use tsv::parse_tsv;

use std::path::Path;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{DocketError, InputError, OcrError};
use crate::models::config::OcrConfig;
use crate::models::document::DocumentFile;

/// Axis-aligned box in image pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

/// One recognized string in reading order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    /// Recognized text; empty for structural or low-confidence rows.
    pub text: String,

    /// Position on the image, when the engine reports one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bbox: Option<BoundingBox>,

    /// Engine confidence (0.0 - 100.0).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

impl Token {
    /// A token with text only.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bbox: None,
            confidence: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

impl AsRef<str> for Token {
    fn as_ref(&self) -> &str {
        &self.text
    }
}

/// Trait for engines that turn an image file into tokens.
pub trait OcrEngine {
    /// Short engine name for logs.
    fn name(&self) -> &str;

    /// Recognize `image`, returning every row the engine reports, in order.
    fn recognize(&self, image: &Path) -> Result<Vec<Token>, OcrError>;
}

impl<T: OcrEngine + ?Sized> OcrEngine for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn recognize(&self, image: &Path) -> Result<Vec<Token>, OcrError> {
        (**self).recognize(image)
    }
}

/// Result of recognizing one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrResult {
    /// Tokens in engine reading order.
    pub tokens: Vec<Token>,

    /// Processing time in milliseconds.
    pub processing_time_ms: u64,
}

impl OcrResult {
    /// Token texts, borrowed.
    pub fn texts(&self) -> Vec<&str> {
        self.tokens.iter().map(|t| t.text.as_str()).collect()
    }
}

/// Applies an [`OcrEngine`] to raster documents.
pub struct OcrAdapter<E: OcrEngine = TesseractEngine> {
    engine: E,
}

impl<E: OcrEngine> OcrAdapter<E> {
    pub fn new(engine: E) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Recognize a raster document. Empty output is a valid, empty result.
    pub fn recognize(&self, doc: &DocumentFile) -> Result<OcrResult, DocketError> {
        if !doc.doc_type().is_raster() {
            return Err(InputError::WrongType {
                stage: "ocr",
                doc_type: doc.doc_type().to_string(),
            }
            .into());
        }

        let start = Instant::now();
        let tokens = self.engine.recognize(doc.path())?;
        let processing_time_ms = start.elapsed().as_millis() as u64;

        debug!(
            "{} returned {} rows ({} non-empty)",
            self.engine.name(),
            tokens.len(),
            tokens.iter().filter(|t| !t.is_empty()).count()
        );
        info!("Recognized {} in {}ms", doc.name(), processing_time_ms);

        Ok(OcrResult {
            tokens,
            processing_time_ms,
        })
    }
}

impl OcrAdapter<TesseractEngine> {
    /// Create a Tesseract-backed adapter from configuration.
    pub fn from_config(config: &OcrConfig) -> Self {
        Self::new(TesseractEngine::from_config(config))
    }

    /// Read a raster document as one line of plain text.
    pub fn recognize_line(&self, doc: &DocumentFile) -> Result<String, DocketError> {
        if !doc.doc_type().is_raster() {
            return Err(InputError::WrongType {
                stage: "ocr",
                doc_type: doc.doc_type().to_string(),
            }
            .into());
        }

        let line = self.engine.recognize_line(doc.path())?;
        info!("Recognized line of {}: {} chars", doc.name(), line.chars().count());
        Ok(line)
    }
}
