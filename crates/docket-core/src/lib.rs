//! Core library for keyword extraction from scanned business documents.
//!
//! This crate provides:
//! - Document typing by content sniffing
//! - First-page PDF rasterization through Poppler
//! - OCR through Tesseract
//! - Exact-match keyword/value extraction by token adjacency
//! - A small CSV table format for the extracted values

pub mod error;
pub mod extract;
pub mod models;
pub mod ocr;
pub mod pdf;
pub mod pipeline;
pub mod process;
pub mod storage;
pub mod table;

#[cfg(test)]
mod test_support;

pub use error::{DocketError, Result};
pub use extract::{ExtractionResult, KeywordExtractor, KeywordSet, TailPolicy};
pub use models::config::DocketConfig;
pub use models::document::{DocumentFile, DocumentType, RunId};
pub use ocr::{OcrAdapter, OcrEngine, OcrResult, TesseractEngine, Token};
pub use pdf::{ClipRect, PageRenderer, PdfDocument, PopplerRenderer, Rasterizer};
pub use pipeline::{Pipeline, PipelineOutput, TokenSource};
pub use table::TableCodec;
