//! End-to-end processing of one document.

use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{DocketError, InputError};
use crate::extract::{ExtractionResult, KeywordExtractor};
use crate::models::config::{DocketConfig, OutputNaming};
use crate::models::document::{DocumentFile, DocumentType, RunId};
use crate::ocr::{OcrAdapter, OcrEngine, TesseractEngine, Token};
use crate::pdf::{
    ClipRect, FIRST_PAGE, PageRenderer, PdfDocument, PopplerRenderer, Rasterizer, tokenize_text,
};
use crate::table::TableCodec;

/// Where the tokens of a run came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenSource {
    /// OCR of the (rasterized) image.
    Ocr,
    /// Embedded text of the first PDF page.
    TextLayer,
    /// Contents of a plain-text document.
    PlainText,
}

impl TokenSource {
    pub fn as_str(self) -> &'static str {
        match self {
            TokenSource::Ocr => "ocr",
            TokenSource::TextLayer => "text_layer",
            TokenSource::PlainText => "plain_text",
        }
    }
}

/// Report of one pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutput {
    /// The processed document.
    pub source: DocumentFile,

    /// Rasterized first page, for PDFs that went through OCR.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raster: Option<DocumentFile>,

    pub token_source: TokenSource,

    /// Number of tokens scanned, empty rows included.
    pub token_count: usize,

    /// Extracted keyword values.
    pub data: ExtractionResult,

    /// Table the values were written to.
    pub table: DocumentFile,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<RunId>,

    pub processing_time_ms: u64,
}

/// One configured instance of every stage.
pub struct Pipeline<R: PageRenderer = PopplerRenderer, E: OcrEngine = TesseractEngine> {
    rasterizer: Rasterizer<R>,
    ocr: OcrAdapter<E>,
    extractor: KeywordExtractor,
    codec: TableCodec,
    clip: ClipRect,
    naming: OutputNaming,
    prefer_text_layer: bool,
    min_text_length: usize,
}

impl Pipeline {
    /// Pipeline backed by `pdftoppm` and `tesseract`.
    pub fn from_config(config: &DocketConfig) -> Result<Self, DocketError> {
        Self::with_engines(
            PopplerRenderer::from_config(&config.pdf),
            TesseractEngine::from_config(&config.ocr),
            config,
        )
    }
}

impl<R: PageRenderer, E: OcrEngine> Pipeline<R, E> {
    /// Pipeline with explicit engines and every other setting from `config`.
    pub fn with_engines(
        renderer: R,
        engine: E,
        config: &DocketConfig,
    ) -> Result<Self, DocketError> {
        Ok(Self {
            rasterizer: Rasterizer::new(renderer).with_scale(config.pdf.scale),
            ocr: OcrAdapter::new(engine),
            extractor: KeywordExtractor::from_config(&config.extraction)?,
            codec: TableCodec::from_config(&config.output),
            clip: config.pdf.clip,
            naming: config.output.naming,
            prefer_text_layer: config.pdf.prefer_text_layer,
            min_text_length: config.pdf.min_text_length,
        })
    }

    pub fn rasterizer(&self) -> &Rasterizer<R> {
        &self.rasterizer
    }

    pub fn ocr(&self) -> &OcrAdapter<E> {
        &self.ocr
    }

    pub fn codec(&self) -> &TableCodec {
        &self.codec
    }

    /// Run every stage for `doc` and write its table.
    pub fn run(&self, doc: &DocumentFile) -> Result<PipelineOutput, DocketError> {
        let start = Instant::now();
        doc.ensure_uploadable()?;

        let run_id = match self.naming {
            OutputNaming::SourceStem => None,
            OutputNaming::PerRun => Some(RunId::generate()),
        };
        info!("Processing {} ({})", doc.name(), doc.doc_type());

        let (tokens, token_source, raster) = match doc.doc_type() {
            DocumentType::Txt => {
                let text = std::fs::read_to_string(doc.path())?;
                (tokenize_text(&text), TokenSource::PlainText, None)
            }
            DocumentType::Pdf => match self.text_layer_tokens(doc) {
                Some(tokens) => (tokens, TokenSource::TextLayer, None),
                None => {
                    let raster = self
                        .rasterizer
                        .rasterize_for_run(doc, self.clip, run_id.as_ref())?;
                    let tokens = self.ocr.recognize(&raster)?.tokens;
                    (tokens, TokenSource::Ocr, Some(raster))
                }
            },
            t if t.is_raster() => (self.ocr.recognize(doc)?.tokens, TokenSource::Ocr, None),
            other => {
                return Err(InputError::WrongType {
                    stage: "pipeline",
                    doc_type: other.to_string(),
                }
                .into());
            }
        };
        debug!("{} tokens from {:?}", tokens.len(), token_source);

        let data = self.extractor.extract(&tokens)?;
        let table = self.codec.write_for_run(&data, doc, run_id.as_ref())?;

        let processing_time_ms = start.elapsed().as_millis() as u64;
        info!(
            "Extracted {} values from {} in {}ms",
            data.len(),
            doc.name(),
            processing_time_ms
        );

        Ok(PipelineOutput {
            source: doc.clone(),
            raster,
            token_source,
            token_count: tokens.len(),
            data,
            table,
            run_id,
            processing_time_ms,
        })
    }

    /// Tokens from the embedded text when enabled and long enough.
    fn text_layer_tokens(&self, doc: &DocumentFile) -> Option<Vec<Token>> {
        if !self.prefer_text_layer {
            return None;
        }

        let tokens = match PdfDocument::open(doc.path())
            .and_then(|pdf| pdf.text_tokens(FIRST_PAGE))
        {
            Ok(tokens) => tokens,
            Err(e) => {
                warn!(
                    "Text layer of {} unreadable, falling back to OCR: {}",
                    doc.name(),
                    e
                );
                return None;
            }
        };

        // Whitespace does not count towards the length.
        let length: usize = tokens.iter().map(|t| t.text.chars().count()).sum();
        if length < self.min_text_length {
            debug!(
                "Text layer has {} chars (< {}), using OCR",
                length, self.min_text_length
            );
            return None;
        }
        Some(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OcrError;
    use crate::test_support::{BrokenEngine, FakeEngine, FakeRenderer, create_test_pdf};
    use pretty_assertions::assert_eq;
    use std::path::Path;

    fn pipeline(
        tokens: Vec<&'static str>,
        config: &DocketConfig,
    ) -> Pipeline<FakeRenderer, FakeEngine> {
        Pipeline::with_engines(FakeRenderer::default(), FakeEngine::new(tokens), config).unwrap()
    }

    fn write_file(dir: &Path, name: &str, data: &[u8]) -> DocumentFile {
        let path = dir.join(name);
        std::fs::write(&path, data).unwrap();
        DocumentFile::open(&path).unwrap()
    }

    fn pairs(result: &ExtractionResult) -> Vec<(&str, &str)> {
        result.iter().collect()
    }

    #[test]
    fn test_pdf_goes_through_raster_and_ocr() {
        let dir = tempfile::tempdir().unwrap();
        let doc = write_file(dir.path(), "invoice.pdf", &create_test_pdf(&["scan"]));
        let pipeline = pipeline(
            vec!["Invoice", "no.", "Invoice no.", "4521", "Total CHF", "120.50"],
            &DocketConfig::default(),
        );

        let output = pipeline.run(&doc).unwrap();

        assert_eq!(output.token_source, TokenSource::Ocr);
        assert_eq!(output.token_count, 6);
        assert_eq!(
            pairs(&output.data),
            vec![("Invoice no.", "4521"), ("Total CHF", "120.50")]
        );
        assert_eq!(output.raster.unwrap().path(), doc.directory().join("invoice.png"));
        assert_eq!(output.table.path(), doc.directory().join("invoice.csv"));
        assert_eq!(pipeline.rasterizer().renderer().calls.get(), 1);
        assert_eq!(pipeline.ocr().engine().calls.get(), 1);
    }

    #[test]
    fn test_image_skips_rasterizer() {
        let dir = tempfile::tempdir().unwrap();
        let mut png = Vec::new();
        image::DynamicImage::ImageLuma8(image::GrayImage::new(4, 4))
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();
        let doc = write_file(dir.path(), "receipt.png", &png);
        let pipeline = pipeline(vec!["Discount", "5%"], &DocketConfig::default());

        let output = pipeline.run(&doc).unwrap();

        assert!(output.raster.is_none());
        assert_eq!(pairs(&output.data), vec![("Discount", "5%")]);
        assert_eq!(pipeline.rasterizer().renderer().calls.get(), 0);

        let table = pipeline.codec().read(&output.table).unwrap();
        assert_eq!(table.get("Extracted File Data"), Some(""));
        assert_eq!(table.get("Discount"), Some("5%"));
    }

    #[test]
    fn test_plain_text_is_tokenized_directly() {
        let dir = tempfile::tempdir().unwrap();
        let doc = write_file(dir.path(), "notes.txt", b"Discount\n5%\nTotal");
        let pipeline = pipeline(vec![], &DocketConfig::default());

        let output = pipeline.run(&doc).unwrap();

        assert_eq!(output.token_source, TokenSource::PlainText);
        assert_eq!(pairs(&output.data), vec![("Discount", "5%")]);
        assert_eq!(pipeline.ocr().engine().calls.get(), 0);
    }

    #[test]
    fn test_text_layer_used_when_long_enough() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = create_test_pdf(&["Discount 3% on orders"]);
        let doc = write_file(dir.path(), "digital.pdf", &pdf);
        let mut config = DocketConfig::default();
        config.pdf.prefer_text_layer = true;
        config.pdf.min_text_length = 5;
        let pipeline = pipeline(vec!["unused"], &config);

        let output = pipeline.run(&doc).unwrap();

        assert_eq!(output.token_source, TokenSource::TextLayer);
        assert_eq!(output.data.get("Discount"), Some("3%"));
        assert_eq!(pipeline.rasterizer().renderer().calls.get(), 0);
    }

    #[test]
    fn test_short_text_layer_falls_back_to_ocr() {
        let dir = tempfile::tempdir().unwrap();
        let doc = write_file(dir.path(), "thin.pdf", &create_test_pdf(&["x"]));
        let mut config = DocketConfig::default();
        config.pdf.prefer_text_layer = true;
        let pipeline = pipeline(vec!["Discount", "1%"], &config);

        let output = pipeline.run(&doc).unwrap();
        assert_eq!(output.token_source, TokenSource::Ocr);
        assert_eq!(output.data.get("Discount"), Some("1%"));
    }

    #[test]
    fn test_per_run_naming() {
        let dir = tempfile::tempdir().unwrap();
        let doc = write_file(dir.path(), "invoice.pdf", &create_test_pdf(&["scan"]));
        let mut config = DocketConfig::default();
        config.output.naming = OutputNaming::PerRun;
        let pipeline = pipeline(vec![], &config);

        let first = pipeline.run(&doc).unwrap();
        let second = pipeline.run(&doc).unwrap();

        let run = first.run_id.clone().unwrap();
        assert_eq!(
            first.table.path(),
            doc.directory().join(format!("invoice-{run}.csv"))
        );
        assert_eq!(first.table.name(), "invoice");
        assert_ne!(first.table.path(), second.table.path());
    }

    #[test]
    fn test_empty_ocr_output_yields_header_only_table() {
        let dir = tempfile::tempdir().unwrap();
        let doc = write_file(dir.path(), "blank.pdf", &create_test_pdf(&[""]));
        let pipeline = pipeline(vec![], &DocketConfig::default());

        let output = pipeline.run(&doc).unwrap();
        assert!(output.data.is_empty());
        assert_eq!(
            std::fs::read_to_string(output.table.path()).unwrap(),
            "Extracted File Data\n"
        );
    }

    #[test]
    fn test_engine_failure_stops_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let doc = write_file(dir.path(), "invoice.pdf", &create_test_pdf(&["scan"]));
        let pipeline =
            Pipeline::with_engines(FakeRenderer::default(), BrokenEngine, &DocketConfig::default())
                .unwrap();

        let err = pipeline.run(&doc).unwrap_err();
        assert!(matches!(err, DocketError::Ocr(OcrError::MalformedOutput(_))));
        assert!(!doc.directory().join("invoice.csv").exists());
    }

    #[test]
    fn test_word_documents_are_rejected() {
        let doc = DocumentFile::new("letter", DocumentType::Doc, "/tmp/letter.doc");
        let err = pipeline(vec![], &DocketConfig::default()).run(&doc).unwrap_err();
        assert!(matches!(
            err,
            DocketError::Input(InputError::WrongType { stage: "pipeline", .. })
        ));
    }

    #[test]
    fn test_tables_are_not_uploadable() {
        let doc = DocumentFile::new("data", DocumentType::Csv, "/tmp/data.csv");
        let err = pipeline(vec![], &DocketConfig::default()).run(&doc).unwrap_err();
        assert!(matches!(err, DocketError::Input(InputError::UnsupportedType(_))));
    }
}
