//! Configuration structures for the extraction pipeline.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::extract::TailPolicy;
use crate::pdf::ClipRect;

/// Labels recognized when no keyword list is configured.
pub const DEFAULT_KEYWORDS: [&str; 5] = [
    "Invoice no.",
    "Payment date:",
    "SPECIAL DISCOUNT",
    "Discount",
    "Total CHF",
];

/// Header sentinel written as the first row of every table.
pub const DEFAULT_TABLE_HEADER: &str = "Extracted File Data";

/// Main configuration for the docket pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DocketConfig {
    /// OCR engine configuration.
    pub ocr: OcrConfig,

    /// PDF rendering configuration.
    pub pdf: PdfConfig,

    /// Keyword extraction configuration.
    pub extraction: ExtractionConfig,

    /// Output file configuration.
    pub output: OutputConfig,
}

/// Tesseract page segmentation modes used by the adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentationMode {
    /// Fully automatic page segmentation (`--psm 3`).
    Auto,
    /// Single uniform block of text (`--psm 6`).
    Block,
    /// Single text line (`--psm 7`).
    SingleLine,
    /// Single word (`--psm 8`).
    SingleWord,
}

impl SegmentationMode {
    /// Numeric value passed to `--psm`.
    pub fn psm(self) -> u8 {
        match self {
            SegmentationMode::Auto => 3,
            SegmentationMode::Block => 6,
            SegmentationMode::SingleLine => 7,
            SegmentationMode::SingleWord => 8,
        }
    }
}

/// OCR engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Path or name of the tesseract binary.
    pub tesseract_path: PathBuf,

    /// Recognition language model.
    pub language: String,

    /// Segmentation mode for token recognition.
    pub segmentation: SegmentationMode,

    /// Kill the engine after this many seconds (0 = wait forever).
    pub timeout_secs: u64,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            tesseract_path: PathBuf::from("tesseract"),
            language: "eng".to_string(),
            segmentation: SegmentationMode::Auto,
            timeout_secs: 60,
        }
    }
}

/// PDF rendering configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfConfig {
    /// Path or name of the pdftoppm binary.
    pub renderer_path: PathBuf,

    /// Region to render, in PDF points from the top-left corner.
    pub clip: ClipRect,

    /// Magnification applied in both axes.
    pub scale: f32,

    /// Use the embedded text layer instead of OCR when it is long enough.
    pub prefer_text_layer: bool,

    /// Minimum non-whitespace text layer length to consider a PDF digital.
    pub min_text_length: usize,

    /// Kill the renderer after this many seconds (0 = wait forever).
    pub timeout_secs: u64,
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self {
            renderer_path: PathBuf::from("pdftoppm"),
            clip: ClipRect::default(),
            scale: 5.0,
            prefer_text_layer: false,
            min_text_length: 50,
            timeout_secs: 60,
        }
    }
}

/// Keyword extraction configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Exact-match labels.
    pub keywords: Vec<String>,

    /// What to do with a label that is the last token.
    pub tail_policy: TailPolicy,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            keywords: DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            tail_policy: TailPolicy::default(),
        }
    }
}

/// How generated files are named relative to their source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputNaming {
    /// `<stem>.png`, `<stem>.csv`.
    #[default]
    SourceStem,
    /// `<stem>-<run id>.png`, so concurrent runs on one stem never collide.
    PerRun,
}

/// Output file configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Naming scheme for derived files.
    pub naming: OutputNaming,

    /// First row of every written table.
    pub table_header: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            naming: OutputNaming::SourceStem,
            table_header: DEFAULT_TABLE_HEADER.to_string(),
        }
    }
}

impl DocketConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        std::fs::write(path, content)
    }
}
