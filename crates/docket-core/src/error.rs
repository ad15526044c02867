//! Error types for the docket-core library.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Main error type for the docket library.
#[derive(Error, Debug)]
pub enum DocketError {
    /// The input document was rejected before any stage ran.
    #[error("input error: {0}")]
    Input(#[from] InputError),

    /// PDF loading or rasterization error.
    #[error("conversion error: {0}")]
    Pdf(#[from] PdfError),

    /// OCR processing error.
    #[error("recognition error: {0}")]
    Ocr(#[from] OcrError),

    /// Keyword extraction error.
    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// Tabular file encoding or decoding error.
    #[error("table error: {0}")]
    Table(#[from] TableError),

    /// Image processing error.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors raised while validating an input document.
#[derive(Error, Debug)]
pub enum InputError {
    /// The file does not exist or cannot be resolved.
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The file content does not match any supported type.
    #[error("unsupported file type: {0}")]
    UnsupportedType(String),

    /// The document has a supported type but the stage cannot consume it.
    #[error("{stage} cannot process {doc_type} documents")]
    WrongType {
        stage: &'static str,
        doc_type: String,
    },

    /// The file has no usable name.
    #[error("invalid file name: {}", .0.display())]
    InvalidName(PathBuf),
}

/// Errors from running an external engine binary.
#[derive(Error, Debug)]
pub enum ToolError {
    /// The binary could not be started.
    #[error("{tool} is unavailable ({}): {source}", .path.display())]
    Unavailable {
        tool: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The binary exited with a non-zero status.
    #[error("{tool} failed (exit code {code}): {stderr}")]
    Failed {
        tool: &'static str,
        code: i32,
        stderr: String,
    },

    /// The binary did not finish in time and was killed.
    #[error("{tool} timed out after {timeout:?}")]
    TimedOut {
        tool: &'static str,
        timeout: Duration,
    },

    /// Reading the child's output or status failed.
    #[error("{tool} I/O error: {source}")]
    Io {
        tool: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Errors related to PDF processing.
#[derive(Error, Debug)]
pub enum PdfError {
    /// Failed to open/parse the PDF file.
    #[error("failed to parse PDF: {0}")]
    Parse(String),

    /// Failed to extract text from PDF.
    #[error("failed to extract text: {0}")]
    TextExtraction(String),

    /// The PDF is encrypted and cannot be processed.
    #[error("PDF is encrypted")]
    Encrypted,

    /// The PDF is empty or has no pages.
    #[error("PDF has no pages")]
    NoPages,

    /// Invalid page index requested.
    #[error("invalid page index: {0}")]
    InvalidPage(u32),

    /// The page renderer failed.
    #[error("render failed: {0}")]
    Render(#[from] ToolError),

    /// The renderer produced something that is not a readable image.
    #[error("rendered output is not an image: {0}")]
    RenderOutput(String),

    /// Merging documents failed.
    #[error("merge failed: {0}")]
    Merge(String),
}

/// Errors related to OCR processing.
#[derive(Error, Debug)]
pub enum OcrError {
    /// The recognition engine could not run or failed.
    #[error("engine error: {0}")]
    Engine(#[from] ToolError),

    /// The engine output did not follow its documented format.
    #[error("malformed engine output: {0}")]
    MalformedOutput(String),

    /// Invalid image input.
    #[error("invalid image: {0}")]
    InvalidImage(String),
}

/// Errors related to keyword extraction.
#[derive(Error, Debug)]
pub enum ExtractionError {
    /// A keyword was found at the end of the token sequence.
    #[error("keyword {keyword:?} at index {index} has no successor token")]
    MissingSuccessor { keyword: String, index: usize },

    /// The keyword set is empty.
    #[error("no keywords configured")]
    NoKeywords,
}

/// Errors related to the tabular file format.
#[derive(Error, Debug)]
pub enum TableError {
    /// The CSV layer failed to read or write.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A data row has fewer than two columns.
    #[error("malformed row at line {line}: expected 2 columns, found {columns}")]
    MalformedRow { line: u64, columns: usize },

    /// The file has no header row.
    #[error("missing header row")]
    MissingHeader,
}

/// Result type for the docket library.
pub type Result<T> = std::result::Result<T, DocketError>;
