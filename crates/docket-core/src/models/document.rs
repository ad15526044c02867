//! Document file records and type detection.

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::{DocketError, InputError};

/// Number of leading bytes inspected when sniffing a file type.
const SNIFF_LEN: usize = 8192;

/// OLE2 compound file signature used by legacy `.doc` files.
const OLE_MAGIC: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

/// Declared type of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    Pdf,
    Png,
    Jpg,
    Jpeg,
    Doc,
    Txt,
    Csv,
}

impl DocumentType {
    /// Types accepted at the upload boundary.
    pub const UPLOADABLE: [DocumentType; 6] = [
        DocumentType::Pdf,
        DocumentType::Png,
        DocumentType::Jpg,
        DocumentType::Jpeg,
        DocumentType::Doc,
        DocumentType::Txt,
    ];

    /// File extension for this type, without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            DocumentType::Pdf => "pdf",
            DocumentType::Png => "png",
            DocumentType::Jpg => "jpg",
            DocumentType::Jpeg => "jpeg",
            DocumentType::Doc => "doc",
            DocumentType::Txt => "txt",
            DocumentType::Csv => "csv",
        }
    }

    /// Parse a file extension (case-insensitive, with or without leading dot).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "pdf" => Some(DocumentType::Pdf),
            "png" => Some(DocumentType::Png),
            "jpg" => Some(DocumentType::Jpg),
            "jpeg" => Some(DocumentType::Jpeg),
            "doc" => Some(DocumentType::Doc),
            "txt" => Some(DocumentType::Txt),
            "csv" => Some(DocumentType::Csv),
            _ => None,
        }
    }

    /// Whether the type is a raster image the OCR engine can read.
    pub fn is_raster(self) -> bool {
        matches!(self, DocumentType::Png | DocumentType::Jpg | DocumentType::Jpeg)
    }

    /// Whether the type is a paged/vector format that needs rasterizing.
    pub fn is_paged(self) -> bool {
        self == DocumentType::Pdf
    }

    /// Whether the type may be submitted at the upload boundary.
    pub fn is_uploadable(self) -> bool {
        Self::UPLOADABLE.contains(&self)
    }

    /// Identify a binary format from its leading bytes.
    ///
    /// Plain-text formats have no signature and yield `None`.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(b"%PDF-") {
            return Some(DocumentType::Pdf);
        }
        if bytes.starts_with(&OLE_MAGIC) {
            return Some(DocumentType::Doc);
        }
        match image::guess_format(bytes) {
            Ok(image::ImageFormat::Png) => Some(DocumentType::Png),
            Ok(image::ImageFormat::Jpeg) => Some(DocumentType::Jpg),
            _ => None,
        }
    }

    /// Detect the type of a file on disk.
    ///
    /// Binary formats are recognized by content regardless of extension.
    /// UTF-8 text is `csv` when the extension says so and `txt` otherwise.
    pub fn detect(path: &Path) -> Result<Self, DocketError> {
        let mut head = Vec::with_capacity(SNIFF_LEN);
        File::open(path)?
            .take(SNIFF_LEN as u64)
            .read_to_end(&mut head)?;

        if let Some(detected) = Self::sniff(&head) {
            trace!("Sniffed {} as {}", path.display(), detected);
            return Ok(detected);
        }

        if looks_like_text(&head) {
            let by_ext = path
                .extension()
                .and_then(|e| e.to_str())
                .and_then(Self::from_extension);
            return Ok(match by_ext {
                Some(DocumentType::Csv) => DocumentType::Csv,
                _ => DocumentType::Txt,
            });
        }

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("unknown")
            .to_string();
        Err(InputError::UnsupportedType(ext).into())
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for DocumentType {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_extension(s).ok_or_else(|| InputError::UnsupportedType(s.to_string()))
    }
}

/// A file on stable storage with a logical name and a declared type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentFile {
    name: String,
    #[serde(rename = "type")]
    doc_type: DocumentType,
    path: PathBuf,
}

impl DocumentFile {
    /// Create a record. `name` is reduced to its final path component's stem.
    pub fn new(name: &str, doc_type: DocumentType, path: impl Into<PathBuf>) -> Self {
        Self {
            name: display_stem(name),
            doc_type,
            path: path.into(),
        }
    }

    /// Open an existing file, resolving its absolute path and sniffing its type.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DocketError> {
        let path = path.as_ref();
        let absolute = path
            .canonicalize()
            .map_err(|_| InputError::NotFound(path.to_path_buf()))?;

        let file_name = absolute
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| InputError::InvalidName(absolute.clone()))?;

        let doc_type = DocumentType::detect(&absolute)?;
        let doc = Self::new(file_name, doc_type, &absolute);
        debug!("Opened {} as {} ({})", doc.name, doc.doc_type, absolute.display());
        Ok(doc)
    }

    /// Display name (stem without extension).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared type.
    pub fn doc_type(&self) -> DocumentType {
        self.doc_type
    }

    /// Storage path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory that holds this file.
    pub fn directory(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }

    /// Describe a new file of `doc_type` colocated with this one.
    ///
    /// The derived file keeps this file's name. Its on-disk stem gets a
    /// `-<run>` suffix when a run identifier is supplied.
    pub fn derive(&self, doc_type: DocumentType, run: Option<&RunId>) -> DocumentFile {
        let stem = match run {
            Some(run) => format!("{}-{}", self.name, run),
            None => self.name.clone(),
        };
        let path = self
            .directory()
            .join(format!("{}.{}", stem, doc_type.extension()));

        DocumentFile {
            name: self.name.clone(),
            doc_type,
            path,
        }
    }

    /// Reject types outside the upload allow-list.
    pub fn ensure_uploadable(&self) -> Result<(), InputError> {
        if self.doc_type.is_uploadable() {
            Ok(())
        } else {
            Err(InputError::UnsupportedType(self.doc_type.to_string()))
        }
    }
}

impl fmt::Display for DocumentFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}, {}", self.name, self.doc_type, self.path.display())
    }
}

/// Identifier that namespaces the files written by one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    /// Generate a fresh identifier.
    pub fn generate() -> Self {
        let uuid = uuid::Uuid::new_v4().simple().to_string();
        Self(uuid[..12].to_string())
    }

    /// The identifier as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RunId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

fn display_stem(name: &str) -> String {
    let last = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(name);

    Path::new(last)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(last)
        .to_string()
}

fn looks_like_text(bytes: &[u8]) -> bool {
    if bytes.contains(&0) {
        return false;
    }
    match std::str::from_utf8(bytes) {
        Ok(_) => true,
        // A multi-byte character cut at the sniff boundary is still text.
        Err(e) => e.error_len().is_none() && bytes.len() >= SNIFF_LEN,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    fn png_bytes() -> Vec<u8> {
        let img = image::DynamicImage::ImageLuma8(image::GrayImage::new(4, 4));
        let mut data = Vec::new();
        img.write_to(&mut Cursor::new(&mut data), image::ImageFormat::Png)
            .unwrap();
        data
    }

    #[test]
    fn test_name_strips_directories_and_extension() {
        let doc = DocumentFile::new("uploads/scan.pdf", DocumentType::Pdf, "/tmp/uploads/scan.pdf");
        assert_eq!(doc.name(), "scan");

        let doc = DocumentFile::new("C:\\in\\scan.final.pdf", DocumentType::Pdf, "/x");
        assert_eq!(doc.name(), "scan.final");
        assert!(!doc.name().contains(".pdf"));
    }

    #[test]
    fn test_derive_is_sibling_with_new_type() {
        let doc = DocumentFile::new("invoice.pdf", DocumentType::Pdf, "/data/in/invoice.pdf");
        let png = doc.derive(DocumentType::Png, None);

        assert_eq!(png.name(), "invoice");
        assert_eq!(png.doc_type(), DocumentType::Png);
        assert_eq!(png.path(), Path::new("/data/in/invoice.png"));
        assert_eq!(png.directory(), doc.directory());
    }

    #[test]
    fn test_derive_with_run_id() {
        let doc = DocumentFile::new("invoice.pdf", DocumentType::Pdf, "/data/invoice.pdf");
        let run = RunId::from("abc123");
        let csv = doc.derive(DocumentType::Csv, Some(&run));

        assert_eq!(csv.name(), "invoice");
        assert_eq!(csv.path(), Path::new("/data/invoice-abc123.csv"));
    }

    #[test]
    fn test_generated_run_ids_differ() {
        let a = RunId::generate();
        let b = RunId::generate();
        assert_eq!(a.as_str().len(), 12);
        assert_ne!(a, b);
    }

    #[test]
    fn test_sniff_binary_formats() {
        assert_eq!(DocumentType::sniff(b"%PDF-1.7\n..."), Some(DocumentType::Pdf));
        assert_eq!(DocumentType::sniff(&png_bytes()), Some(DocumentType::Png));
        assert_eq!(
            DocumentType::sniff(&[0xFF, 0xD8, 0xFF, 0xE0, 0, 0x10, b'J', b'F']),
            Some(DocumentType::Jpg)
        );
        assert_eq!(DocumentType::sniff(&OLE_MAGIC), Some(DocumentType::Doc));
        assert_eq!(DocumentType::sniff(b"Invoice no. 4521"), None);
    }

    #[test]
    fn test_detect_ignores_misleading_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.pdf");
        std::fs::write(&path, png_bytes()).unwrap();

        let doc = DocumentFile::open(&path).unwrap();
        assert_eq!(doc.doc_type(), DocumentType::Png);
        assert_eq!(doc.name(), "scan");
        assert!(doc.path().is_absolute());
    }

    #[test]
    fn test_detect_text_and_csv() {
        let dir = tempfile::tempdir().unwrap();
        let txt = dir.path().join("notes.txt");
        let csv = dir.path().join("data.csv");
        std::fs::write(&txt, "Total CHF 120.50").unwrap();
        std::fs::write(&csv, "Extracted File Data\nTotal CHF,120.50\n").unwrap();

        assert_eq!(DocumentType::detect(&txt).unwrap(), DocumentType::Txt);
        assert_eq!(DocumentType::detect(&csv).unwrap(), DocumentType::Csv);
    }

    #[test]
    fn test_detect_rejects_unknown_binary() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blob.bin");
        std::fs::write(&path, [0u8, 1, 2, 3, 0xFE]).unwrap();

        let err = DocumentType::detect(&path).unwrap_err();
        assert!(err.to_string().contains("unsupported file type"));
    }

    #[test]
    fn test_open_missing_file() {
        let err = DocumentFile::open("/definitely/not/here.pdf").unwrap_err();
        assert!(matches!(err, DocketError::Input(InputError::NotFound(_))));
    }

    #[test]
    fn test_upload_allow_list() {
        assert!(DocumentType::Doc.is_uploadable());
        assert!(!DocumentType::Csv.is_uploadable());

        let doc = DocumentFile::new("table.csv", DocumentType::Csv, "/t/table.csv");
        assert!(doc.ensure_uploadable().is_err());
    }

    #[test]
    fn test_serde_shape() {
        let doc = DocumentFile::new("invoice", DocumentType::Png, "/d/invoice.png");
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["name"], "invoice");
        assert_eq!(json["type"], "png");

        let back: DocumentFile = serde_json::from_value(json).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn test_type_from_str() {
        assert_eq!("JPEG".parse::<DocumentType>().unwrap(), DocumentType::Jpeg);
        assert!("gif".parse::<DocumentType>().is_err());
    }
}
