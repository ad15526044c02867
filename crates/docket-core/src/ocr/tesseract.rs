//! Tesseract command-line engine.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use tracing::debug;

use super::{OcrEngine, Token, parse_tsv};
use crate::error::OcrError;
use crate::models::config::{OcrConfig, SegmentationMode};
use crate::process::{is_available, run_tool, timeout_from_secs};

const TOOL: &str = "tesseract";

/// Characters Tesseract appends after recognized plain text.
const LINE_TERMINATORS: [char; 3] = ['\n', '\r', '\x0c'];

/// OCR engine that shells out to the `tesseract` binary.
#[derive(Debug, Clone)]
pub struct TesseractEngine {
    binary: PathBuf,
    language: String,
    segmentation: SegmentationMode,
    timeout: Option<Duration>,
}

impl TesseractEngine {
    /// Engine using `tesseract` from `PATH` with English and automatic segmentation.
    pub fn new() -> Self {
        Self::from_config(&OcrConfig::default())
    }

    pub fn from_config(config: &OcrConfig) -> Self {
        Self {
            binary: config.tesseract_path.clone(),
            language: config.language.clone(),
            segmentation: config.segmentation,
            timeout: timeout_from_secs(config.timeout_secs),
        }
    }

    /// Set the binary path.
    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Set the recognition timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Whether the binary can be started.
    pub fn is_available(&self) -> bool {
        is_available(&self.binary)
    }

    /// Recognize a single line of text as a plain string (`--psm 7`).
    pub fn recognize_line(&self, image: &Path) -> Result<String, OcrError> {
        if !image.is_file() {
            return Err(OcrError::InvalidImage(format!("{} not found", image.display())));
        }

        let mut cmd = self.command(image, SegmentationMode::SingleLine, false);
        let output = run_tool(TOOL, &mut cmd, self.timeout)?;
        let text = String::from_utf8(output.stdout)
            .map_err(|e| OcrError::MalformedOutput(e.to_string()))?;
        Ok(text.trim_end_matches(LINE_TERMINATORS).to_string())
    }

    fn command(&self, image: &Path, mode: SegmentationMode, tsv: bool) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.arg(image)
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .arg("--psm")
            .arg(mode.psm().to_string());
        if tsv {
            cmd.arg("tsv");
        }
        cmd
    }
}

impl Default for TesseractEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl OcrEngine for TesseractEngine {
    fn name(&self) -> &str {
        TOOL
    }

    fn recognize(&self, image: &Path) -> Result<Vec<Token>, OcrError> {
        if !image.is_file() {
            return Err(OcrError::InvalidImage(format!("{} not found", image.display())));
        }

        let mut cmd = self.command(image, self.segmentation, true);
        let output = run_tool(TOOL, &mut cmd, self.timeout)?;
        let stdout = String::from_utf8(output.stdout)
            .map_err(|e| OcrError::MalformedOutput(e.to_string()))?;

        let tokens = parse_tsv(&stdout)?;
        debug!("tesseract psm {}: {} rows", self.segmentation.psm(), tokens.len());
        Ok(tokens)
    }
}
