//! Page rendering through Poppler's `pdftoppm`.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use image::DynamicImage;
use tracing::debug;

use super::{PageRenderer, RenderRequest, Result};
use crate::error::{PdfError, ToolError};
use crate::models::config::PdfConfig;
use crate::process::{run_tool, timeout_from_secs};

const TOOL: &str = "pdftoppm";

/// Renderer that shells out to `pdftoppm`.
#[derive(Debug, Clone)]
pub struct PopplerRenderer {
    binary: PathBuf,
    timeout: Option<Duration>,
}

impl PopplerRenderer {
    /// Create a renderer using `pdftoppm` from `PATH`.
    pub fn new() -> Self {
        Self {
            binary: PathBuf::from(TOOL),
            timeout: None,
        }
    }

    /// Create a renderer from configuration.
    pub fn from_config(config: &PdfConfig) -> Self {
        Self {
            binary: config.renderer_path.clone(),
            timeout: timeout_from_secs(config.timeout_secs),
        }
    }

    /// Set the binary path.
    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Set the render timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Binary this renderer runs.
    pub fn binary(&self) -> &Path {
        &self.binary
    }

    fn command(&self, pdf: &Path, request: &RenderRequest, out_base: &Path) -> Command {
        let page = (request.page_index + 1).to_string();
        let (x, y, width, height) = request.clip.to_pixels(request.scale);

        // A zero width or height would make pdftoppm render the whole page.
        let (width, height) = (width.max(1), height.max(1));

        let mut cmd = Command::new(&self.binary);
        cmd.arg("-f")
            .arg(&page)
            .arg("-l")
            .arg(&page)
            .arg("-r")
            .arg(request.dpi().to_string())
            .arg("-x")
            .arg(x.to_string())
            .arg("-y")
            .arg(y.to_string())
            .arg("-W")
            .arg(width.to_string())
            .arg("-H")
            .arg(height.to_string())
            .args(["-gray", "-png", "-singlefile"])
            .arg(pdf)
            .arg(out_base);
        cmd
    }
}

impl Default for PopplerRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl PageRenderer for PopplerRenderer {
    fn name(&self) -> &str {
        TOOL
    }

    fn render(&self, pdf: &Path, request: &RenderRequest) -> Result<DynamicImage> {
        let scratch = tempfile::tempdir().map_err(|source| ToolError::Io { tool: TOOL, source })?;
        let out_base = scratch.path().join("page");

        let mut cmd = self.command(pdf, request, &out_base);
        run_tool(TOOL, &mut cmd, self.timeout)?;

        // -singlefile writes exactly <out_base>.png
        let rendered = out_base.with_extension("png");
        let bytes = std::fs::read(&rendered)
            .map_err(|e| PdfError::RenderOutput(format!("{}: {}", rendered.display(), e)))?;

        let image =
            image::load_from_memory(&bytes).map_err(|e| PdfError::RenderOutput(e.to_string()))?;
        debug!(
            "Rendered page {} at {} dpi: {}x{}",
            request.page_index,
            request.dpi(),
            image.width(),
            image.height()
        );
        Ok(image)
    }
}
