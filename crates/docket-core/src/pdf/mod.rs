//! PDF loading, rasterization, and merging.

mod document;
mod merge;
mod rasterizer;
mod renderer;

pub use document::{PageSize, PdfDocument};
pub(crate) use document::tokenize_text;
pub use merge::{merge_documents, merge_files};
pub use rasterizer::Rasterizer;
pub use renderer::PopplerRenderer;

use std::path::Path;

use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::error::PdfError;

/// Only the first page of a document is ever rendered.
pub const FIRST_PAGE: u32 = 0;

/// Result type for PDF operations.
pub type Result<T> = std::result::Result<T, PdfError>;

/// Rectangle in PDF points measured from the top-left corner of the page.
///
/// Serialized as `[x0, y0, x1, y1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 4]", into = "[f32; 4]")]
pub struct ClipRect {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl ClipRect {
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn width(&self) -> f32 {
        (self.x1 - self.x0).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y1 - self.y0).max(0.0)
    }

    /// Pixel window `(x, y, width, height)` after magnifying by `scale`.
    pub fn to_pixels(&self, scale: f32) -> (u32, u32, u32, u32) {
        let px = |v: f32| (v.max(0.0) * scale).round() as u32;
        (px(self.x0), px(self.y0), px(self.width()), px(self.height()))
    }
}

impl Default for ClipRect {
    fn default() -> Self {
        Self::new(0.0, 0.0, 500.0, 700.0)
    }
}

impl From<[f32; 4]> for ClipRect {
    fn from(v: [f32; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

impl From<ClipRect> for [f32; 4] {
    fn from(r: ClipRect) -> Self {
        [r.x0, r.y0, r.x1, r.y1]
    }
}

/// What to render from a PDF.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderRequest {
    /// Zero-based page index.
    pub page_index: u32,
    /// Region of the page.
    pub clip: ClipRect,
    /// Magnification in both axes.
    pub scale: f32,
}

impl RenderRequest {
    /// Output resolution in dots per inch (PDF user space is 72 dpi).
    pub fn dpi(&self) -> u32 {
        (72.0 * self.scale).round() as u32
    }

    /// True when the clip covers less than one output pixel in either axis.
    pub fn is_empty(&self) -> bool {
        let (_, _, width, height) = self.clip.to_pixels(self.scale);
        width == 0 || height == 0
    }
}

/// Trait for engines that turn a PDF page region into pixels.
pub trait PageRenderer {
    /// Short engine name for logs.
    fn name(&self) -> &str;

    /// Render the requested region of `pdf` in grayscale.
    fn render(&self, pdf: &Path, request: &RenderRequest) -> Result<DynamicImage>;
}

impl<T: PageRenderer + ?Sized> PageRenderer for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn render(&self, pdf: &Path, request: &RenderRequest) -> Result<DynamicImage> {
        (**self).render(pdf, request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_clip_to_pixels_at_5x() {
        let clip = ClipRect::default();
        assert_eq!(clip.to_pixels(5.0), (0, 0, 2500, 3500));
    }

    #[test]
    fn test_render_request_dpi() {
        let request = RenderRequest {
            page_index: FIRST_PAGE,
            clip: ClipRect::default(),
            scale: 5.0,
        };
        assert_eq!(request.dpi(), 360);
    }

    #[test]
    fn test_degenerate_clip_has_zero_size() {
        let clip = ClipRect::new(100.0, 100.0, 50.0, 50.0);
        assert_eq!(clip.width(), 0.0);
        assert_eq!(clip.to_pixels(5.0), (500, 500, 0, 0));
    }

    #[test]
    fn test_clip_serializes_as_array() {
        let json = serde_json::to_string(&ClipRect::default()).unwrap();
        assert_eq!(json, "[0.0,0.0,500.0,700.0]");
        let back: ClipRect = serde_json::from_str("[10,20,30,40]").unwrap();
        assert_eq!(back, ClipRect::new(10.0, 20.0, 30.0, 40.0));
    }
}
