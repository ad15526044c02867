//! Conversion of the first PDF page into a grayscale PNG for OCR.

use std::io::Cursor;

use image::{DynamicImage, GrayImage, Luma};
use tracing::{debug, info, warn};

use super::{ClipRect, FIRST_PAGE, PageRenderer, PdfDocument, PopplerRenderer, RenderRequest};
use crate::error::{DocketError, InputError, PdfError};
use crate::models::config::PdfConfig;
use crate::models::document::{DocumentFile, DocumentType, RunId};
use crate::storage::write_atomic;

/// Default magnification; renders at 360 dpi.
pub const DEFAULT_SCALE: f32 = 5.0;

/// Turns paged documents into raster images; raster inputs pass through.
pub struct Rasterizer<R: PageRenderer = PopplerRenderer> {
    renderer: R,
    scale: f32,
}

impl<R: PageRenderer> Rasterizer<R> {
    /// Create a rasterizer around a page renderer.
    pub fn new(renderer: R) -> Self {
        Self {
            renderer,
            scale: DEFAULT_SCALE,
        }
    }

    /// Set the magnification factor.
    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    /// The wrapped renderer.
    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// Rasterize `region` of the first page into `<stem>.png` next to `doc`.
    pub fn rasterize(
        &self,
        doc: &DocumentFile,
        region: ClipRect,
    ) -> Result<DocumentFile, DocketError> {
        self.rasterize_for_run(doc, region, None)
    }

    /// Like [`rasterize`](Self::rasterize), with the output name namespaced by `run`.
    pub fn rasterize_for_run(
        &self,
        doc: &DocumentFile,
        region: ClipRect,
        run: Option<&RunId>,
    ) -> Result<DocumentFile, DocketError> {
        let doc_type = doc.doc_type();

        if doc_type.is_raster() {
            debug!("{} is already a raster image, skipping rasterization", doc.name());
            return Ok(doc.clone());
        }

        if !doc_type.is_paged() {
            return Err(InputError::WrongType {
                stage: "rasterizer",
                doc_type: doc_type.to_string(),
            }
            .into());
        }

        let pdf = PdfDocument::open(doc.path())?;
        if FIRST_PAGE >= pdf.page_count() {
            return Err(PdfError::InvalidPage(FIRST_PAGE).into());
        }

        match pdf.page_size(FIRST_PAGE) {
            Some(size) if !size.contains(&region) => warn!(
                "Clip {:?} exceeds page bounds {}x{}; output may be partly empty",
                <[f32; 4]>::from(region),
                size.width,
                size.height
            ),
            None => debug!("No MediaBox found for {}", doc.name()),
            _ => {}
        }

        let request = RenderRequest {
            page_index: FIRST_PAGE,
            clip: region,
            scale: self.scale,
        };
        let rendered = if request.is_empty() {
            // pdftoppm reads a zero width or height as "whole page".
            warn!(
                "Clip {:?} has no area; writing a blank 1x1 image",
                <[f32; 4]>::from(region)
            );
            DynamicImage::ImageLuma8(GrayImage::from_pixel(1, 1, Luma([255u8])))
        } else {
            self.renderer.render(doc.path(), &request)?
        };

        // Normalize to 8-bit grayscale whatever the renderer produced.
        let gray = DynamicImage::ImageLuma8(rendered.to_luma8());
        let mut data = Vec::new();
        gray.write_to(&mut Cursor::new(&mut data), image::ImageFormat::Png)?;

        let target = doc.derive(DocumentType::Png, run);
        write_atomic(target.path(), &data)?;

        info!(
            "Rasterized {} with {} -> {} ({}x{})",
            doc.name(),
            self.renderer.name(),
            target.path().display(),
            gray.width(),
            gray.height()
        );

        Ok(target)
    }
}

impl Rasterizer<PopplerRenderer> {
    /// Create a `pdftoppm`-backed rasterizer from configuration.
    pub fn from_config(config: &PdfConfig) -> Self {
        Rasterizer::new(PopplerRenderer::from_config(config)).with_scale(config.scale)
    }
}
