use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use pdfium_render::prelude::*;
use pdfregion_core::{
    DocumentBackend, DocumentInfo, DocumentMetadata, DocumentProvider, Rect, RenderImage, Size,
    RENDER_SCALE,
};
use tracing::{debug, instrument, warn};

/// Opens PDFs through a pdfium library bound once at construction. Every
/// handle it hands out borrows the bindings and closes its document on drop.
pub struct PdfiumProvider {
    pdfium: Pdfium,
}

impl PdfiumProvider {
    /// Binds `library` when given, otherwise looks in the working directory
    /// and then on the system library path.
    pub fn new(library: Option<&Path>) -> Result<Self> {
        let pdfium = match library {
            Some(path) => bind_pdfium_at(path)?,
            None => bind_pdfium_default()?,
        };
        Ok(Self { pdfium })
    }
}

impl DocumentProvider for PdfiumProvider {
    #[instrument(skip(self))]
    fn open(&self, path: &Path) -> Result<Box<dyn DocumentBackend + '_>> {
        let document = self
            .pdfium
            .load_pdf_from_file(path, None)
            .with_context(|| format!("failed to open {:?}", path))?;
        let info = build_document_info(&document, path)?;
        debug!(pages = info.page_count(), "opened document");
        Ok(Box::new(PdfiumDocument { document, info }))
    }
}

struct PdfiumDocument<'a> {
    document: PdfDocument<'a>,
    info: DocumentInfo,
}

impl<'a> PdfiumDocument<'a> {
    fn page(&self, page_index: usize) -> Result<PdfPage<'a>> {
        let index: PdfPageIndex = page_index
            .try_into()
            .map_err(|_| anyhow!("page {} is out of supported range", page_index))?;
        self.document
            .pages()
            .get(index)
            .with_context(|| format!("page {} out of range", page_index))
    }
}

impl DocumentBackend for PdfiumDocument<'_> {
    fn info(&self) -> &DocumentInfo {
        &self.info
    }

    #[instrument(skip(self), fields(path = %self.info.path.display()))]
    fn render_page(&self, page_index: usize) -> Result<RenderImage> {
        let page = self.page(page_index)?;
        let config = PdfRenderConfig::new().scale_page_by_factor(RENDER_SCALE);
        let bitmap = page
            .render_with_config(&config)
            .with_context(|| format!("failed to render page {}", page_index))?;
        let image = bitmap.as_image().to_rgba8();

        Ok(RenderImage {
            width: image.width(),
            height: image.height(),
            pixels: image.into_raw(),
        })
    }

    fn text_in_rect(&self, page_index: usize, rect: Rect) -> Result<String> {
        let page = self.page(page_index)?;
        let text = page
            .text()
            .with_context(|| format!("failed to extract text for page {}", page_index))?;
        let (bottom, left, top, right) = pdf_bounds(rect, page.height().value);
        Ok(text.inside_rect(PdfRect::new_from_values(bottom, left, top, right)))
    }
}

/// Converts a top-left-origin pixel rectangle at [`RENDER_SCALE`] into PDF
/// user space (points, bottom-left origin). Returns `(bottom, left, top, right)`.
fn pdf_bounds(rect: Rect, page_height: f32) -> (f32, f32, f32, f32) {
    let to_points = |px: u32| px as f32 / RENDER_SCALE;
    let left = to_points(rect.x1());
    let right = to_points(rect.x2());
    let top = page_height - to_points(rect.y1());
    let bottom = page_height - to_points(rect.y2());
    (bottom, left, top, right)
}

fn build_document_info(document: &PdfDocument<'_>, path: &Path) -> Result<DocumentInfo> {
    let pages = document
        .pages()
        .iter()
        .map(|page| {
            Size::new(
                to_pixels(page.width().value),
                to_pixels(page.height().value),
            )
        })
        .collect();

    let metadata = document.metadata();
    let title = metadata
        .get(PdfDocumentMetadataTagType::Title)
        .map(|t| t.value().to_owned());
    let author = metadata
        .get(PdfDocumentMetadataTagType::Author)
        .map(|t| t.value().to_owned());

    Ok(DocumentInfo {
        path: path.to_path_buf(),
        pages,
        metadata: DocumentMetadata { title, author },
    })
}

fn to_pixels(points: f32) -> u32 {
    let scaled = points * RENDER_SCALE;
    if !scaled.is_finite() || scaled <= 0.0 {
        0
    } else {
        u32::try_from(scaled as u64).unwrap_or(u32::MAX)
    }
}

fn bind_pdfium_at(path: &Path) -> Result<Pdfium> {
    let bindings = Pdfium::bind_to_library(path)
        .map_err(|err| anyhow!("failed to load pdfium from {}: {}", path.display(), err))?;
    Ok(Pdfium::new(bindings))
}

fn bind_pdfium_default() -> Result<Pdfium> {
    let mut errors = Vec::new();

    let cwd_path: PathBuf = Pdfium::pdfium_platform_library_name_at_path("./");

    match Pdfium::bind_to_library(&cwd_path) {
        Ok(bindings) => return Ok(Pdfium::new(bindings)),
        Err(err) => {
            warn!(path = %cwd_path.display(), %err, "pdfium not found in working directory");
            errors.push(format!("{}: {}", cwd_path.display(), err));
        }
    }

    match Pdfium::bind_to_system_library() {
        Ok(bindings) => Ok(Pdfium::new(bindings)),
        Err(err) => {
            errors.push(format!("system: {err}"));
            Err(anyhow!(
                "failed to bind to a pdfium library; install it or set `pdfium_library` in the config ({})",
                errors.join(", ")
            ))
        }
    }
}
