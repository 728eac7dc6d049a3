//! Selection-driven region extraction over PDF documents.
//!
//! Rectangles are drawn on rendered pages, stored per document and per page,
//! propagated to other documents, and finally turned into a table of the text
//! found under each rectangle.

use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::{Deserialize, Serialize};

pub mod config;
pub mod document;
pub mod error;
pub mod export;
pub mod extract;
pub mod geometry;
pub mod selection;
pub mod session;
pub mod sync;

#[cfg(test)]
mod test_support;

pub use config::{AppConfig, ExportFormat};
pub use document::{is_pdf_path, open_document, DocumentRef, DocumentSet};
pub use error::{ConfigError, DocumentError, ExtractError, SelectionError};
pub use export::{export_all, write_json, write_xlsx, ExportReport, SelectionTable, TableRow};
pub use extract::{extract_text, extract_with, preview_text};
pub use geometry::{CoordinateMapper, PixelPoint, PointerPos, Rect, Size};
pub use selection::{DragState, Selection, SelectionStore};
pub use session::{Command, SelectionRow, Session, SessionEvent};
pub use sync::{sync_selections, SkippedDocument, SyncReport};

/// Every page is rendered, and every selection is expressed, at this scale.
/// One pixel of a rendered page equals one PDF point.
pub const RENDER_SCALE: f32 = 1.0;

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentInfo {
    pub path: PathBuf,
    /// Pixel dimensions of every page at [`RENDER_SCALE`].
    pub pages: Vec<Size>,
    pub metadata: DocumentMetadata,
}

impl DocumentInfo {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn page_size(&self, page_index: usize) -> Option<Size> {
        self.pages.get(page_index).copied()
    }
}

#[derive(Debug, Clone)]
pub struct RenderImage {
    pub width: u32,
    pub height: u32,
    /// RGBA8, row-major.
    pub pixels: Vec<u8>,
}

impl RenderImage {
    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

/// An open document handle. Dropping it releases the underlying file.
pub trait DocumentBackend {
    fn info(&self) -> &DocumentInfo;

    /// Renders one page at [`RENDER_SCALE`].
    fn render_page(&self, page_index: usize) -> Result<RenderImage>;

    /// Returns the text whose glyphs fall inside `rect`, where `rect` is in
    /// page pixel space at [`RENDER_SCALE`] with a top-left origin.
    fn text_in_rect(&self, page_index: usize, rect: Rect) -> Result<String>;
}

pub trait DocumentProvider {
    fn open(&self, path: &Path) -> Result<Box<dyn DocumentBackend + '_>>;
}
