use std::cell::Cell;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};

use crate::{
    DocumentBackend, DocumentInfo, DocumentMetadata, DocumentProvider, PixelPoint, Rect,
    RenderImage, Size,
};

pub fn touch(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, b"%PDF-1.7").unwrap();
    path
}

#[derive(Default)]
struct FakeDocument {
    pages: Vec<Size>,
    fragments: Vec<(usize, PixelPoint, String)>,
    failing_pages: HashSet<usize>,
}

/// In-memory provider. A document's text is a list of fragments anchored at a
/// point; a fragment is inside a rectangle when its anchor is.
#[derive(Default)]
pub struct FakeProvider {
    documents: HashMap<PathBuf, FakeDocument>,
    broken: HashSet<PathBuf>,
    live_handles: Cell<usize>,
    opened: Cell<usize>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(mut self, path: &Path, pages: &[(u32, u32)]) -> Self {
        let doc = self.documents.entry(path.to_path_buf()).or_default();
        doc.pages = pages.iter().map(|&(w, h)| Size::new(w, h)).collect();
        self
    }

    pub fn with_text(mut self, path: &Path, page: usize, at: (u32, u32), text: &str) -> Self {
        self.documents
            .entry(path.to_path_buf())
            .or_default()
            .fragments
            .push((page, PixelPoint::new(at.0, at.1), text.to_string()));
        self
    }

    pub fn with_failing_page(mut self, path: &Path, page: usize) -> Self {
        self.documents
            .entry(path.to_path_buf())
            .or_default()
            .failing_pages
            .insert(page);
        self
    }

    pub fn with_broken(mut self, path: &Path) -> Self {
        self.broken.insert(path.to_path_buf());
        self
    }

    pub fn live_handles(&self) -> usize {
        self.live_handles.get()
    }

    pub fn opened(&self) -> usize {
        self.opened.get()
    }
}

impl DocumentProvider for FakeProvider {
    fn open(&self, path: &Path) -> Result<Box<dyn DocumentBackend + '_>> {
        if self.broken.contains(path) {
            return Err(anyhow!("not a PDF"));
        }
        let doc = self
            .documents
            .get(path)
            .ok_or_else(|| anyhow!("unknown document {:?}", path))?;
        self.opened.set(self.opened.get() + 1);
        self.live_handles.set(self.live_handles.get() + 1);
        Ok(Box::new(FakeBackend {
            info: DocumentInfo {
                path: path.to_path_buf(),
                pages: doc.pages.clone(),
                metadata: DocumentMetadata::default(),
            },
            doc,
            live_handles: &self.live_handles,
        }))
    }
}

struct FakeBackend<'a> {
    info: DocumentInfo,
    doc: &'a FakeDocument,
    live_handles: &'a Cell<usize>,
}

impl Drop for FakeBackend<'_> {
    fn drop(&mut self) {
        self.live_handles.set(self.live_handles.get() - 1);
    }
}

impl DocumentBackend for FakeBackend<'_> {
    fn info(&self) -> &DocumentInfo {
        &self.info
    }

    fn render_page(&self, page_index: usize) -> Result<RenderImage> {
        let size = self
            .info
            .page_size(page_index)
            .ok_or_else(|| anyhow!("page {} out of range", page_index))?;
        Ok(RenderImage {
            width: size.width,
            height: size.height,
            pixels: vec![255; (size.width * size.height * 4) as usize],
        })
    }

    fn text_in_rect(&self, page_index: usize, rect: Rect) -> Result<String> {
        if page_index >= self.info.page_count() {
            return Err(anyhow!("page {} out of range", page_index));
        }
        if self.doc.failing_pages.contains(&page_index) {
            return Err(anyhow!("text layer unavailable"));
        }
        let parts: Vec<&str> = self
            .doc
            .fragments
            .iter()
            .filter(|(page, at, _)| {
                *page == page_index
                    && (rect.x1()..=rect.x2()).contains(&at.x)
                    && (rect.y1()..=rect.y2()).contains(&at.y)
            })
            .map(|(_, _, text)| text.as_str())
            .collect();
        Ok(format!("  {}\n", parts.join("\n")))
    }
}
