use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::SelectionError;
use crate::geometry::{PixelPoint, Rect};

/// A page-scoped rectangle. Coordinates are fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Selection {
    pub page: usize,
    pub rect: Rect,
}

impl Selection {
    pub fn new(page: usize, rect: Rect) -> Self {
        Self { page, rect }
    }
}

/// Drag protocol: `Idle -> Dragging -> (commit) -> Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DragState {
    #[default]
    Idle,
    Dragging { anchor: PixelPoint, rect: Rect },
}

#[derive(Debug)]
struct ActiveDocument {
    path: PathBuf,
    page: usize,
    working: Vec<Selection>,
}

/// Per-document selection lists plus the working list of the active document.
///
/// While a document is active its list lives only in the working slot; it is
/// moved back into the map when another document becomes active. All reads go
/// through [`SelectionStore::selections`], which routes to whichever slot
/// currently owns the list, so callers never observe a stale copy.
#[derive(Debug, Default)]
pub struct SelectionStore {
    stored: HashMap<PathBuf, Vec<Selection>>,
    order: Vec<PathBuf>,
    active: Option<ActiveDocument>,
    drag: DragState,
}

impl SelectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_path(&self) -> Option<&Path> {
        self.active.as_ref().map(|active| active.path.as_path())
    }

    pub fn current_page(&self) -> Option<usize> {
        self.active.as_ref().map(|active| active.page)
    }

    /// Sets the page new drags are tagged with.
    pub fn set_page(&mut self, page: usize) -> Result<(), SelectionError> {
        let active = self
            .active
            .as_mut()
            .ok_or(SelectionError::NoActiveDocument)?;
        active.page = page;
        Ok(())
    }

    /// Flushes the outgoing working list into the map, then loads the
    /// incoming document's list (empty if never seen) as the working list.
    /// Any in-progress drag is discarded and the page resets to 0.
    pub fn switch_active_document(&mut self, path: &Path) {
        if let Some(outgoing) = self.active.take() {
            self.stored.insert(outgoing.path, outgoing.working);
        }
        self.register(path);
        let working = self.stored.remove(path).unwrap_or_default();
        debug!(path = %path.display(), selections = working.len(), "activated document");
        self.active = Some(ActiveDocument {
            path: path.to_path_buf(),
            page: 0,
            working,
        });
        self.drag = DragState::Idle;
    }

    pub fn drag_state(&self) -> DragState {
        self.drag
    }

    pub fn begin_drag(&mut self, point: PixelPoint) -> Result<(), SelectionError> {
        if self.active.is_none() {
            return Err(SelectionError::NoActiveDocument);
        }
        self.drag = DragState::Dragging {
            anchor: point,
            rect: Rect::from_corners(point, point),
        };
        Ok(())
    }

    /// Returns the in-progress rectangle, or `None` when no drag is active.
    pub fn update_drag(&mut self, point: PixelPoint) -> Option<Rect> {
        match &mut self.drag {
            DragState::Idle => None,
            DragState::Dragging { anchor, rect } => {
                *rect = Rect::from_corners(*anchor, point);
                Some(*rect)
            }
        }
    }

    /// Commits the drag as a selection on the current page of the active
    /// document. Zero-area rectangles are committed too.
    pub fn end_drag(&mut self, point: PixelPoint) -> Option<Selection> {
        let DragState::Dragging { anchor, .. } = std::mem::take(&mut self.drag) else {
            return None;
        };
        let active = self.active.as_mut()?;
        let selection = Selection::new(active.page, Rect::from_corners(anchor, point));
        active.working.push(selection);
        debug!(
            path = %active.path.display(),
            page = selection.page,
            rect = %selection.rect,
            "committed selection"
        );
        Some(selection)
    }

    /// Full selection list of `path`, in creation order.
    pub fn selections(&self, path: &Path) -> &[Selection] {
        match &self.active {
            Some(active) if active.path == path => &active.working,
            _ => self.stored.get(path).map(Vec::as_slice).unwrap_or(&[]),
        }
    }

    pub fn list_for_page(&self, path: &Path, page: usize) -> Vec<Selection> {
        self.selections(path)
            .iter()
            .filter(|selection| selection.page == page)
            .copied()
            .collect()
    }

    /// Removes the entry at `index` of the full list. Out of range is a no-op.
    pub fn delete_at(&mut self, path: &Path, index: usize) -> Option<Selection> {
        let list = self.list_mut(path)?;
        if index < list.len() {
            Some(list.remove(index))
        } else {
            None
        }
    }

    pub fn append<I>(&mut self, path: &Path, selections: I)
    where
        I: IntoIterator<Item = Selection>,
    {
        self.register(path);
        match &mut self.active {
            Some(active) if active.path == path => active.working.extend(selections),
            _ => self
                .stored
                .entry(path.to_path_buf())
                .or_default()
                .extend(selections),
        }
    }

    pub fn replace(&mut self, path: &Path, selections: Vec<Selection>) {
        self.register(path);
        match &mut self.active {
            Some(active) if active.path == path => active.working = selections,
            _ => {
                self.stored.insert(path.to_path_buf(), selections);
            }
        }
    }

    /// Empties every list and cancels any drag. The active document stays
    /// active.
    pub fn clear_all(&mut self) {
        self.stored.clear();
        if let Some(active) = self.active.as_mut() {
            active.working.clear();
        }
        self.drag = DragState::Idle;
    }

    /// Every document that has ever held a list, in first-seen order.
    pub fn documents(&self) -> impl Iterator<Item = (&Path, &[Selection])> {
        self.order
            .iter()
            .map(|path| (path.as_path(), self.selections(path)))
    }

    pub fn total(&self) -> usize {
        self.documents().map(|(_, list)| list.len()).sum()
    }

    fn register(&mut self, path: &Path) {
        if !self.order.iter().any(|known| known == path) {
            self.order.push(path.to_path_buf());
        }
    }

    fn list_mut(&mut self, path: &Path) -> Option<&mut Vec<Selection>> {
        match &mut self.active {
            Some(active) if active.path == path => Some(&mut active.working),
            _ => self.stored.get_mut(path),
        }
    }
}
