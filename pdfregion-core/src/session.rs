use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use tracing::{debug, instrument};

use crate::document::{open_document, DocumentSet};
use crate::export::{export_all, ExportReport};
use crate::extract::preview_text;
use crate::geometry::{CoordinateMapper, PointerPos, Rect, Size};
use crate::selection::{Selection, SelectionStore};
use crate::sync::{sync_selections, SyncReport};
use crate::{DocumentInfo, DocumentProvider, RenderImage};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    LoadFolder { path: PathBuf },
    AddFiles { paths: Vec<PathBuf> },
    ActivateDocument { index: usize },
    NextPage,
    PrevPage,
    GotoPage { page: usize },
    ResizeDisplay { size: Size },
    PointerPressed { pos: PointerPos },
    PointerMoved { pos: PointerPos },
    PointerReleased { pos: PointerPos },
    DeleteSelection { index: usize },
    ClearSelections,
    SyncToAll,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    DocumentsChanged,
    ActiveDocumentChanged(PathBuf),
    PageChanged(usize),
    DragUpdated(Rect),
    SelectionsChanged,
    SyncFinished { appended: usize, skipped: usize },
}

/// One line of the selection listing for the active document. `index` is the
/// position in the full list and is what `DeleteSelection` expects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionRow {
    pub index: usize,
    pub page: usize,
    pub coords: String,
}

/// The state a presentation layer drives: known documents, their selections,
/// the displayed document and page, and the display surface size.
#[derive(Debug, Default)]
pub struct Session {
    documents: DocumentSet,
    store: SelectionStore,
    active: Option<DocumentInfo>,
    display: Size,
    events: Vec<SessionEvent>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn documents(&self) -> &DocumentSet {
        &self.documents
    }

    pub fn store(&self) -> &SelectionStore {
        &self.store
    }

    pub fn active(&self) -> Option<&DocumentInfo> {
        self.active.as_ref()
    }

    pub fn current_page(&self) -> Option<usize> {
        self.store.current_page()
    }

    pub fn take_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn apply<P>(&mut self, provider: &P, command: Command) -> Result<()>
    where
        P: DocumentProvider + ?Sized,
    {
        match command {
            Command::LoadFolder { path } => {
                self.documents.load_folder(&path)?;
                self.events.push(SessionEvent::DocumentsChanged);
            }
            Command::AddFiles { paths } => {
                if self.documents.add_files(paths) > 0 {
                    self.events.push(SessionEvent::DocumentsChanged);
                }
            }
            Command::ActivateDocument { index } => {
                let Some(doc) = self.documents.get(index) else {
                    return Ok(());
                };
                let path = doc.path.clone();
                self.activate(provider, &path)?;
            }
            Command::NextPage => {
                if let Some(page) = self.current_page() {
                    self.goto_page(page + 1);
                }
            }
            Command::PrevPage => {
                if let Some(page) = self.current_page() {
                    self.goto_page(page.saturating_sub(1));
                }
            }
            Command::GotoPage { page } => self.goto_page(page),
            Command::ResizeDisplay { size } => self.display = size,
            Command::PointerPressed { pos } => {
                if let Some(mapper) = self.mapper() {
                    self.store.begin_drag(mapper.to_document_space(pos))?;
                }
            }
            Command::PointerMoved { pos } => {
                if let Some(mapper) = self.mapper() {
                    if let Some(rect) = self.store.update_drag(mapper.to_document_space(pos)) {
                        self.events.push(SessionEvent::DragUpdated(rect));
                    }
                }
            }
            Command::PointerReleased { pos } => {
                if let Some(mapper) = self.mapper() {
                    if self.store.end_drag(mapper.to_document_space(pos)).is_some() {
                        self.events.push(SessionEvent::SelectionsChanged);
                    }
                }
            }
            Command::DeleteSelection { index } => {
                if let Some(path) = self.active_path() {
                    if self.store.delete_at(&path, index).is_some() {
                        self.events.push(SessionEvent::SelectionsChanged);
                    }
                }
            }
            Command::ClearSelections => {
                self.store.clear_all();
                self.events.push(SessionEvent::SelectionsChanged);
            }
            Command::SyncToAll => {
                self.sync(provider);
            }
        }
        Ok(())
    }

    /// Propagates the active document's selections to every other document.
    /// `None` when no document is active.
    pub fn sync<P>(&mut self, provider: &P) -> Option<SyncReport>
    where
        P: DocumentProvider + ?Sized,
    {
        let source = self.active_path()?;
        let report = sync_selections(provider, &mut self.store, &source, &self.documents);
        self.events.push(SessionEvent::SyncFinished {
            appended: report.total_appended(),
            skipped: report.skipped.len(),
        });
        Some(report)
    }

    pub fn export<P>(&self, provider: &P) -> ExportReport
    where
        P: DocumentProvider + ?Sized,
    {
        export_all(provider, &self.store, &self.documents)
    }

    /// Renders the displayed page of the active document.
    pub fn render_current<P>(&self, provider: &P) -> Result<RenderImage>
    where
        P: DocumentProvider + ?Sized,
    {
        let (path, page) = self.displayed()?;
        let backend = open_document(provider, &path)?;
        backend.render_page(page)
    }

    /// Extraction preview over all selections of the active document.
    pub fn preview<P>(&self, provider: &P) -> Result<String>
    where
        P: DocumentProvider + ?Sized,
    {
        let (path, _) = self.displayed()?;
        let backend = open_document(provider, &path)?;
        Ok(preview_text(&*backend, self.store.selections(&path)))
    }

    pub fn selection_rows(&self) -> Vec<SelectionRow> {
        let Some(path) = self.active_path() else {
            return Vec::new();
        };
        self.store
            .selections(&path)
            .iter()
            .enumerate()
            .map(|(index, selection)| SelectionRow {
                index,
                page: selection.page + 1,
                coords: selection.rect.to_string(),
            })
            .collect()
    }

    /// Selections to outline on the displayed page.
    pub fn page_selections(&self) -> Vec<Selection> {
        match self.displayed() {
            Ok((path, page)) => self.store.list_for_page(&path, page),
            Err(_) => Vec::new(),
        }
    }

    #[instrument(skip(self, provider))]
    fn activate<P>(&mut self, provider: &P, path: &Path) -> Result<()>
    where
        P: DocumentProvider + ?Sized,
    {
        let info = {
            let backend = open_document(provider, path)?;
            backend.info().clone()
        };
        debug!(pages = info.page_count(), "opened document for display");
        self.store.switch_active_document(path);
        self.active = Some(info);
        self.events
            .push(SessionEvent::ActiveDocumentChanged(path.to_path_buf()));
        self.events.push(SessionEvent::PageChanged(0));
        Ok(())
    }

    fn goto_page(&mut self, page: usize) {
        let Some(info) = self.active.as_ref() else {
            return;
        };
        let Some(current) = self.store.current_page() else {
            return;
        };
        let next = page.min(info.page_count().saturating_sub(1));
        if next != current && self.store.set_page(next).is_ok() {
            self.events.push(SessionEvent::PageChanged(next));
        }
    }

    fn mapper(&self) -> Option<CoordinateMapper> {
        let info = self.active.as_ref()?;
        let page = self.store.current_page()?;
        let image = info.page_size(page)?;
        Some(CoordinateMapper::new(self.display, image))
    }

    fn active_path(&self) -> Option<PathBuf> {
        self.active.as_ref().map(|info| info.path.clone())
    }

    fn displayed(&self) -> Result<(PathBuf, usize)> {
        let path = self
            .active_path()
            .ok_or_else(|| anyhow!("no document is active"))?;
        let page = self.store.current_page().unwrap_or(0);
        Ok((path, page))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{touch, FakeProvider};

    use tempfile::{tempdir, TempDir};

    struct Fixture {
        _dir: TempDir,
        a: PathBuf,
        b: PathBuf,
        provider: FakeProvider,
    }

    fn fixture() -> Fixture {
        let dir = tempdir().unwrap();
        let a = touch(dir.path(), "a.pdf");
        let b = touch(dir.path(), "b.pdf");
        touch(dir.path(), "skip.txt");
        let provider = FakeProvider::new()
            .with_document(&a, &[(600, 400), (600, 400), (600, 400)])
            .with_document(&b, &[(600, 400)])
            .with_text(&a, 0, (60, 40), "Acme Corp")
            .with_text(&b, 0, (60, 40), "Globex");
        Fixture {
            _dir: dir,
            a,
            b,
            provider,
        }
    }

    fn press_drag_release(
        session: &mut Session,
        provider: &FakeProvider,
        from: (i32, i32),
        to: (i32, i32),
    ) {
        let steps = [
            Command::PointerPressed {
                pos: PointerPos::new(from.0, from.1),
            },
            Command::PointerMoved {
                pos: PointerPos::new(to.0, to.1),
            },
            Command::PointerReleased {
                pos: PointerPos::new(to.0, to.1),
            },
        ];
        for step in steps {
            session.apply(provider, step).unwrap();
        }
    }

    fn loaded(fx: &Fixture) -> Session {
        let mut session = Session::new();
        let folder = fx.a.parent().unwrap().to_path_buf();
        session
            .apply(&fx.provider, Command::LoadFolder { path: folder })
            .unwrap();
        session
    }

    #[test]
    fn pointer_drag_is_mapped_through_display_offset() {
        let fx = fixture();
        let mut session = loaded(&fx);
        assert_eq!(session.documents().len(), 2);

        session
            .apply(&fx.provider, Command::ActivateDocument { index: 0 })
            .unwrap();
        session
            .apply(
                &fx.provider,
                Command::ResizeDisplay {
                    size: Size::new(800, 600),
                },
            )
            .unwrap();
        press_drag_release(&mut session, &fx.provider, (300, 250), (120, 110));

        let rows = session.selection_rows();
        assert_eq!(
            rows,
            vec![SelectionRow {
                index: 0,
                page: 1,
                coords: "(20,10) - (200,150)".to_string(),
            }]
        );
        assert_eq!(session.preview(&fx.provider).unwrap(), "--- Page 1 ---\nAcme Corp");
    }

    #[test]
    fn pointer_events_without_active_document_are_ignored() {
        let fx = fixture();
        let mut session = loaded(&fx);
        press_drag_release(&mut session, &fx.provider, (0, 0), (10, 10));

        assert_eq!(session.store().total(), 0);
        assert!(session.selection_rows().is_empty());
    }

    #[test]
    fn page_navigation_is_clamped_and_tags_selections() {
        let fx = fixture();
        let mut session = loaded(&fx);
        session
            .apply(&fx.provider, Command::ActivateDocument { index: 0 })
            .unwrap();

        session.apply(&fx.provider, Command::PrevPage).unwrap();
        assert_eq!(session.current_page(), Some(0));
        session
            .apply(&fx.provider, Command::GotoPage { page: 10 })
            .unwrap();
        assert_eq!(session.current_page(), Some(2));
        session.apply(&fx.provider, Command::NextPage).unwrap();
        assert_eq!(session.current_page(), Some(2));

        press_drag_release(&mut session, &fx.provider, (0, 0), (5, 5));
        assert_eq!(session.page_selections().len(), 1);
        assert_eq!(session.selection_rows()[0].page, 3);

        session.apply(&fx.provider, Command::PrevPage).unwrap();
        assert!(session.page_selections().is_empty());
    }

    #[test]
    fn sync_and_export_through_session() {
        let fx = fixture();
        let mut session = loaded(&fx);
        session
            .apply(&fx.provider, Command::ActivateDocument { index: 0 })
            .unwrap();
        press_drag_release(&mut session, &fx.provider, (50, 30), (100, 60));
        session.apply(&fx.provider, Command::NextPage).unwrap();
        press_drag_release(&mut session, &fx.provider, (0, 0), (5, 5));
        session.take_events();

        session.apply(&fx.provider, Command::SyncToAll).unwrap();
        assert_eq!(
            session.take_events(),
            vec![SessionEvent::SyncFinished {
                appended: 1,
                skipped: 0
            }]
        );
        assert_eq!(session.store().selections(&fx.b).len(), 1);

        let report = session.export(&fx.provider);
        let cells: Vec<_> = report
            .table
            .rows()
            .iter()
            .map(|row| row.cells.clone())
            .collect();
        assert_eq!(
            cells,
            vec![
                vec!["Acme Corp".to_string(), String::new()],
                vec!["Globex".to_string(), String::new()],
            ]
        );
    }

    #[test]
    fn switching_documents_keeps_each_list() {
        let fx = fixture();
        let mut session = loaded(&fx);
        session
            .apply(&fx.provider, Command::ActivateDocument { index: 0 })
            .unwrap();
        press_drag_release(&mut session, &fx.provider, (1, 1), (9, 9));

        session
            .apply(&fx.provider, Command::ActivateDocument { index: 1 })
            .unwrap();
        assert!(session.selection_rows().is_empty());

        session
            .apply(&fx.provider, Command::ActivateDocument { index: 0 })
            .unwrap();
        assert_eq!(session.selection_rows().len(), 1);
        assert_eq!(session.store().selections(&fx.a).len(), 1);
    }

    #[test]
    fn failed_activation_keeps_previous_document() {
        let fx = fixture();
        let mut session = loaded(&fx);
        session
            .apply(&fx.provider, Command::ActivateDocument { index: 0 })
            .unwrap();
        std::fs::remove_file(&fx.b).unwrap();

        assert!(session
            .apply(&fx.provider, Command::ActivateDocument { index: 1 })
            .is_err());
        assert_eq!(session.active().unwrap().path, fx.a);
        assert_eq!(fx.provider.live_handles(), 0);
    }

    #[test]
    fn delete_and_clear_emit_changes() {
        let fx = fixture();
        let mut session = loaded(&fx);
        session
            .apply(&fx.provider, Command::ActivateDocument { index: 0 })
            .unwrap();
        press_drag_release(&mut session, &fx.provider, (1, 1), (9, 9));
        press_drag_release(&mut session, &fx.provider, (2, 2), (8, 8));
        session.take_events();

        session
            .apply(&fx.provider, Command::DeleteSelection { index: 7 })
            .unwrap();
        assert!(session.take_events().is_empty());

        session
            .apply(&fx.provider, Command::DeleteSelection { index: 0 })
            .unwrap();
        assert_eq!(session.selection_rows()[0].coords, "(2,2) - (8,8)");

        session
            .apply(&fx.provider, Command::ClearSelections)
            .unwrap();
        assert!(session.selection_rows().is_empty());
        assert_eq!(
            session.take_events(),
            vec![
                SessionEvent::SelectionsChanged,
                SessionEvent::SelectionsChanged
            ]
        );
    }

    #[test]
    fn render_uses_displayed_page_size() {
        let fx = fixture();
        let mut session = loaded(&fx);
        assert!(session.render_current(&fx.provider).is_err());

        session
            .apply(&fx.provider, Command::ActivateDocument { index: 1 })
            .unwrap();
        let image = session.render_current(&fx.provider).unwrap();
        assert_eq!(image.size(), Size::new(600, 400));
    }
}
