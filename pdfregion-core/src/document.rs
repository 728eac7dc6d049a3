use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, instrument};

use crate::error::DocumentError;
use crate::{DocumentBackend, DocumentProvider};

/// Extension filter applied before any document handle is attempted.
pub fn is_pdf_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

/// Opens `path` through `provider`, classifying failures. The returned handle
/// closes the document when dropped.
pub fn open_document<'p, P>(
    provider: &'p P,
    path: &Path,
) -> Result<Box<dyn DocumentBackend + 'p>, DocumentError>
where
    P: DocumentProvider + ?Sized,
{
    if !path.is_file() {
        return Err(DocumentError::FileMissing {
            path: path.to_path_buf(),
        });
    }
    provider
        .open(path)
        .map_err(|source| DocumentError::OpenFailure {
            path: path.to_path_buf(),
            source,
        })
}

/// A known document. Identity is the path; the name is only for display, so
/// two files sharing a basename in different folders stay distinct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRef {
    pub path: PathBuf,
    pub name: String,
}

impl DocumentRef {
    pub fn new(path: PathBuf) -> Self {
        let name = display_name(&path);
        Self { path, name }
    }
}

pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// Ordered set of known documents, unique by path.
#[derive(Debug, Clone, Default)]
pub struct DocumentSet {
    documents: Vec<DocumentRef>,
}

impl DocumentSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole set with the PDFs found directly inside `dir`,
    /// ordered by file name.
    #[instrument(skip(self))]
    pub fn load_folder(&mut self, dir: &Path) -> Result<usize> {
        let entries =
            fs::read_dir(dir).with_context(|| format!("failed to read folder {:?}", dir))?;

        let mut found = Vec::new();
        for entry in entries {
            let entry = entry.with_context(|| format!("failed to list folder {:?}", dir))?;
            let path = entry.path();
            if !is_pdf_path(&path) {
                continue;
            }
            if entry.file_type().map(|ft| ft.is_dir()).unwrap_or(false) {
                continue;
            }
            found.push(path);
        }
        found.sort_by_key(|path| display_name(path));

        self.documents = found.into_iter().map(DocumentRef::new).collect();
        debug!(count = self.documents.len(), "loaded folder");
        Ok(self.documents.len())
    }

    /// Appends dropped files. Non-PDF paths and paths already present are
    /// ignored. Returns how many documents were added.
    pub fn add_files<I>(&mut self, paths: I) -> usize
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let mut added = 0;
        for path in paths {
            if !is_pdf_path(&path) || self.contains(&path) {
                continue;
            }
            self.documents.push(DocumentRef::new(path));
            added += 1;
        }
        added
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.position(path).is_some()
    }

    pub fn position(&self, path: &Path) -> Option<usize> {
        self.documents.iter().position(|doc| doc.path == path)
    }

    pub fn get(&self, index: usize) -> Option<&DocumentRef> {
        self.documents.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DocumentRef> {
        self.documents.iter()
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.documents.iter().map(|doc| doc.path.as_path())
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{touch, FakeProvider};

    use tempfile::tempdir;

    #[test]
    fn extension_filter_is_case_insensitive() {
        assert!(is_pdf_path(Path::new("/a/report.pdf")));
        assert!(is_pdf_path(Path::new("/a/REPORT.PDF")));
        assert!(!is_pdf_path(Path::new("/a/report.pdf.txt")));
        assert!(!is_pdf_path(Path::new("/a/report")));
    }

    #[test]
    fn load_folder_replaces_set_with_sorted_pdfs() {
        let dir = tempdir().unwrap();
        let b = touch(dir.path(), "b.pdf");
        let a = touch(dir.path(), "A.PDF");
        touch(dir.path(), "notes.txt");
        fs::create_dir(dir.path().join("folder.pdf")).unwrap();

        let mut set = DocumentSet::new();
        set.add_files([PathBuf::from("/elsewhere/old.pdf")]);
        let count = set.load_folder(dir.path()).unwrap();

        assert_eq!(count, 2);
        let paths: Vec<_> = set.paths().map(Path::to_path_buf).collect();
        assert_eq!(paths, vec![a, b]);
        assert!(!set.contains(Path::new("/elsewhere/old.pdf")));
    }

    #[test]
    fn load_folder_on_missing_directory_fails() {
        let dir = tempdir().unwrap();
        let mut set = DocumentSet::new();
        assert!(set.load_folder(&dir.path().join("missing")).is_err());
    }

    #[test]
    fn same_basename_in_different_folders_are_distinct() {
        let mut set = DocumentSet::new();
        let added = set.add_files([
            PathBuf::from("/one/invoice.pdf"),
            PathBuf::from("/two/invoice.pdf"),
            PathBuf::from("/one/invoice.pdf"),
            PathBuf::from("/one/readme.md"),
        ]);

        assert_eq!(added, 2);
        assert_eq!(set.len(), 2);
        assert_eq!(set.get(0).unwrap().name, "invoice.pdf");
        assert_eq!(set.get(1).unwrap().name, "invoice.pdf");
        assert_eq!(set.position(Path::new("/two/invoice.pdf")), Some(1));
    }

    #[test]
    fn open_document_classifies_failures() {
        let dir = tempdir().unwrap();
        let good = touch(dir.path(), "good.pdf");
        let corrupt = touch(dir.path(), "corrupt.pdf");
        let provider = FakeProvider::new()
            .with_document(&good, &[(100, 100)])
            .with_broken(&corrupt);

        assert!(open_document(&provider, &good).is_ok());
        assert!(matches!(
            open_document(&provider, &dir.path().join("gone.pdf")),
            Err(DocumentError::FileMissing { .. })
        ));
        assert!(matches!(
            open_document(&provider, &corrupt),
            Err(DocumentError::OpenFailure { .. })
        ));
    }
}
