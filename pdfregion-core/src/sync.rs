use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument, warn};

use crate::document::{open_document, DocumentSet};
use crate::error::DocumentError;
use crate::selection::{Selection, SelectionStore};
use crate::DocumentProvider;

#[derive(Debug)]
pub struct SkippedDocument {
    pub path: PathBuf,
    pub reason: DocumentError,
}

#[derive(Debug, Default)]
pub struct SyncReport {
    /// Targets that received at least one selection, with the count appended.
    pub appended: Vec<(PathBuf, usize)>,
    pub skipped: Vec<SkippedDocument>,
    /// Source selections not copied because a target has too few pages,
    /// summed over all targets.
    pub dropped: usize,
}

impl SyncReport {
    pub fn total_appended(&self) -> usize {
        self.appended.iter().map(|(_, count)| count).sum()
    }
}

/// Appends a copy of every selection of `source` to every other document in
/// `documents`, keeping only selections whose page exists in the target.
///
/// This appends rather than replaces: syncing twice duplicates the copies on
/// each target. A source without selections is a no-op.
#[instrument(skip_all, fields(source = %source.display()))]
pub fn sync_selections<P>(
    provider: &P,
    store: &mut SelectionStore,
    source: &Path,
    documents: &DocumentSet,
) -> SyncReport
where
    P: DocumentProvider + ?Sized,
{
    let mut report = SyncReport::default();
    let source_selections: Vec<Selection> = store.selections(source).to_vec();
    if source_selections.is_empty() {
        debug!("source has no selections; nothing to sync");
        return report;
    }

    for target in documents.paths().filter(|path| *path != source) {
        let page_count = match open_document(provider, target) {
            Ok(backend) => backend.info().page_count(),
            Err(reason) => {
                warn!(path = %target.display(), %reason, "skipping sync target");
                report.skipped.push(SkippedDocument {
                    path: target.to_path_buf(),
                    reason,
                });
                continue;
            }
        };

        let eligible: Vec<Selection> = source_selections
            .iter()
            .filter(|selection| selection.page < page_count)
            .copied()
            .collect();
        report.dropped += source_selections.len() - eligible.len();

        if eligible.is_empty() {
            debug!(path = %target.display(), page_count, "no selection fits target");
            continue;
        }

        let count = eligible.len();
        store.append(target, eligible);
        report.appended.push((target.to_path_buf(), count));
    }

    info!(
        targets = report.appended.len(),
        appended = report.total_appended(),
        skipped = report.skipped.len(),
        dropped = report.dropped,
        "sync finished"
    );
    report
}
