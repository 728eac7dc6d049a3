use std::path::Path;

use tracing::{debug, instrument, warn};

use crate::document::open_document;
use crate::error::ExtractError;
use crate::selection::Selection;
use crate::{DocumentBackend, DocumentProvider};

/// Extracts the trimmed text under `selection` from an already open document.
/// No text under the rectangle yields an empty string.
pub fn extract_with(
    backend: &dyn DocumentBackend,
    selection: &Selection,
) -> Result<String, ExtractError> {
    let page_count = backend.info().page_count();
    if selection.page >= page_count {
        return Err(ExtractError::PageIndex {
            page: selection.page,
            page_count,
        });
    }

    let text = backend
        .text_in_rect(selection.page, selection.rect)
        .map_err(|source| ExtractError::Backend {
            page: selection.page,
            source,
        })?;
    let text = text.trim();
    debug!(page = selection.page, rect = %selection.rect, chars = text.len(), "extracted");
    Ok(text.to_owned())
}

/// Opens `path`, extracts one selection and closes the document again.
#[instrument(skip_all, fields(path = %path.display(), page = selection.page))]
pub fn extract_text<P>(
    provider: &P,
    path: &Path,
    selection: &Selection,
) -> Result<String, ExtractError>
where
    P: DocumentProvider + ?Sized,
{
    let backend = open_document(provider, path)?;
    extract_with(&*backend, selection)
}

/// Human-readable preview of every selection with text, one block per
/// selection headed by its 1-based page number.
pub fn preview_text(backend: &dyn DocumentBackend, selections: &[Selection]) -> String {
    let mut blocks = Vec::new();
    for selection in selections {
        match extract_with(backend, selection) {
            Ok(text) if !text.is_empty() => {
                blocks.push(format!("--- Page {} ---\n{}", selection.page + 1, text));
            }
            Ok(_) => {}
            Err(err) => warn!(%err, "preview skipped selection"),
        }
    }
    blocks.join("\n\n")
}
