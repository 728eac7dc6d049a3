use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rust_xlsxwriter::Workbook;
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::document::{display_name, open_document, DocumentSet};
use crate::extract::extract_with;
use crate::selection::{Selection, SelectionStore};
use crate::sync::SkippedDocument;
use crate::DocumentProvider;

pub const NAME_HEADER: &str = "PDF Name";
const WORKSHEET_NAME: &str = "Selections";
/// Longest string a single workbook cell accepts, in characters.
const XLSX_CELL_LIMIT: usize = 32_767;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRow {
    pub name: String,
    pub path: PathBuf,
    pub cells: Vec<String>,
}

impl TableRow {
    /// Name followed by every cell.
    pub fn record(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.cells.iter().map(String::as_str))
    }
}

/// Rectangular export table: every row holds exactly `selection_columns`
/// cells, padded with empty strings.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SelectionTable {
    rows: Vec<TableRow>,
    selection_columns: usize,
}

impl SelectionTable {
    fn from_rows(mut rows: Vec<TableRow>) -> Self {
        let selection_columns = rows.iter().map(|row| row.cells.len()).max().unwrap_or(0);
        for row in &mut rows {
            row.cells.resize(selection_columns, String::new());
        }
        Self {
            rows,
            selection_columns,
        }
    }

    pub fn header(&self) -> Vec<String> {
        std::iter::once(NAME_HEADER.to_string())
            .chain((1..=self.selection_columns).map(|n| format!("Selection {n}")))
            .collect()
    }

    pub fn rows(&self) -> &[TableRow] {
        &self.rows
    }

    pub fn selection_columns(&self) -> usize {
        self.selection_columns
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct ExportReport {
    pub table: SelectionTable,
    /// Documents left out of the table entirely.
    pub skipped: Vec<SkippedDocument>,
    /// Selections whose cell was left empty because extraction failed.
    pub failed_selections: usize,
}

/// Extracts the text of every stored selection of every reachable document.
///
/// Rows follow the order of `documents`, then any other document holding
/// selections in the order the store first saw it. Documents without
/// selections are not exported; documents that are missing or fail to open
/// are skipped entirely rather than exported as blank rows.
#[instrument(skip_all)]
pub fn export_all<P>(
    provider: &P,
    store: &SelectionStore,
    documents: &DocumentSet,
) -> ExportReport
where
    P: DocumentProvider + ?Sized,
{
    let mut report = ExportReport::default();
    let mut rows = Vec::new();

    for (path, name, selections) in export_order(store, documents) {
        let backend = match open_document(provider, path) {
            Ok(backend) => backend,
            Err(reason) => {
                warn!(path = %path.display(), %reason, "skipping document in export");
                report.skipped.push(SkippedDocument {
                    path: path.to_path_buf(),
                    reason,
                });
                continue;
            }
        };

        let mut cells = Vec::with_capacity(selections.len());
        for (index, selection) in selections.iter().enumerate() {
            match extract_with(&*backend, selection) {
                Ok(text) => cells.push(text),
                Err(err) => {
                    warn!(path = %path.display(), index, %err, "leaving export cell empty");
                    report.failed_selections += 1;
                    cells.push(String::new());
                }
            }
        }

        rows.push(TableRow {
            name,
            path: path.to_path_buf(),
            cells,
        });
    }

    report.table = SelectionTable::from_rows(rows);
    info!(
        rows = report.table.rows().len(),
        columns = report.table.selection_columns(),
        skipped = report.skipped.len(),
        "export finished"
    );
    report
}

fn export_order<'a>(
    store: &'a SelectionStore,
    documents: &'a DocumentSet,
) -> Vec<(&'a Path, String, &'a [Selection])> {
    let mut ordered = Vec::new();
    for doc in documents.iter() {
        let selections = store.selections(&doc.path);
        if !selections.is_empty() {
            ordered.push((doc.path.as_path(), doc.name.clone(), selections));
        }
    }
    for (path, selections) in store.documents() {
        if !selections.is_empty() && !documents.contains(path) {
            ordered.push((path, display_name(path), selections));
        }
    }
    ordered
}

/// Returns `cell` cut to [`XLSX_CELL_LIMIT`] characters when it is longer.
fn fit_xlsx_cell(cell: &str) -> Option<&str> {
    cell.char_indices()
        .nth(XLSX_CELL_LIMIT)
        .map(|(end, _)| &cell[..end])
}

/// Writes the table as a single-sheet workbook; every cell is a string.
/// Cells over the workbook limit are truncated rather than failing the file.
pub fn write_xlsx(table: &SelectionTable, path: &Path) -> Result<()> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(WORKSHEET_NAME)?;

    let header = table.header();
    for (col, title) in header.iter().enumerate() {
        worksheet.write_string(0, u16::try_from(col)?, title)?;
    }
    for (index, row) in table.rows().iter().enumerate() {
        let row_num = u32::try_from(index + 1)?;
        for (col, cell) in row.record().enumerate() {
            let cell = match fit_xlsx_cell(cell) {
                Some(cut) => {
                    warn!(
                        document = %row.name,
                        column = %header[col],
                        chars = cell.chars().count(),
                        "cell exceeds the workbook limit; truncated"
                    );
                    cut
                }
                None => cell,
            };
            worksheet.write_string(row_num, u16::try_from(col)?, cell)?;
        }
    }

    workbook
        .save(path)
        .with_context(|| format!("failed to write workbook {:?}", path))?;
    Ok(())
}

#[derive(Serialize)]
struct JsonTable<'a> {
    columns: Vec<String>,
    rows: Vec<Vec<&'a str>>,
}

pub fn write_json<W: Write>(table: &SelectionTable, writer: W) -> Result<()> {
    let payload = JsonTable {
        columns: table.header(),
        rows: table.rows().iter().map(|row| row.record().collect()).collect(),
    };
    serde_json::to_writer_pretty(writer, &payload).context("failed to encode table as JSON")?;
    Ok(())
}
