use std::path::PathBuf;

use thiserror::Error;

/// Document-level failures. Batch operations skip the affected document and
/// carry on with the rest.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("document {path:?} no longer exists")]
    FileMissing { path: PathBuf },

    #[error("failed to open {path:?}: {source:#}")]
    OpenFailure {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },
}

/// Failures while extracting the text under a single selection. An empty
/// extraction is not an error.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error("page {page} does not exist (document has {page_count} pages)")]
    PageIndex { page: usize, page_count: usize },

    #[error("text extraction failed on page {page}: {source:#}")]
    Backend {
        page: usize,
        #[source]
        source: anyhow::Error,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectionError {
    #[error("no document is active")]
    NoActiveDocument,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path:?}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path:?}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}
