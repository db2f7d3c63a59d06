//! Failures that abort an extraction run.
//!
//! Per-chunk, per-entry and per-write problems never show up here: they are
//! logged and reported through [`crate::models::ExtractionSummary`] instead.

use std::path::PathBuf;

use thiserror::Error;

/// Fatal extraction error.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The input path does not name an existing file.
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),
    /// The input is neither a PNG card nor a ZIP archive.
    #[error(
        "unsupported container format: {} (expected a PNG card or a charx archive)",
        .0.display()
    )]
    UnsupportedFormat(PathBuf),
    /// The charx archive could not be opened or unpacked.
    #[error("corrupt charx archive {}: {source}", path.display())]
    ArchiveCorrupt {
        /// Archive being unpacked.
        path: PathBuf,
        /// Underlying archive error.
        #[source]
        source: zip::result::ZipError,
    },
    /// Filesystem failure outside of individual asset writes.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// Path the operation was acting on.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl ExtractError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result alias used by the extraction pipeline.
pub type ExtractResult<T> = Result<T, ExtractError>;
