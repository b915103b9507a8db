// src/error.rs

use std::path::PathBuf;

use thiserror::Error;

/// Failures that abort a pipeline run.
///
/// Recoverable conditions (unparseable dates, lookup misses, reference tables
/// that fail to load) are logged where they happen and never reach this type.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{label} not found → {}", path.display())]
    NotFound { label: &'static str, path: PathBuf },

    #[error("failed to read spreadsheet {}: {message}", path.display())]
    Spreadsheet { path: PathBuf, message: String },

    #[error("failed to write spreadsheet {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: rust_xlsxwriter::XlsxError,
    },

    #[error("invalid extraction JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serial store error: {0}")]
    Serial(#[from] rusqlite::Error),

    #[error("extraction failed: {0}")]
    Extraction(String),

    #[error("template error: {0}")]
    Template(String),
}

impl PipelineError {
    pub fn not_found(label: &'static str, path: impl Into<PathBuf>) -> Self {
        Self::NotFound {
            label,
            path: path.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Fail fast with [`PipelineError::NotFound`] when `path` does not exist.
pub fn require_file(label: &'static str, path: &std::path::Path) -> Result<(), PipelineError> {
    if path.exists() {
        Ok(())
    } else {
        Err(PipelineError::not_found(label, path))
    }
}
