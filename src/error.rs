use std::path::PathBuf;

use thiserror::Error;

/// Convenience result type for extraction, conversion and buffering operations.
pub type ImportResult<T> = Result<T, ImportError>;

/// Error type returned across the crate.
///
/// Every variant is fatal to the operation in progress; nothing is retried or downgraded.
/// Scalars whose text matches no numeric grammar are not errors (they become strings).
#[derive(Debug, Error)]
pub enum ImportError {
    /// Underlying I/O error (output sink, spool file, unreadable input).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Delimited-text reader error.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON (de)serialization error, e.g. a corrupted spool file or malformed matrix document.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "excel")]
    /// Workbook reader error (feature-gated behind `excel`).
    #[error("excel error: {0}")]
    Excel(#[from] calamine::Error),

    /// Unbalanced or inconsistent atom stream.
    #[error("structural error in group '{group}' at record {record}: {message}")]
    Structural {
        group: String,
        record: usize,
        message: String,
    },

    /// Matrix invariants violated (header band out of bounds, inconsistent empty shape, ...).
    #[error("invalid matrix shape: {message}")]
    Shape { message: String },

    /// No tokenizer is registered for the format key.
    #[error("unsupported format '{key}'")]
    UnsupportedFormat { key: String },

    /// The input source cannot be opened or read.
    #[error("invalid source '{}': {message}", path.display())]
    InvalidSource { path: PathBuf, message: String },

    /// A previous I/O failure left the spooled buffer unusable.
    #[error("row buffer unusable after an earlier i/o failure")]
    BufferPoisoned,
}

impl ImportError {
    pub(crate) fn shape(message: impl Into<String>) -> Self {
        Self::Shape {
            message: message.into(),
        }
    }

    pub(crate) fn structural(group: &str, record: usize, message: impl Into<String>) -> Self {
        Self::Structural {
            group: group.to_owned(),
            record,
            message: message.into(),
        }
    }
}
