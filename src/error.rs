use thiserror::Error;

use crate::types::RestaurantId;

/// Convenience result type for import operations.
pub type ImportResult<T> = Result<T, ImportError>;

/// Error type returned by import functions.
///
/// Row-level problems (wrong column count, bad date) are never returned here: they are recorded in
/// the [`crate::types::ImportSummary`] and the run continues.
#[derive(Debug, Error)]
pub enum ImportError {
    /// Underlying I/O error (e.g. file not found, permission denied).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV reader error while scanning data rows.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// The input is empty or its header row cannot be read.
    #[error("format error: {message}")]
    Format { message: String },

    /// The uploaded file is not a `.csv` file.
    #[error("unsupported file type: {path} (expected a .csv file)")]
    UnsupportedFileType { path: String },

    /// [`crate::ingestion::ImportOptions`] failed validation.
    #[error("invalid import options: {message}")]
    InvalidOptions { message: String },

    /// The parent restaurant could not be resolved.
    #[error("restaurant {id} not found")]
    RestaurantNotFound { id: RestaurantId },

    /// The persistent store rejected a write.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Error returned by [`crate::store::AttendanceStore`] implementations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[cfg(feature = "sqlite")]
    /// SQLite error (feature-gated behind `sqlite`).
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The store refused the batch for a backend-specific reason.
    #[error("batch rejected: {message}")]
    Rejected { message: String },
}
