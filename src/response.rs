//! Rendering of import outcomes for the upload endpoint.

use serde::Serialize;

use crate::error::{ImportError, ImportResult};
use crate::types::ImportSummary;

/// Body and status code returned to the client after an upload.
///
/// Serializes as `{"message": ..., "summary": {...}}`; the status code is for the HTTP layer and
/// is not part of the body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportResponse {
    #[serde(skip)]
    pub status: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<ImportSummary>,
}

impl ImportResponse {
    /// Map an import outcome to a response.
    pub fn from_outcome(outcome: &ImportResult<ImportSummary>) -> Self {
        match outcome {
            Ok(summary) => Self {
                status: if summary.is_complete() { 200 } else { 500 },
                message: summary.message(),
                summary: Some(summary.clone()),
            },
            Err(err) => Self::from_error(err),
        }
    }

    fn from_error(err: &ImportError) -> Self {
        let (status, message) = match err {
            ImportError::UnsupportedFileType { .. } => {
                (400, "Invalid file type. Please upload a CSV file.".to_string())
            }
            ImportError::Format { .. } => (400, "Empty file or read error".to_string()),
            ImportError::RestaurantNotFound { .. } => (404, "Restaurant not found for this user".to_string()),
            ImportError::InvalidOptions { .. } => (400, err.to_string()),
            ImportError::Io(_) => (500, "Could not open file".to_string()),
            ImportError::Csv(_) | ImportError::Storage(_) => (500, err.to_string()),
        };
        Self {
            status,
            message,
            summary: None,
        }
    }

    /// Serialize the body as JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl From<ImportResult<ImportSummary>> for ImportResponse {
    fn from(outcome: ImportResult<ImportSummary>) -> Self {
        Self::from_outcome(&outcome)
    }
}
