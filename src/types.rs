//! Core data model types for attendance-history import.
//!
//! An import turns CSV rows into [`AttendanceRecord`]s owned by a single [`Restaurant`] and reports
//! the outcome as an [`ImportSummary`].

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::ImportError;

/// Identifier of a restaurant (the parent entity of every attendance record).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RestaurantId(pub i64);

impl fmt::Display for RestaurantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A resolved restaurant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Restaurant {
    /// Primary key.
    pub id: RestaurantId,
    /// Display name.
    pub name: String,
}

impl Restaurant {
    /// Create a restaurant handle.
    pub fn new(id: RestaurantId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// One day of historical attendance and context data for a restaurant.
///
/// Only `restaurant_id` and `date` are required; every other field is `None` when the column was
/// absent from the file or its value could not be coerced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub restaurant_id: RestaurantId,
    pub date: NaiveDate,
    /// Observed headcount.
    pub attendance_count: Option<i64>,
    /// Occupancy in percent (0–100). The range is not enforced.
    pub occupancy_rate: Option<f64>,
    pub is_full: Option<bool>,
    pub weather_code: Option<i64>,
    pub temp_max: Option<f64>,
    pub temp_min: Option<f64>,
    pub precipitation: Option<f64>,
    pub wind_speed: Option<f64>,
    pub is_holiday: Option<bool>,
    pub is_school_vacation: Option<bool>,
    pub is_weekend: Option<bool>,
    pub holiday_name: Option<String>,
    pub vacation_name: Option<String>,
    pub day_of_week: Option<String>,
}

impl AttendanceRecord {
    /// Create a record with only the required fields set.
    pub fn new(restaurant_id: RestaurantId, date: NaiveDate) -> Self {
        Self {
            restaurant_id,
            date,
            attendance_count: None,
            occupancy_rate: None,
            is_full: None,
            weather_code: None,
            temp_max: None,
            temp_min: None,
            precipitation: None,
            wind_speed: None,
            is_holiday: None,
            is_school_vacation: None,
            is_weekend: None,
            holiday_name: None,
            vacation_name: None,
            day_of_week: None,
        }
    }
}

/// Why a row was excluded from an import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    /// The row does not have exactly as many fields as the header.
    #[serde(rename = "column count mismatch")]
    ColumnCountMismatch,
    /// The date column is missing, empty, or not a recognizable date.
    #[serde(rename = "invalid date")]
    InvalidDate,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ColumnCountMismatch => f.write_str("column count mismatch"),
            Self::InvalidDate => f.write_str("invalid date"),
        }
    }
}

/// A skipped row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowError {
    /// 1-based line on which the row starts (the header is line 1).
    pub row_number: u64,
    pub reason: SkipReason,
    /// Human-readable detail, e.g. the expected vs. actual field count or the raw date value.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub detail: Option<String>,
}

/// Category of an error that ended a run early.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FatalErrorKind {
    /// A batch write failed.
    Storage,
    /// The input stream failed mid-file.
    Read,
}

/// Marker attached to an [`ImportSummary`] when a run stopped before the end of the file.
///
/// Batches flushed before the failure stay persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FatalError {
    pub kind: FatalErrorKind,
    /// Line of the last row read before the failure, if any row was read.
    pub row_number: Option<u64>,
    /// Converted rows that were buffered but never persisted.
    pub rows_discarded: usize,
    pub message: String,
}

impl FatalError {
    pub(crate) fn from_error(err: &ImportError, row_number: Option<u64>, rows_discarded: usize) -> Self {
        let kind = match err {
            ImportError::Storage(_) => FatalErrorKind::Storage,
            _ => FatalErrorKind::Read,
        };
        Self {
            kind,
            row_number,
            rows_discarded,
            message: err.to_string(),
        }
    }
}

/// Outcome of an import run.
///
/// Invariant: `rows_skipped == errors.len()`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    /// Rows persisted by successful batch flushes.
    pub rows_processed: usize,
    /// Rows excluded because of a column count mismatch or an invalid date.
    pub rows_skipped: usize,
    /// Number of successful write operations.
    pub batches_flushed: usize,
    /// Skipped rows, in file order.
    pub errors: Vec<RowError>,
    /// Set when the run ended early.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub fatal: Option<FatalError>,
}

impl ImportSummary {
    /// `true` if the whole file was scanned and every batch was written.
    pub fn is_complete(&self) -> bool {
        self.fatal.is_none()
    }

    /// User-facing message in the format returned by the upload endpoint.
    pub fn message(&self) -> String {
        match &self.fatal {
            None => format!("Import successful. {} rows processed.", self.rows_processed),
            Some(fatal) => format!(
                "Import interrupted after {} rows processed: {}",
                self.rows_processed, fatal.message
            ),
        }
    }

    pub(crate) fn record_skip(&mut self, error: RowError) {
        self.rows_skipped += 1;
        self.errors.push(error);
    }
}
