//! `affluence-import` ingests historical restaurant attendance ("affluence") data from CSV files
//! into a persistent store, one restaurant at a time.
//!
//! The primary entrypoints are [`ingestion::ingest_from_path`] (an uploaded file on disk) and
//! [`ingestion::ingest`] (any `std::io::Read`).
//!
//! ## What an import does
//!
//! 1. Reads the header row and matches its columns (trimmed, case-insensitive) against the fixed
//!    set of [`ingestion::fields::CanonicalField`]s. Unknown columns are ignored.
//! 2. Converts each data row into a [`types::AttendanceRecord`] attached to the given
//!    [`types::Restaurant`].
//! 3. Writes records to a [`store::AttendanceStore`] in batches (20 by default).
//! 4. Returns an [`types::ImportSummary`]: rows processed, rows skipped, and why.
//!
//! Imports are best-effort:
//!
//! - a row with the wrong number of fields, or without a parseable date, is skipped and reported;
//! - any other field that fails to parse is stored as null;
//! - a failed batch write stops the run, but batches already written stay written;
//! - only an empty/unreadable header rejects the file outright ([`ImportError::Format`]).
//!
//! Imports append: running the same file twice stores every row twice.
//!
//! ## Quick example
//!
//! ```rust
//! use affluence_import::ingestion::{ingest, ImportOptions};
//! use affluence_import::store::MemoryStore;
//! use affluence_import::types::{Restaurant, RestaurantId, SkipReason};
//!
//! # fn main() -> Result<(), affluence_import::ImportError> {
//! let restaurant = Restaurant::new(RestaurantId(7), "Le Bistrot");
//! let mut store = MemoryStore::new();
//!
//! let csv = "\
//! Date_Historique, Affluence, tmax, is_holiday
//! 2024-07-14,310,31.5,yes
//! not-a-date,12,20.0,no
//! 2024-07-15,95,abc,0
//! ";
//! let summary = ingest(csv.as_bytes(), &restaurant, &mut store, &ImportOptions::default())?;
//!
//! assert_eq!(summary.rows_processed, 2);
//! assert_eq!(summary.rows_skipped, 1);
//! assert_eq!(summary.errors[0].reason, SkipReason::InvalidDate);
//! // Unparseable optional values become null instead of rejecting the row.
//! assert_eq!(store.records()[1].temp_max, None);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`ingestion`]: entrypoints, options, header mapping, batching, observers
//! - [`store`]: the store/resolver traits plus in-memory and SQLite implementations
//! - [`types`]: records, restaurants and summaries
//! - [`response`]: rendering an outcome as the upload endpoint's JSON body
//! - [`error`]: error types used across the crate

pub mod error;
pub mod ingestion;
pub mod response;
pub mod store;
pub mod types;

pub use error::{ImportError, ImportResult, StorageError};
