//! Import entrypoints and implementation.
//!
//! Most callers should use [`ingest_from_path`] or [`ingest`] (from [`unified`]) which:
//!
//! - read a CSV header and map its columns onto [`fields::CanonicalField`]s
//! - convert rows into attendance records, skipping malformed rows
//! - write records to an [`crate::store::AttendanceStore`] in batches
//! - optionally report progress/failures/alerts to an [`ImportObserver`]
//!
//! Building blocks are also available under:
//! - [`csv`]: the row loop over an existing `csv::Reader`
//! - [`fields`]: header normalization and value coercion
//! - [`batch`]: the bounded batch buffer

pub mod batch;
pub mod csv;
pub mod fields;
pub mod observability;
pub mod unified;

pub use batch::BatchBuffer;
pub use observability::{
    BatchStats, CompositeObserver, FileObserver, ImportContext, ImportObserver, ImportSeverity, ImportStats,
    TracingObserver,
};
pub use unified::{DEFAULT_BATCH_SIZE, ImportOptions, ImportRequest, ingest, ingest_from_path};
