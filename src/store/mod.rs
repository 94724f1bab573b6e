//! Persistence collaborators for imports.
//!
//! The import pipeline only ever appends: it needs an [`AttendanceStore`] to write batches, and
//! callers use a [`RestaurantResolver`] to turn an id into the [`Restaurant`] they import for.
//!
//! Implementations:
//! - [`MemoryStore`]: in-process, records every batch (tests, dry runs)
//! - [`SqliteStore`]: SQLite-backed (feature `sqlite`, on by default)

mod memory;
#[cfg(feature = "sqlite")]
mod sqlite;

pub use memory::MemoryStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

use crate::error::{ImportResult, StorageError};
use crate::types::{AttendanceRecord, Restaurant, RestaurantId};

/// Append-only sink for attendance records.
///
/// Each call to [`AttendanceStore::append_batch`] is one atomic write: either every record in the
/// slice is persisted or none is.
pub trait AttendanceStore {
    fn append_batch(&mut self, records: &[AttendanceRecord]) -> Result<(), StorageError>;
}

impl<S: AttendanceStore + ?Sized> AttendanceStore for &mut S {
    fn append_batch(&mut self, records: &[AttendanceRecord]) -> Result<(), StorageError> {
        (**self).append_batch(records)
    }
}

impl<S: AttendanceStore + ?Sized> AttendanceStore for Box<S> {
    fn append_batch(&mut self, records: &[AttendanceRecord]) -> Result<(), StorageError> {
        (**self).append_batch(records)
    }
}

/// Looks up the parent restaurant of an import.
pub trait RestaurantResolver {
    /// Returns [`crate::ImportError::RestaurantNotFound`] if no restaurant has this id.
    fn resolve_restaurant(&self, id: RestaurantId) -> ImportResult<Restaurant>;
}
