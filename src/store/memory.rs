use crate::error::{ImportError, ImportResult, StorageError};
use crate::types::{AttendanceRecord, Restaurant, RestaurantId};

use super::{AttendanceStore, RestaurantResolver};

/// In-memory store.
///
/// Keeps every appended record plus the size of each batch, in write order.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    restaurants: Vec<Restaurant>,
    records: Vec<AttendanceRecord>,
    batch_sizes: Vec<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a restaurant so it can be resolved.
    pub fn with_restaurant(mut self, restaurant: Restaurant) -> Self {
        self.restaurants.push(restaurant);
        self
    }

    /// All persisted records, in write order.
    pub fn records(&self) -> &[AttendanceRecord] {
        &self.records
    }

    /// Size of every successful `append_batch` call, in order.
    pub fn batch_sizes(&self) -> &[usize] {
        &self.batch_sizes
    }

    /// Records belonging to one restaurant.
    pub fn history_for(&self, id: RestaurantId) -> impl Iterator<Item = &AttendanceRecord> {
        self.records.iter().filter(move |r| r.restaurant_id == id)
    }
}

impl AttendanceStore for MemoryStore {
    fn append_batch(&mut self, records: &[AttendanceRecord]) -> Result<(), StorageError> {
        self.records.extend_from_slice(records);
        self.batch_sizes.push(records.len());
        Ok(())
    }
}

impl RestaurantResolver for MemoryStore {
    fn resolve_restaurant(&self, id: RestaurantId) -> ImportResult<Restaurant> {
        self.restaurants
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or(ImportError::RestaurantNotFound { id })
    }
}
