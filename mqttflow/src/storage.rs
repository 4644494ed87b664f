//! Storage contract for sessions, retained messages and wills.

use bytestring::ByteString;
use dashmap::DashMap;

/// Keyed CRUD store the flows persist their entities through.
///
/// Implementations must provide per-entity atomicity: a reader never observes
/// a partially written value, and concurrent writers for the same key are
/// serialized. Cross-entity transactions are not required.
pub trait Repository<T>: Send + Sync {
    fn create(&self, key: ByteString, entity: T);
    fn read(&self, key: &str) -> Option<T>;
    fn update(&self, key: ByteString, entity: T);
    /// Removes and returns the entity, if present.
    fn delete(&self, key: &str) -> Option<T>;
    fn read_all(&self) -> Vec<(ByteString, T)>;
}

/// Concurrent in-memory repository, the default backing store for tests and
/// embedders without external persistence.
#[derive(Debug)]
pub struct MemoryRepository<T> {
    entries: DashMap<ByteString, T>,
}

impl<T> Default for MemoryRepository<T> {
    fn default() -> Self {
        Self { entries: DashMap::default() }
    }
}

impl<T: Clone + Send + Sync> Repository<T> for MemoryRepository<T> {
    fn create(&self, key: ByteString, entity: T) {
        self.entries.insert(key, entity);
    }

    fn read(&self, key: &str) -> Option<T> {
        self.entries.get(key).map(|e| e.value().clone())
    }

    fn update(&self, key: ByteString, entity: T) {
        self.entries.insert(key, entity);
    }

    fn delete(&self, key: &str) -> Option<T> {
        self.entries.remove(key).map(|(_, e)| e)
    }

    fn read_all(&self) -> Vec<(ByteString, T)> {
        self.entries.iter().map(|e| (e.key().clone(), e.value().clone())).collect()
    }
}
