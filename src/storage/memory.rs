//! In-memory document store
//!
//! Keeps every collection as an insertion-ordered vector. Used by the
//! `memory` backend and throughout the test suite, where injected failures
//! exercise the engine's partial-failure handling.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{take_requested_id, Collection, DocumentStore, Fields, Record, StoreError, StoreResult};

/// Failure injected into writes against one record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectedFailure {
    /// Every write times out
    Timeout,
    /// The next `n` writes time out, later ones succeed
    TimeoutTimes(u32),
    /// Writes report the record as missing
    NotFound,
}

/// In-memory implementation of [`DocumentStore`]
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<Collection, Vec<Record>>>,
    write_failures: RwLock<HashMap<(Collection, String), InjectedFailure>>,
    list_failures: RwLock<Vec<Collection>>,
    writes: AtomicUsize,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a collection with documents (builder style)
    pub fn with_collection(mut self, collection: Collection, docs: impl IntoIterator<Item = Fields>) -> Self {
        let records = self.collections.get_mut().entry(collection).or_default();
        for mut fields in docs {
            let id = take_requested_id(&mut fields).unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
            records.push(Record::new(id, fields));
        }
        self
    }

    /// Make writes against a record fail
    pub async fn fail_writes(&self, collection: Collection, id: &str, failure: InjectedFailure) {
        self.write_failures
            .write()
            .await
            .insert((collection, id.to_string()), failure);
    }

    /// Make listing a collection fail with a timeout
    pub async fn fail_listing(&self, collection: Collection) {
        self.list_failures.write().await.push(collection);
    }

    /// Remove all injected failures
    pub async fn clear_failures(&self) {
        self.write_failures.write().await.clear();
        self.list_failures.write().await.clear();
    }

    /// Get one record by id
    pub async fn get(&self, collection: Collection, id: &str) -> Option<Record> {
        self.collections
            .read()
            .await
            .get(&collection)
            .and_then(|records| records.iter().find(|r| r.id == id).cloned())
    }

    /// Number of records in a collection
    pub async fn len(&self, collection: Collection) -> usize {
        self.collections
            .read()
            .await
            .get(&collection)
            .map_or(0, Vec::len)
    }

    /// Number of successful writes (patch, create, delete) since creation
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    async fn check_write(&self, collection: Collection, id: &str, operation: &str) -> StoreResult<()> {
        let mut failures = self.write_failures.write().await;
        let key = (collection, id.to_string());
        match failures.get(&key).copied() {
            None => Ok(()),
            Some(InjectedFailure::Timeout) => Err(StoreError::timeout(operation)),
            Some(InjectedFailure::NotFound) => Err(StoreError::not_found(collection, id)),
            Some(InjectedFailure::TimeoutTimes(remaining)) => {
                if remaining <= 1 {
                    failures.remove(&key);
                } else {
                    failures.insert(key, InjectedFailure::TimeoutTimes(remaining - 1));
                }
                Err(StoreError::timeout(operation))
            }
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn list_all(&self, collection: Collection) -> StoreResult<Vec<Record>> {
        if self.list_failures.read().await.contains(&collection) {
            return Err(StoreError::timeout(format!("list {collection}")));
        }
        Ok(self
            .collections
            .read()
            .await
            .get(&collection)
            .cloned()
            .unwrap_or_default())
    }

    async fn patch(&self, collection: Collection, id: &str, mut updates: Fields) -> StoreResult<()> {
        self.check_write(collection, id, "patch").await?;
        updates.remove(super::ID_FIELD);

        let mut collections = self.collections.write().await;
        let record = collections
            .get_mut(&collection)
            .and_then(|records| records.iter_mut().find(|r| r.id == id))
            .ok_or_else(|| StoreError::not_found(collection, id))?;

        for (key, value) in updates {
            record.fields.insert(key, value);
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn create_record(&self, collection: Collection, mut fields: Fields) -> StoreResult<String> {
        let id = take_requested_id(&mut fields).unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        self.check_write(collection, &id, "create").await?;

        let mut collections = self.collections.write().await;
        let records = collections.entry(collection).or_default();
        if records.iter().any(|r| r.id == id) {
            return Err(StoreError::Conflict { collection, id });
        }
        records.push(Record::new(id.clone(), fields));
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(id)
    }

    async fn delete_record(&self, collection: Collection, id: &str) -> StoreResult<()> {
        self.check_write(collection, id, "delete").await?;

        let mut collections = self.collections.write().await;
        let records = collections
            .get_mut(&collection)
            .ok_or_else(|| StoreError::not_found(collection, id))?;
        let position = records
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| StoreError::not_found(collection, id))?;
        records.remove(position);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
