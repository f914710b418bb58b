use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use tenancy_types::{new_resource_id, now_millis, Cardinality, Document, Rev, TenantId};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::traits::Collection;

type Key = (TenantId, String);

/// In-memory, HashMap-based revisioned collection.
///
/// Intended for tests, the CLI, and embedding. Documents are held behind a
/// `RwLock`; the revision comparison and the write happen under the same
/// write guard, so concurrent updates against one document resolve to
/// exactly one winner.
pub struct InMemoryCollection<T> {
    docs: RwLock<HashMap<Key, T>>,
    _kind: PhantomData<fn() -> T>,
}

impl<T: Document> InMemoryCollection<T> {
    /// Create a new empty collection.
    pub fn new() -> Self {
        Self {
            docs: RwLock::new(HashMap::new()),
            _kind: PhantomData,
        }
    }

    /// Number of documents across all scopes.
    pub fn len(&self) -> usize {
        self.docs.read().map(|d| d.len()).unwrap_or(0)
    }

    /// Returns `true` if the collection holds no documents.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, HashMap<Key, T>>> {
        self.docs
            .read()
            .map_err(|e| StoreError::Backend(format!("lock poisoned: {e}")))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, HashMap<Key, T>>> {
        self.docs
            .write()
            .map_err(|e| StoreError::Backend(format!("lock poisoned: {e}")))
    }
}

impl<T: Document> Default for InMemoryCollection<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: Document> Collection<T> for InMemoryCollection<T> {
    async fn create(&self, mut doc: T) -> StoreResult<T> {
        let kind = T::KIND;
        let scope = doc.scope();
        let mut docs = self.write()?;

        if kind.cardinality() == Cardinality::SingletonPerTenant
            && docs.keys().any(|(s, _)| *s == scope)
        {
            return Err(StoreError::conflict(
                kind,
                doc.id(),
                format!("{} already exists for tenant {scope}", kind.display_name()),
            ));
        }

        if doc.id().is_empty() {
            doc.meta_mut().id = new_resource_id();
        }
        let key = (scope, doc.id().to_string());
        if docs.contains_key(&key) {
            return Err(StoreError::conflict(kind, doc.id(), "already exists"));
        }

        let now = now_millis();
        let meta = doc.meta_mut();
        meta.datatype = kind.datatype().to_string();
        meta.rev = Rev::initial();
        meta.created_timestamp = now;
        meta.last_modified_timestamp = now;

        debug!(kind = %kind, id = %doc.id(), rev = %doc.rev(), "document created");
        docs.insert(key, doc.clone());
        Ok(doc)
    }

    async fn get(&self, scope: &TenantId, id: &str) -> StoreResult<T> {
        let docs = self.read()?;
        docs.get(&(scope.clone(), id.to_string()))
            .cloned()
            .ok_or_else(|| StoreError::not_found(T::KIND, id))
    }

    async fn update(&self, mut doc: T, expected: &Rev) -> StoreResult<T> {
        let kind = T::KIND;
        let key = (doc.scope(), doc.id().to_string());
        let mut docs = self.write()?;

        let stored = docs
            .get(&key)
            .ok_or_else(|| StoreError::not_found(kind, doc.id()))?;
        if stored.rev() != expected {
            return Err(StoreError::conflict(
                kind,
                doc.id(),
                format!("expected revision {expected}, stored {}", stored.rev()),
            ));
        }

        let created = stored.meta().created_timestamp;
        let next = stored.rev().next();
        let meta = doc.meta_mut();
        meta.datatype = kind.datatype().to_string();
        meta.rev = next;
        meta.created_timestamp = created;
        meta.last_modified_timestamp = now_millis();

        debug!(kind = %kind, id = %doc.id(), rev = %doc.rev(), "document updated");
        docs.insert(key, doc.clone());
        Ok(doc)
    }

    async fn delete(&self, scope: &TenantId, id: &str) -> StoreResult<T> {
        let kind = T::KIND;
        let mut docs = self.write()?;
        let removed = docs
            .remove(&(scope.clone(), id.to_string()))
            .ok_or_else(|| StoreError::not_found(kind, id))?;
        debug!(kind = %kind, id, "document deleted");
        Ok(removed)
    }

    async fn list_all(&self, scope: &TenantId) -> StoreResult<Vec<T>> {
        let docs = self.read()?;
        let mut found: Vec<T> = docs
            .iter()
            .filter(|((s, _), _)| s == scope)
            .map(|(_, d)| d.clone())
            .collect();
        found.sort_by(|a, b| a.id().cmp(b.id()));
        Ok(found)
    }
}

impl<T: Document> std::fmt::Debug for InMemoryCollection<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryCollection")
            .field("kind", &T::KIND)
            .field("document_count", &self.len())
            .finish()
    }
}
