//! Fault-injecting collection wrapper for exercising failure paths.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tenancy_types::{Document, Rev, TenantId};

use crate::error::{StoreError, StoreResult};
use crate::traits::Collection;

/// The collection operations a fault can be attached to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Get,
    Update,
    Delete,
    ListAll,
}

/// Wraps a collection and fails chosen operations with a backend message.
///
/// Messages go through [`StoreError::from_backend_message`], so a fault of
/// `"status 409 - conflict"` surfaces as a conflict, anything unrecognised
/// as a backend error. An optional delay is applied before every call.
pub struct FaultyCollection<T: Document> {
    inner: Arc<dyn Collection<T>>,
    faults: Mutex<HashMap<Operation, String>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl<T: Document> FaultyCollection<T> {
    pub fn new(inner: Arc<dyn Collection<T>>) -> Self {
        Self {
            inner,
            faults: Mutex::new(HashMap::new()),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Fail every `op` with `message`.
    pub fn failing(self, op: Operation, message: impl Into<String>) -> Self {
        if let Ok(mut faults) = self.faults.lock() {
            faults.insert(op, message.into());
        }
        self
    }

    /// Sleep for `delay` before every call.
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Stop failing `op`.
    pub fn heal(&self, op: Operation) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.remove(&op);
        }
    }

    /// Number of calls that reached this wrapper.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn enter(&self, op: Operation, id: &str) -> StoreResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let fault = self
            .faults
            .lock()
            .map_err(|e| StoreError::Backend(format!("lock poisoned: {e}")))?
            .get(&op)
            .cloned();
        match fault {
            Some(message) => Err(StoreError::from_backend_message(T::KIND, id, &message)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl<T: Document> Collection<T> for FaultyCollection<T> {
    async fn create(&self, doc: T) -> StoreResult<T> {
        self.enter(Operation::Create, doc.id()).await?;
        self.inner.create(doc).await
    }

    async fn get(&self, scope: &TenantId, id: &str) -> StoreResult<T> {
        self.enter(Operation::Get, id).await?;
        self.inner.get(scope, id).await
    }

    async fn update(&self, doc: T, expected: &Rev) -> StoreResult<T> {
        self.enter(Operation::Update, doc.id()).await?;
        self.inner.update(doc, expected).await
    }

    async fn delete(&self, scope: &TenantId, id: &str) -> StoreResult<T> {
        self.enter(Operation::Delete, id).await?;
        self.inner.delete(scope, id).await
    }

    async fn list_all(&self, scope: &TenantId) -> StoreResult<Vec<T>> {
        self.enter(Operation::ListAll, scope.as_str()).await?;
        self.inner.list_all(scope).await
    }
}
