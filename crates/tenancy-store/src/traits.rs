use async_trait::async_trait;
use tenancy_types::{Document, Rev, TenantId};

use crate::error::StoreResult;

/// A revisioned collection of one document kind.
///
/// All implementations must satisfy these invariants:
/// - Every successful write assigns a new revision token.
/// - `update` is a compare-and-swap: it succeeds only when `expected`
///   equals the currently stored revision, and otherwise fails with
///   [`StoreError::Conflict`](crate::StoreError::Conflict) without touching
///   the stored document.
/// - Lookups distinguish a missing document
///   ([`StoreError::NotFound`](crate::StoreError::NotFound)) from every other
///   failure.
/// - Kinds with singleton-per-tenant cardinality reject a second create in
///   the same scope with a conflict.
///
/// Documents are keyed by `(scope, id)`, where scope is the owning tenant or
/// the global scope for tenants themselves (see [`Document::scope`]).
#[async_trait]
pub trait Collection<T: Document>: Send + Sync {
    /// Store a new document and return it with its ID, revision, and
    /// timestamps filled in. An ID is generated when the document has none.
    async fn create(&self, doc: T) -> StoreResult<T>;

    /// Read one document.
    async fn get(&self, scope: &TenantId, id: &str) -> StoreResult<T>;

    /// Replace a document if its stored revision equals `expected`.
    async fn update(&self, doc: T, expected: &Rev) -> StoreResult<T>;

    /// Remove a document and return its last stored state.
    async fn delete(&self, scope: &TenantId, id: &str) -> StoreResult<T>;

    /// Every document in the scope, ordered by ID. May be empty.
    async fn list_all(&self, scope: &TenantId) -> StoreResult<Vec<T>>;
}
