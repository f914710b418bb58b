//! Revisioned document store client for tenant provisioning.
//!
//! Every resource kind lives in its own [`Collection`], a typed wrapper over
//! a document datastore with CouchDB-style revision tokens. Writes are
//! compare-and-swap against an explicit expected revision; the store is the
//! single arbiter of write ordering.
//!
//! # Errors
//!
//! [`StoreError`] keeps NotFound and Conflict distinguishable from every
//! other failure, and [`StoreError::class`] reduces any error to an
//! [`ErrorClass`]. Backends that only report message text go through
//! [`StoreError::from_backend_message`].
//!
//! # Backends
//!
//! - [`InMemoryCollection`] -- `HashMap`-based collection for tests, the
//!   CLI, and embedding
//! - [`FaultyCollection`] -- wrapper that injects failures and latency
//!   (`testing` feature)
//!
//! [`Datastore`] bundles one collection per kind; [`BaselineStore`] adds
//! per-hour addressing on top of the metric baseline collection.

pub mod baseline;
pub mod datastore;
pub mod error;
pub mod memory;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod traits;

pub use baseline::{BaselineReader, BaselineStore};
pub use datastore::{Datastore, HasCollection};
pub use error::{ErrorClass, StoreError, StoreResult};
pub use memory::InMemoryCollection;
#[cfg(any(test, feature = "testing"))]
pub use testing::{FaultyCollection, Operation};
pub use traits::Collection;
