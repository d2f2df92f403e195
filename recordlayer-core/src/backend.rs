//! Storage backend abstraction for the record store.
//!
//! A backend executes the four persistence verbs against named collections of raw
//! documents. It knows nothing about records, type tags or registries; all mapping
//! happens in [`Store`](crate::store::Store).
//!
//! # Traits
//!
//! - [`StoreBackend`]: The core trait for storage backends
//! - [`StoreBackendBuilder`]: Factory trait for creating backend instances

use async_trait::async_trait;
use bson::{Bson, Document, oid::ObjectId};
use std::fmt::Debug;

use crate::{error::StoreResult, query::FindQuery};

/// Abstract interface for document storage backends.
///
/// # Thread Safety
///
/// One backend instance is shared by every record type and every call, so
/// implementations must be safe for concurrent use. No per-request state may be kept
/// on the backend itself.
///
/// # Error Handling
///
/// Backends report connectivity problems as
/// [`StoreError::Connection`](crate::error::StoreError::Connection) and query shapes
/// they cannot execute as [`StoreError::Unsupported`](crate::error::StoreError::Unsupported).
/// A missing document is never an error: finders return fewer documents and the write
/// verbs report a count of zero.
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Returns the documents of `collection` matching `query`, in the query's sort
    /// order (natural storage order when it has none), at most `query.limit` of them.
    ///
    /// Every returned document includes its `_id`.
    async fn find_documents(
        &self,
        collection: &str,
        query: &FindQuery,
    ) -> StoreResult<Vec<Document>>;

    /// Inserts a new document and returns the identifier the store assigned.
    ///
    /// Returns `Ok(None)` when the write was not acknowledged.
    async fn insert_document(
        &self,
        collection: &str,
        document: Document,
    ) -> StoreResult<Option<Bson>>;

    /// Replaces the whole document stored under `id`, keeping the identifier.
    ///
    /// Returns the number of documents matched (0 or 1).
    async fn replace_document(
        &self,
        collection: &str,
        id: &ObjectId,
        document: Document,
    ) -> StoreResult<u64>;

    /// Removes the document stored under `id`.
    ///
    /// Returns the number of documents removed (0 or 1).
    async fn delete_document(&self, collection: &str, id: &ObjectId) -> StoreResult<u64>;
}

#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> StoreResult<Self::Backend>;
}
