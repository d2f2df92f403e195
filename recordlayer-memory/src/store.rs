//! In-memory storage implementation for the record store.
//!
//! This module provides a simple in-memory backend that keeps documents in
//! per-collection maps behind an async-safe read-write lock.

use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};
use async_trait::async_trait;
use mea::rwlock::RwLock;
use bson::{Bson, Document, oid::ObjectId};
use tracing::trace;

use recordlayer_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    document::ID_FIELD,
    error::{StoreError, StoreResult},
    query::{Expr, FindQuery},
};

use crate::evaluator::{DocumentEvaluator, compare_documents};

type CollectionMap = BTreeMap<ObjectId, Document>;
type StoreMap = HashMap<String, CollectionMap>;

/// Thread-safe in-memory document storage backend.
///
/// Documents are keyed by their ObjectId, so natural order is insertion order for
/// generated identifiers. Collections spring into existence on first insert; a missing
/// collection behaves as an empty one.
///
/// # Thread Safety
///
/// `InMemoryStore` is cloneable and uses an `Arc`-wrapped internal state. Multiple clones
/// of the same instance share the same underlying data, which lets tests keep a handle
/// for inspection after handing the store to a [`Store`](recordlayer_core::store::Store).
///
/// # Queries
///
/// Filters are parsed strictly: an operator this backend does not evaluate fails the
/// query with [`StoreError::Unsupported`] rather than being ignored. Queries scan every
/// document of the collection.
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    /// collection name -> (identifier -> document)
    store: Arc<RwLock<StoreMap>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory document store.
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(StoreMap::new())),
        }
    }

    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }

    /// Returns a snapshot of the raw documents of `collection` in natural order.
    pub async fn documents(&self, collection: &str) -> Vec<Document> {
        self.store
            .read()
            .await
            .get(collection)
            .map(|documents| documents.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Returns the names of the collections holding at least one document.
    pub async fn collection_names(&self) -> Vec<String> {
        let mut names = self.store
            .read()
            .await
            .iter()
            .filter(|(_, documents)| !documents.is_empty())
            .map(|(name, _)| name.clone())
            .collect::<Vec<_>>();

        names.sort();
        names
    }
}

/// Rebuilds `document` with `_id` as its first field.
fn with_id(id: ObjectId, document: Document) -> Document {
    let mut stored = Document::new();
    stored.insert(ID_FIELD, id);

    for (key, value) in document {
        if key != ID_FIELD {
            stored.insert(key, value);
        }
    }

    stored
}

#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn find_documents(
        &self,
        collection: &str,
        query: &FindQuery,
    ) -> StoreResult<Vec<Document>> {
        let expr = Expr::parse(&query.filter)?;
        let sort = query.sort_keys()?;

        let store = self.store.read().await;
        let Some(collection_map) = store.get(collection) else {
            return Ok(Vec::new());
        };

        let mut documents = DocumentEvaluator::filter_documents(collection_map.values(), &expr)?;
        drop(store);

        if !sort.is_empty() {
            documents.sort_by(|a, b| compare_documents(a, b, &sort));
        }

        if let Some(limit) = query.limit {
            documents.truncate(limit);
        }

        trace!(collection, matched = documents.len(), "evaluated in-memory query");

        Ok(documents)
    }

    async fn insert_document(
        &self,
        collection: &str,
        document: Document,
    ) -> StoreResult<Option<Bson>> {
        let id = match document.get(ID_FIELD) {
            Some(Bson::ObjectId(id)) => *id,
            Some(other) => {
                return Err(StoreError::InvalidDocument(format!(
                    "{ID_FIELD} must be an ObjectId, got {other}"
                )));
            }
            None => ObjectId::new(),
        };

        let mut store = self.store.write().await;
        let collection_map = store
            .entry(collection.to_string())
            .or_default();

        if collection_map.contains_key(&id) {
            return Err(StoreError::DocumentAlreadyExists(id.to_hex(), collection.to_string()));
        }

        collection_map.insert(id, with_id(id, document));
        trace!(collection, %id, "stored document");

        Ok(Some(Bson::ObjectId(id)))
    }

    async fn replace_document(
        &self,
        collection: &str,
        id: &ObjectId,
        document: Document,
    ) -> StoreResult<u64> {
        let mut store = self.store.write().await;
        let Some(stored) = store
            .get_mut(collection)
            .and_then(|collection_map| collection_map.get_mut(id))
        else {
            return Ok(0);
        };

        *stored = with_id(*id, document);

        Ok(1)
    }

    async fn delete_document(&self, collection: &str, id: &ObjectId) -> StoreResult<u64> {
        let mut store = self.store.write().await;
        let removed = store
            .get_mut(collection)
            .and_then(|collection_map| collection_map.remove(id));

        Ok(removed.map_or(0, |_| 1))
    }
}

/// Builder for creating [`InMemoryStore`] instances.
#[derive(Default)]
pub struct InMemoryStoreBuilder;

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    async fn build(self) -> StoreResult<Self::Backend> {
        Ok(InMemoryStore::new())
    }
}
