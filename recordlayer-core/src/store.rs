//! The record store: mapping between records and documents plus the persistence verbs.
//!
//! [`Store`] owns one backend and one [`RecordRegistry`]. It is stateless between calls:
//! filter, sort and limit arrive with every query as a [`FindOptions`] value, so a single
//! store can be shared freely across tasks.
//!
//! A store is either used directly or installed once as the process-wide instance that
//! the active-record methods of [`RecordExt`](crate::lifecycle::RecordExt) reach for.
//!
//! # Example
//!
//! ```ignore
//! use recordlayer::{prelude::*, memory::InMemoryStore};
//!
//! let store = Store::builder(InMemoryStore::new())
//!     .register::<Widget>()
//!     .build()
//!     .install();
//!
//! let widgets = store.find(Widget::collection_name(), FindOptions::new()).await?;
//! ```

use bson::{Bson, doc, oid::ObjectId};
use std::sync::OnceLock;
use tracing::{debug, warn};

use crate::{
    backend::StoreBackend,
    document::{ID_FIELD, object_id_of},
    error::{StoreError, StoreResult},
    query::{DEFAULT_LIMIT, FindOptions, FindQuery},
    record::{AnyRecord, Record},
    registry::RecordRegistry,
};

static GLOBAL_STORE: OnceLock<Store> = OnceLock::new();

/// Maps records to documents and executes find/insert/update/delete on a backend.
#[derive(Debug)]
pub struct Store {
    backend: Box<dyn StoreBackend>,
    registry: RecordRegistry,
    default_limit: usize,
}

impl Store {
    /// Creates a builder around a backend.
    pub fn builder(backend: impl StoreBackend + 'static) -> StoreBuilder {
        StoreBuilder::new(backend)
    }

    /// Installs this store as the process-wide instance and returns it.
    ///
    /// Only the first installation takes effect; later calls drop their store and
    /// return the instance already installed.
    pub fn install(self) -> &'static Store {
        let mut installed_now = false;
        let installed = GLOBAL_STORE.get_or_init(|| {
            installed_now = true;
            self
        });

        if !installed_now {
            warn!("record store already installed, keeping the existing instance");
        }

        installed
    }

    /// Returns the process-wide store.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Uninitialized`] before [`install`](Self::install) was called.
    pub fn global() -> StoreResult<&'static Store> {
        GLOBAL_STORE.get().ok_or(StoreError::Uninitialized)
    }

    /// Returns the registry used to reconstruct records.
    pub fn registry(&self) -> &RecordRegistry {
        &self.registry
    }

    /// Returns the number of records a query returns when it sets no limit.
    pub fn default_limit(&self) -> usize {
        self.default_limit
    }

    /// Returns the records of `collection` matching `options`.
    ///
    /// Each document is rebuilt from its type tag through the registry; document fields
    /// the concrete type has no setter for are skipped.
    ///
    /// # Errors
    ///
    /// - [`StoreError::InvalidArgument`] for a malformed filter or sort
    /// - [`StoreError::UnregisteredType`] / [`StoreError::InvalidDocument`] for a
    ///   document that cannot be rebuilt
    /// - any backend error, unchanged
    pub async fn find(
        &self,
        collection: &str,
        options: FindOptions,
    ) -> StoreResult<Vec<Box<dyn AnyRecord>>> {
        let query = FindQuery::resolve(options, self.default_limit)?;

        debug!(
            collection,
            filter = %query.filter,
            sort = %query.sort,
            limit = ?query.limit,
            "finding records"
        );

        self.backend
            .find_documents(collection, &query)
            .await?
            .into_iter()
            .map(|document| {
                object_id_of(&document)?;
                self.registry.reconstruct(document)
            })
            .collect()
    }

    /// Returns the first record of `collection` matching `options`, if any.
    ///
    /// The limit of `options` is ignored.
    pub async fn find_one(
        &self,
        collection: &str,
        options: FindOptions,
    ) -> StoreResult<Option<Box<dyn AnyRecord>>> {
        let options = FindOptions {
            limit: Some(1),
            ..options
        };

        Ok(self.find(collection, options).await?.into_iter().next())
    }

    /// Returns the record of `collection` stored under `id`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidArgument`] if `id` is not a well-formed ObjectId
    /// hex string.
    pub async fn find_by_id(
        &self,
        collection: &str,
        id: &str,
    ) -> StoreResult<Option<Box<dyn AnyRecord>>> {
        let id = parse_id(id)?;

        self.find_one(collection, FindOptions::matching(doc! { ID_FIELD: id }))
            .await
    }

    /// Inserts a new document for `record` into its collection.
    ///
    /// Returns the identifier the backend assigned, or `None` if the write was not
    /// acknowledged. The record itself is not modified.
    ///
    /// # Errors
    ///
    /// - [`StoreError::UnregisteredType`] if the record or one of its nested records has
    ///   a type this store could not read back; nothing is written
    /// - [`StoreError::MissingIdentifier`] if the backend acknowledged the write with an
    ///   identifier that is not an ObjectId
    pub async fn insert(&self, record: &dyn AnyRecord) -> StoreResult<Option<ObjectId>> {
        let collection = record.record_collection();
        let document = record.to_attributes()?;
        self.registry.check_readable(&document)?;

        debug!(collection, record_type = record.record_type(), "inserting record");

        match self.backend.insert_document(collection, document).await? {
            Some(Bson::ObjectId(id)) => Ok(Some(id)),
            Some(other) => Err(StoreError::MissingIdentifier(format!(
                "insert into {collection} returned non-ObjectId identifier {other}"
            ))),
            None => Ok(None),
        }
    }

    /// Replaces the stored document of `record` with its current attributes.
    ///
    /// Returns `true` if exactly one document matched the record's identifier.
    ///
    /// # Errors
    ///
    /// - [`StoreError::InvalidArgument`] if the record has no identifier
    /// - [`StoreError::UnregisteredType`] if the record or one of its nested records has
    ///   a type this store could not read back; nothing is written
    pub async fn update(&self, record: &dyn AnyRecord) -> StoreResult<bool> {
        let collection = record.record_collection();
        let id = stored_id(record)?;
        let document = record.to_attributes()?;
        self.registry.check_readable(&document)?;

        debug!(collection, %id, "updating record");

        Ok(self
            .backend
            .replace_document(collection, &id, document)
            .await?
            == 1)
    }

    /// Removes the stored document of `record`.
    ///
    /// Returns `true` if a document was removed. The record itself is not modified.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidArgument`] if the record has no identifier.
    pub async fn delete(&self, record: &dyn AnyRecord) -> StoreResult<bool> {
        let collection = record.record_collection();
        let id = stored_id(record)?;

        debug!(collection, %id, "deleting record");

        Ok(self.backend.delete_document(collection, &id).await? == 1)
    }
}

/// Builder for [`Store`].
#[derive(Debug)]
pub struct StoreBuilder {
    backend: Box<dyn StoreBackend>,
    registry: RecordRegistry,
    default_limit: usize,
}

impl StoreBuilder {
    /// Creates a builder with an empty registry and [`DEFAULT_LIMIT`].
    pub fn new(backend: impl StoreBackend + 'static) -> Self {
        Self {
            backend: Box::new(backend),
            registry: RecordRegistry::new(),
            default_limit: DEFAULT_LIMIT,
        }
    }

    /// Registers a record type.
    pub fn register<R: Record>(mut self) -> Self {
        self.registry.register::<R>();
        self
    }

    /// Replaces the registry with a prepared one.
    pub fn registry(mut self, registry: RecordRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Sets the number of records queries without a limit return. `0` removes the cap.
    pub fn default_limit(mut self, default_limit: usize) -> Self {
        self.default_limit = default_limit;
        self
    }

    /// Builds the store.
    pub fn build(self) -> Store {
        Store {
            backend: self.backend,
            registry: self.registry,
            default_limit: self.default_limit,
        }
    }
}

/// Parses an identifier string into an ObjectId.
///
/// # Errors
///
/// Returns [`StoreError::InvalidArgument`] if `id` is not a 24-digit hex string.
pub fn parse_id(id: &str) -> StoreResult<ObjectId> {
    ObjectId::parse_str(id)
        .map_err(|err| StoreError::InvalidArgument(format!("invalid identifier {id:?}: {err}")))
}

fn stored_id(record: &dyn AnyRecord) -> StoreResult<ObjectId> {
    record.record_meta().id().copied().ok_or_else(|| {
        StoreError::InvalidArgument(format!(
            "{} record has not been stored yet",
            record.record_type()
        ))
    })
}
