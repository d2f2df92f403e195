use async_trait::async_trait;
use futures::TryStreamExt;
use bson::{Bson, Document, doc, oid::ObjectId};
use mongodb::{
    Client, Collection as MongoCollection,
    error::{Error as MongoError, ErrorKind},
    options::{ClientOptions, FindOptions},
};
use tracing::debug;

use recordlayer_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    document::ID_FIELD,
    error::{StoreError, StoreResult},
    query::FindQuery,
};

/// MongoDB storage backend.
///
/// Filters are handed to the server unmodified, so every operator MongoDB understands is
/// available. Collections are created by the server on first insert.
#[derive(Debug)]
pub struct MongoDbStore {
    client: Client,
    database: String,
}

impl MongoDbStore {
    pub fn new(client: Client, database: String) -> Self {
        Self { client, database }
    }

    pub fn builder(dsn: &str, database: &str) -> MongoDbStoreBuilder {
        MongoDbStoreBuilder::new(dsn, database)
    }

    fn get_collection(&self, collection_name: &str) -> MongoCollection<Document> {
        self.client
            .database(&self.database)
            .collection(collection_name)
    }
}

/// Driver options for a resolved query. The sort document goes to the server as written.
fn find_options(query: &FindQuery) -> StoreResult<FindOptions> {
    let mut options = FindOptions::default();

    if let Some(limit) = query.limit {
        let limit = i64::try_from(limit).map_err(|_| {
            StoreError::InvalidArgument(format!("limit {limit} exceeds the server maximum"))
        })?;
        options.limit = Some(limit);
    }

    if !query.sort.is_empty() {
        options.sort = Some(query.sort.clone());
    }

    Ok(options)
}

fn map_error(err: MongoError) -> StoreError {
    match err.kind.as_ref() {
        ErrorKind::Io(_)
        | ErrorKind::ServerSelection { .. }
        | ErrorKind::ConnectionPoolCleared { .. }
        | ErrorKind::Authentication { .. } => StoreError::Connection(err.to_string()),
        ErrorKind::InvalidArgument { .. } => StoreError::InvalidArgument(err.to_string()),
        _ => StoreError::Backend(err.to_string()),
    }
}

#[async_trait]
impl StoreBackend for MongoDbStore {
    async fn find_documents(
        &self,
        collection: &str,
        query: &FindQuery,
    ) -> StoreResult<Vec<Document>> {
        let options = find_options(query)?;

        self.get_collection(collection)
            .find(query.filter.clone())
            .with_options(options)
            .await
            .map_err(map_error)?
            .try_collect::<Vec<Document>>()
            .await
            .map_err(map_error)
    }

    async fn insert_document(
        &self,
        collection: &str,
        document: Document,
    ) -> StoreResult<Option<Bson>> {
        let result = self.get_collection(collection)
            .insert_one(document)
            .await
            .map_err(map_error)?;

        Ok(Some(result.inserted_id))
    }

    async fn replace_document(
        &self,
        collection: &str,
        id: &ObjectId,
        document: Document,
    ) -> StoreResult<u64> {
        let result = self.get_collection(collection)
            .replace_one(doc! { ID_FIELD: *id }, document)
            .await
            .map_err(map_error)?;

        Ok(result.matched_count)
    }

    async fn delete_document(&self, collection: &str, id: &ObjectId) -> StoreResult<u64> {
        let result = self.get_collection(collection)
            .delete_one(doc! { ID_FIELD: *id })
            .await
            .map_err(map_error)?;

        Ok(result.deleted_count)
    }
}

pub struct MongoDbStoreBuilder {
    dsn: String,
    database: String,
}

impl MongoDbStoreBuilder {
    pub fn new(dsn: &str, database: &str) -> Self {
        Self {
            dsn: dsn.to_string(),
            database: database.to_string(),
        }
    }
}

#[async_trait]
impl StoreBackendBuilder for MongoDbStoreBuilder {
    type Backend = MongoDbStore;

    async fn build(self) -> StoreResult<Self::Backend> {
        if self.database.is_empty() {
            return Err(StoreError::Initialization("database name must not be empty".into()));
        }

        let options = ClientOptions::parse(&self.dsn)
            .await
            .map_err(|e| StoreError::Initialization(e.to_string()))?;

        debug!(hosts = options.hosts.len(), database = %self.database, "connecting to MongoDB");

        Ok(MongoDbStore::new(
            Client::with_options(options)
                .map_err(|e| StoreError::Initialization(e.to_string()))?,
            self.database,
        ))
    }
}
