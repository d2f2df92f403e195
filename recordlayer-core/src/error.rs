//! Error types and result types for record store operations.
//!
//! Every fallible operation in this workspace returns [`StoreResult<T>`]. The mapping
//! layer never retries and never translates backend errors; it only adds the kinds
//! below for failures it detects itself.
//!
//! A legitimate absence (no matching document) is not an error: finders return an
//! empty list or `None`.

use bson::error::Error as BsonError;
use thiserror::Error;

/// Represents all possible errors that can occur when mapping or persisting records.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The backend could not be reached or refused the credentials.
    #[error("Connection error: {0}")]
    Connection(String),
    /// The backend could not be constructed from its configuration.
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// The global store was used before [`Store::install`](crate::store::Store::install).
    #[error("Record store has not been initialized")]
    Uninitialized,
    /// A malformed identifier, filter or sort specification.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    /// A query shape the backend cannot express.
    #[error("Unsupported operation: {0}")]
    Unsupported(String),
    /// A document or attribute map that violates the stored document shape.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    /// A document carries a type tag no record type was registered under.
    #[error("Unregistered record type: {0}")]
    UnregisteredType(String),
    /// A reconstructed record is not of the type the caller asked for.
    #[error("Expected record of type {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
    /// A document with the given ID already exists in the collection.
    /// The first argument is the document ID, the second is the collection name.
    #[error("Document {0} already exists in collection {1}")]
    DocumentAlreadyExists(String, String),
    /// The backend acknowledged a write without returning a usable identifier.
    #[error("Missing identifier: {0}")]
    MissingIdentifier(String),
    /// Serialization/deserialization error when converting field values to and from BSON.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// An error occurred in the underlying storage backend.
    #[error("Backend error: {0}")]
    Backend(String),
}

/// A specialized `Result` type for record store operations.
pub type StoreResult<T> = Result<T, StoreError>;

impl From<BsonError> for StoreError {
    fn from(err: BsonError) -> Self {
        StoreError::Serialization(err.to_string())
    }
}
