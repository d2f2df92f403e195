//! Convenient re-exports of commonly used types from recordlayer.
//!
//! ```ignore
//! use recordlayer::prelude::*;
//! ```

pub use bson::doc;

pub use recordlayer_core::{
    record::{Record, Fields, RecordMeta, AnyRecord},
    lifecycle::RecordExt,
    document::Attributes,
    schema::{Schema, SchemaBuilder, FieldValue},
    registry::RecordRegistry,
    store::{Store, StoreBuilder},
    backend::{StoreBackend, StoreBackendBuilder},
    query::{FindOptions, FindOptionsBuilder, SortDirection, DEFAULT_LIMIT},
    error::{StoreError, StoreResult},
};
