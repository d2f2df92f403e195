//! Main recordlayer crate: an active-record object-document mapper.
//!
//! Records are plain structs that describe their persistent fields once. The store turns
//! them into documents tagged with their type, and turns stored documents back into the
//! right concrete type, including records nested inside other records.
//!
//! # Features
//!
//! - **Active records** - `save`, `delete`, `find`, `find_one` and `find_by_id` on every
//!   record type
//! - **Polymorphic loading** - documents carry a type tag; the registry rebuilds the
//!   concrete type, nested records included
//! - **Per-call queries** - filter, sort and limit travel with each call
//! - **Multiple backends** - in-memory and MongoDB storage behind one trait
//!
//! # Quick Start
//!
//! ```ignore
//! use recordlayer::{prelude::*, memory::InMemoryStore};
//!
//! #[derive(Debug, Clone, Default)]
//! pub struct Widget {
//!     meta: RecordMeta,
//!     pub name: String,
//! }
//!
//! impl Fields for Widget {
//!     fn write_attributes(&self, attributes: &mut Attributes) -> StoreResult<()> {
//!         attributes.value("name", &self.name)?;
//!         Ok(())
//!     }
//!
//!     fn schema() -> Schema<Self> {
//!         Schema::builder()
//!             .value("name", |widget: &mut Widget, name: String| widget.name = name)
//!             .build()
//!     }
//! }
//!
//! impl Record for Widget {
//!     const TYPE_TAG: &'static str = "Widget";
//!
//!     fn collection_name() -> &'static str { "widgets" }
//!     fn meta(&self) -> &RecordMeta { &self.meta }
//!     fn meta_mut(&mut self) -> &mut RecordMeta { &mut self.meta }
//! }
//!
//! #[tokio::main]
//! async fn main() -> StoreResult<()> {
//!     Store::builder(InMemoryStore::builder().build().await?)
//!         .register::<Widget>()
//!         .build()
//!         .install();
//!
//!     let mut widget = Widget { name: "Alice".into(), ..Default::default() };
//!     widget.save().await?;
//!
//!     let found = Widget::find(
//!         FindOptions::builder()
//!             .filter(doc! { "name": "Alice" })
//!             .sort_by("name", SortDirection::Asc)
//!             .build(),
//!     )
//!     .await?;
//!
//!     println!("Found widgets: {found:?}");
//!     Ok(())
//! }
//! ```
//!
//! # Backends
//!
//! - [`memory`] - In-memory storage for development and testing
//! - `mongodb` - Persistent MongoDB backend (requires `mongodb` feature)

pub mod prelude;

pub use recordlayer_core::{
    backend, document, error, lifecycle, query, record, registry, schema, store,
};

// Re-export BSON types for convenience
pub use bson;

/// In-memory storage backend implementations.
pub mod memory {
    pub use recordlayer_memory::{InMemoryStore, InMemoryStoreBuilder};
}

/// MongoDB storage backend implementations.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use recordlayer_mongodb::{MongoDbStore, MongoDbStoreBuilder};
}
