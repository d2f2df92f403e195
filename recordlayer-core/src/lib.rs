//! A minimal object-document mapper: records persisted to and loaded from a document
//! store without hand-written query code.
//!
//! This crate is the core of the recordlayer project and provides:
//!
//! - **Record traits** ([`record`]) - `Fields`, `Record` and the type-erased `AnyRecord`
//! - **Document shape** ([`document`]) - attribute maps, reserved field names
//! - **Setter tables** ([`schema`]) - per-type field-to-setter tables for reconstruction
//! - **Type registry** ([`registry`]) - type tag to factory mapping
//! - **Query options** ([`query`]) - per-call filter, sort and limit, filter expressions
//! - **Store backend abstraction** ([`backend`]) - trait for document store backends
//! - **Record store** ([`store`]) - mapping plus find/insert/update/delete
//! - **Active record** ([`lifecycle`]) - `save`, `delete` and finders on every record
//! - **Error handling** ([`error`]) - error kinds and result type
//!
//! # Example
//!
//! ```ignore
//! use recordlayer::{prelude::*, memory::InMemoryStore};
//!
//! Store::builder(InMemoryStore::new())
//!     .register::<Widget>()
//!     .build()
//!     .install();
//!
//! let mut widget = Widget::new("a", vec!["x".to_string()]);
//! widget.save().await?;
//!
//! let found = Widget::find(FindOptions::matching(doc! { "tags": "x" })).await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as recordlayer_core;

pub mod backend;
pub mod document;
pub mod error;
pub mod lifecycle;
pub mod query;
pub mod record;
pub mod registry;
pub mod schema;
pub mod store;
