//! In-memory document storage backend for recordlayer.
//!
//! This crate provides a thread-safe, in-memory implementation of the `StoreBackend`
//! trait. It uses async-aware read-write locks for concurrent access and is meant for
//! development and tests.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes using async-aware RwLock
//! - **Filter evaluation** - Equality, comparison, membership, existence and logical
//!   operators over dot-paths
//! - **Sorting and limits** - Multi-key sorts with missing values first
//!
//! # Quick Start
//!
//! ```ignore
//! use recordlayer::{prelude::*, memory::InMemoryStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = InMemoryStore::builder().build().await?;
//!     let store = Store::builder(backend.clone())
//!         .register::<Widget>()
//!         .build();
//!
//!     let mut widget = Widget::new("a", vec!["x".to_string()]);
//!     widget.save_in(&store).await?;
//!
//!     assert_eq!(backend.documents("widgets").await.len(), 1);
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as recordlayer_memory;

mod evaluator;
pub mod store;

pub use store::{InMemoryStore, InMemoryStoreBuilder};
