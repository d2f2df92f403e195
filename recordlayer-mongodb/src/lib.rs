//! MongoDB backend implementation for recordlayer.
//!
//! This crate provides a MongoDB-based implementation of the `StoreBackend` trait.
//!
//! To use this backend, include the `mongodb` feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! recordlayer = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! # Behavior
//!
//! - Filters are passed to the server as written
//! - Sort keys become a server-side sort specification, in precedence order
//! - Updates replace the whole stored document; deletes remove at most one document
//! - Connectivity failures surface as `StoreError::Connection`
//!
//! # Example
//!
//! ```ignore
//! use recordlayer::{prelude::*, mongodb::MongoDbStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = MongoDbStore::builder("mongodb://localhost:27017", "my_database")
//!         .build()
//!         .await?;
//!
//!     Store::builder(backend).register::<Widget>().build().install();
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as recordlayer_mongodb;

pub mod store;

pub use store::{MongoDbStore, MongoDbStoreBuilder};
