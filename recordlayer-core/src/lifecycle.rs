//! Active-record operations: records that save, delete and find themselves.
//!
//! [`RecordExt`] is implemented for every [`Record`]. Each operation comes in two
//! forms: the plain one uses the process-wide store installed with
//! [`Store::install`], the `_in` one takes the store explicitly.
//!
//! ```ignore
//! let mut widget = Widget::new("a", vec!["x".into()]);
//! assert!(widget.save().await?);
//!
//! let id = widget.meta().id().unwrap().to_hex();
//! let loaded = Widget::find_by_id(&id).await?.unwrap();
//! assert!(!loaded.meta().is_new());
//! ```

use async_trait::async_trait;

use crate::{
    error::StoreResult,
    query::FindOptions,
    record::{AnyRecord, Record},
    store::Store,
};

/// Persistence operations available on every record type.
///
/// Finders are scoped to the record type's collection and always return records with
/// `is_new() == false`. A document in that collection whose type tag names another
/// record type makes typed finders fail with
/// [`StoreError::TypeMismatch`](crate::error::StoreError::TypeMismatch).
#[async_trait]
pub trait RecordExt: Record {
    /// Inserts the record if it is new, replaces its stored document otherwise.
    ///
    /// On a successful insert the record adopts the assigned identifier and stops being
    /// new. When the insert is not acknowledged the record is left untouched and
    /// `false` is returned.
    async fn save_in(&mut self, store: &Store) -> StoreResult<bool> {
        if !self.meta().is_new() {
            return store.update(&*self).await;
        }

        match store.insert(&*self).await? {
            Some(id) => {
                self.meta_mut().mark_persisted(id);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// [`save_in`](Self::save_in) on the process-wide store.
    async fn save(&mut self) -> StoreResult<bool> {
        self.save_in(Store::global()?).await
    }

    /// Removes the record's stored document. The record itself is left untouched.
    async fn delete_in(&self, store: &Store) -> StoreResult<bool> {
        store.delete(self).await
    }

    /// [`delete_in`](Self::delete_in) on the process-wide store.
    async fn delete(&self) -> StoreResult<bool> {
        self.delete_in(Store::global()?).await
    }

    /// Returns the records of this type's collection matching `options`.
    async fn find_in(store: &Store, options: FindOptions) -> StoreResult<Vec<Self>> {
        store
            .find(Self::collection_name(), options)
            .await?
            .into_iter()
            .map(existing::<Self>)
            .collect()
    }

    /// [`find_in`](Self::find_in) on the process-wide store.
    async fn find(options: FindOptions) -> StoreResult<Vec<Self>> {
        Self::find_in(Store::global()?, options).await
    }

    /// Returns the first record of this type's collection matching `options`.
    async fn find_one_in(store: &Store, options: FindOptions) -> StoreResult<Option<Self>> {
        store
            .find_one(Self::collection_name(), options)
            .await?
            .map(existing::<Self>)
            .transpose()
    }

    /// [`find_one_in`](Self::find_one_in) on the process-wide store.
    async fn find_one(options: FindOptions) -> StoreResult<Option<Self>> {
        Self::find_one_in(Store::global()?, options).await
    }

    /// Returns the record of this type's collection stored under `id`.
    ///
    /// Fails with an invalid-argument error if `id` is not a well-formed identifier.
    async fn find_by_id_in(store: &Store, id: &str) -> StoreResult<Option<Self>> {
        store
            .find_by_id(Self::collection_name(), id)
            .await?
            .map(existing::<Self>)
            .transpose()
    }

    /// [`find_by_id_in`](Self::find_by_id_in) on the process-wide store.
    async fn find_by_id(id: &str) -> StoreResult<Option<Self>> {
        Self::find_by_id_in(Store::global()?, id).await
    }
}

impl<R: Record> RecordExt for R {}

fn existing<R: Record>(record: Box<dyn AnyRecord>) -> StoreResult<R> {
    let mut record = record.downcast::<R>()?;
    record.meta_mut().mark_existing();

    Ok(record)
}
