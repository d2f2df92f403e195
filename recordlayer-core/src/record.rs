//! Core traits for persistable records.
//!
//! A record is a plain Rust struct that embeds a [`RecordMeta`] (identity and new-state)
//! and implements two traits:
//!
//! - [`Fields`] - writes the record's attributes and describes how to set them back
//! - [`Record`] - names the record type and its collection and exposes the meta
//!
//! Field groups shared between record types implement only [`Fields`] and are embedded
//! into the records that use them.
//!
//! # Example
//!
//! ```ignore
//! use recordlayer::prelude::*;
//!
//! #[derive(Debug, Clone, Default, PartialEq)]
//! pub struct Widget {
//!     meta: RecordMeta,
//!     pub name: String,
//!     pub tags: Vec<String>,
//! }
//!
//! impl Fields for Widget {
//!     fn write_attributes(&self, attributes: &mut Attributes) -> StoreResult<()> {
//!         attributes.value("name", &self.name)?.value("tags", &self.tags)?;
//!         Ok(())
//!     }
//!
//!     fn schema() -> Schema<Self> {
//!         Schema::builder()
//!             .value("name", |widget: &mut Widget, name: String| widget.name = name)
//!             .value("tags", |widget: &mut Widget, tags: Vec<String>| widget.tags = tags)
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
//! ```

use bson::{Document, oid::ObjectId};
use std::{any::Any, fmt::Debug};

use crate::{
    document::Attributes,
    error::{StoreError, StoreResult},
    schema::Schema,
};

/// Identity and new-state of a record.
///
/// A fresh meta is new and has no identifier. It only changes through the store-facing
/// paths: a successful insert or a reconstruction from a stored document marks it
/// persisted with the stored identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordMeta {
    id: Option<ObjectId>,
    is_new: bool,
}

impl RecordMeta {
    /// Creates the meta of a record that has never been stored.
    pub fn new() -> Self {
        Self {
            id: None,
            is_new: true,
        }
    }

    /// Returns the identifier assigned by the store, if any.
    pub fn id(&self) -> Option<&ObjectId> {
        self.id.as_ref()
    }

    /// Returns `true` until the record has been inserted or loaded.
    pub fn is_new(&self) -> bool {
        self.is_new
    }

    pub(crate) fn mark_persisted(&mut self, id: ObjectId) {
        self.id = Some(id);
        self.is_new = false;
    }

    pub(crate) fn mark_existing(&mut self) {
        self.is_new = false;
    }
}

impl Default for RecordMeta {
    fn default() -> Self {
        Self::new()
    }
}

/// The attribute-mapping half of a record: how it is written and how it is read back.
pub trait Fields: Send + Sync + Sized + 'static {
    /// Writes every persistent field into `attributes`.
    ///
    /// Must not write the identifier, the type tag or the new-record flag; those names
    /// are rejected by [`Attributes`].
    fn write_attributes(&self, attributes: &mut Attributes) -> StoreResult<()>;

    /// Returns the field-to-setter table used when reconstructing this type.
    ///
    /// Called once per type, when the type is registered.
    fn schema() -> Schema<Self>;
}

/// A persistable entity stored as one document in its own collection.
pub trait Record: Fields + Debug + Clone + Default {
    /// Name stored in the type tag field of every document of this type.
    ///
    /// Must be unique among the types registered with one store.
    const TYPE_TAG: &'static str;

    /// Returns the name of the collection records of this type are stored in.
    fn collection_name() -> &'static str;

    /// Returns the record's identity and new-state.
    fn meta(&self) -> &RecordMeta;

    /// Returns the record's identity and new-state mutably.
    fn meta_mut(&mut self) -> &mut RecordMeta;
}

/// Type-erased record, used wherever the concrete type is only known from a type tag.
///
/// Implemented for every [`Record`]. Reconstructed records come back from the store as
/// `Box<dyn AnyRecord>`; use [`downcast`](trait.AnyRecord.html#method.downcast) or
/// [`downcast_ref`](trait.AnyRecord.html#method.downcast_ref) to get the concrete type.
pub trait AnyRecord: Debug + Send + Sync {
    /// Returns the type tag of the concrete record type.
    fn record_type(&self) -> &'static str;

    /// Returns the collection of the concrete record type.
    fn record_collection(&self) -> &'static str;

    /// Returns the record's identity and new-state.
    fn record_meta(&self) -> &RecordMeta;

    /// Returns the record's identity and new-state mutably.
    fn record_meta_mut(&mut self) -> &mut RecordMeta;

    /// Serializes the record into its document form, without identifier or new flag,
    /// tagged with its type and with keys in sorted order.
    fn to_attributes(&self) -> StoreResult<Document>;

    /// Returns a reference to the record as a generic `Any` type.
    fn as_any(&self) -> &dyn Any;

    /// Returns a mutable reference to the record as a generic `Any` type.
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Converts the boxed record into a boxed `Any`.
    fn into_any(self: Box<Self>) -> Box<dyn Any>;

    /// Clones the record into a new boxed `AnyRecord`.
    fn clone_box(&self) -> Box<dyn AnyRecord>;
}

impl dyn AnyRecord {
    /// Attempts to downcast a reference to a specific record type.
    pub fn downcast_ref<R: Record>(&self) -> Option<&R> {
        self.as_any().downcast_ref::<R>()
    }

    /// Attempts to downcast a mutable reference to a specific record type.
    pub fn downcast_mut<R: Record>(&mut self) -> Option<&mut R> {
        self.as_any_mut().downcast_mut::<R>()
    }

    /// Converts the boxed record into a specific record type.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::TypeMismatch`] if the record is not an `R`.
    pub fn downcast<R: Record>(self: Box<Self>) -> StoreResult<R> {
        let found = self.record_type();

        self.into_any()
            .downcast::<R>()
            .map(|record| *record)
            .map_err(|_| StoreError::TypeMismatch {
                expected: R::TYPE_TAG,
                found,
            })
    }
}

impl<R: Record> AnyRecord for R {
    fn record_type(&self) -> &'static str {
        R::TYPE_TAG
    }

    fn record_collection(&self) -> &'static str {
        R::collection_name()
    }

    fn record_meta(&self) -> &RecordMeta {
        self.meta()
    }

    fn record_meta_mut(&mut self) -> &mut RecordMeta {
        self.meta_mut()
    }

    fn to_attributes(&self) -> StoreResult<Document> {
        let mut attributes = Attributes::new();
        self.write_attributes(&mut attributes)?;

        Ok(attributes.into_document(R::TYPE_TAG))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }

    fn clone_box(&self) -> Box<dyn AnyRecord> {
        Box::new(self.clone())
    }
}

impl Clone for Box<dyn AnyRecord> {
    fn clone(&self) -> Box<dyn AnyRecord> {
        self.clone_box()
    }
}
