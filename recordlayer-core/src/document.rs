//! Stored document shape and the attribute map records write themselves into.
//!
//! Every stored document carries the identifier field [`ID_FIELD`], the type tag field
//! [`TYPE_TAG_FIELD`] and the record's own fields flat at the top level. Nested records
//! become nested documents with their own type tag. The in-memory new-record flag is
//! never written.

use bson::{Bson, Document, oid::ObjectId, ser::serialize_to_bson};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::{
    error::{StoreError, StoreResult},
    record::{AnyRecord, Record},
};

/// Name of the identifier field of a stored document.
pub const ID_FIELD: &str = "_id";

/// Name of the field carrying the concrete record type.
pub const TYPE_TAG_FIELD: &str = "typeTag";

/// Name of the in-memory new-record flag. Reserved so that no record writes it.
pub const NEW_FLAG_FIELD: &str = "isNew";

const RESERVED_FIELDS: [&str; 3] = [ID_FIELD, TYPE_TAG_FIELD, NEW_FLAG_FIELD];

/// Field map produced by a record's [`Fields::write_attributes`](crate::record::Fields::write_attributes).
///
/// Keys are kept sorted so the finished document has a canonical field order, which
/// makes documents directly comparable in tests. Names are checked on insertion:
/// reserved names, duplicates, and names the document store cannot hold as keys
/// (empty, leading `$`, containing `.` or NUL) are rejected.
///
/// # Example
///
/// ```ignore
/// fn write_attributes(&self, attributes: &mut Attributes) -> StoreResult<()> {
///     attributes
///         .value("name", &self.name)?
///         .value("tags", &self.tags)?
///         .optional_record("owner", self.owner.as_ref())?;
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes {
    fields: BTreeMap<String, Bson>,
}

impl Attributes {
    /// Creates an empty attribute map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a raw BSON value under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidDocument`] if the name is reserved, malformed or
    /// already present.
    pub fn insert(&mut self, name: &str, value: Bson) -> StoreResult<&mut Self> {
        validate_field_name(name)?;

        if self.fields.contains_key(name) {
            return Err(StoreError::InvalidDocument(format!(
                "field {name} is written more than once"
            )));
        }

        self.fields.insert(name.to_string(), value);

        Ok(self)
    }

    /// Serializes a plain value (anything implementing `Serialize`) under `name`.
    pub fn value<T>(&mut self, name: &str, value: &T) -> StoreResult<&mut Self>
    where
        T: Serialize + ?Sized,
    {
        self.insert(name, serialize_to_bson(value)?)
    }

    /// Expands a nested record into a sub-document carrying its own type tag.
    pub fn record<R>(&mut self, name: &str, record: &R) -> StoreResult<&mut Self>
    where
        R: AnyRecord + ?Sized,
    {
        self.insert(name, Bson::Document(record.to_attributes()?))
    }

    /// Expands an optional nested record; `None` is stored as null.
    pub fn optional_record<R: Record>(
        &mut self,
        name: &str,
        record: Option<&R>,
    ) -> StoreResult<&mut Self> {
        match record {
            Some(record) => self.record(name, record),
            None => self.insert(name, Bson::Null),
        }
    }

    /// Expands a list of nested records into an array of sub-documents.
    pub fn records<R: Record>(&mut self, name: &str, records: &[R]) -> StoreResult<&mut Self> {
        let documents = records
            .iter()
            .map(|record| record.to_attributes().map(Bson::Document))
            .collect::<StoreResult<Vec<_>>>()?;

        self.insert(name, Bson::Array(documents))
    }

    /// Returns the value written under `name`, if any.
    pub fn get(&self, name: &str) -> Option<&Bson> {
        self.fields.get(name)
    }

    /// Returns the number of fields written so far.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns `true` if no field has been written.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Finishes the map into a document tagged with `type_tag`, keys in sorted order.
    pub fn into_document(mut self, type_tag: &str) -> Document {
        self.fields
            .insert(TYPE_TAG_FIELD.to_string(), Bson::String(type_tag.to_string()));

        self.fields.into_iter().collect()
    }
}

/// Checks that `name` can be written as a record field.
pub fn validate_field_name(name: &str) -> StoreResult<()> {
    if name.is_empty() {
        return Err(StoreError::InvalidDocument("empty field name".into()));
    }
    if RESERVED_FIELDS.contains(&name) {
        return Err(StoreError::InvalidDocument(format!(
            "{name} is a reserved field name"
        )));
    }
    if name.starts_with('$') || name.contains('.') || name.contains('\0') {
        return Err(StoreError::InvalidDocument(format!(
            "{name:?} cannot be used as a field name"
        )));
    }

    Ok(())
}

/// Returns the type tag of a document, if it carries a string one.
pub fn type_tag_of(document: &Document) -> Option<&str> {
    match document.get(TYPE_TAG_FIELD) {
        Some(Bson::String(tag)) => Some(tag.as_str()),
        _ => None,
    }
}

/// Reads the identifier of a stored document.
///
/// # Errors
///
/// Returns [`StoreError::MissingIdentifier`] if the document has no `_id` and
/// [`StoreError::InvalidDocument`] if the `_id` is not an ObjectId.
pub fn object_id_of(document: &Document) -> StoreResult<ObjectId> {
    match document.get(ID_FIELD) {
        Some(Bson::ObjectId(id)) => Ok(*id),
        Some(other) => Err(StoreError::InvalidDocument(format!(
            "{ID_FIELD} must be an ObjectId, found {other}"
        ))),
        None => Err(StoreError::MissingIdentifier(
            "stored document has no identifier".into(),
        )),
    }
}
