//! Per-type field-to-setter tables used to reconstruct records from documents.
//!
//! A [`Schema`] is built once per record type, when the type is registered with a
//! [`RecordRegistry`](crate::registry::RecordRegistry). Reconstruction looks every
//! document field up in the table; fields without an entry are skipped.

use bson::{Bson, de::deserialize_from_bson};
use serde::de::DeserializeOwned;
use std::{collections::HashMap, fmt, sync::Arc};

use crate::{
    error::{StoreError, StoreResult},
    record::{AnyRecord, Fields, Record},
};

/// A document field value on its way into a record.
///
/// Sub-documents carrying a type tag (and arrays made only of such sub-documents) have
/// already been reconstructed into records by the time a setter sees them.
#[derive(Debug, Clone)]
pub enum FieldValue {
    /// A primitive, untagged sub-document, or mixed array.
    Value(Bson),
    /// A nested record.
    Record(Box<dyn AnyRecord>),
    /// A list of nested records.
    Records(Vec<Box<dyn AnyRecord>>),
}

impl FieldValue {
    /// Deserializes a plain value into `T`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Serialization`] if the value does not fit `T`, and
    /// [`StoreError::InvalidDocument`] if the value is a nested record.
    pub fn deserialize<T: DeserializeOwned>(self) -> StoreResult<T> {
        match self {
            FieldValue::Value(bson) => Ok(deserialize_from_bson(bson)?),
            FieldValue::Record(record) => Err(StoreError::InvalidDocument(format!(
                "expected a plain value, found a {} record",
                record.record_type()
            ))),
            FieldValue::Records(_) => Err(StoreError::InvalidDocument(
                "expected a plain value, found a list of records".into(),
            )),
        }
    }

    /// Converts a nested record value into `R`. A null value yields `None`.
    pub fn into_record<R: Record>(self) -> StoreResult<Option<R>> {
        match self {
            FieldValue::Record(record) => record.downcast::<R>().map(Some),
            FieldValue::Value(Bson::Null) => Ok(None),
            FieldValue::Value(other) => Err(StoreError::InvalidDocument(format!(
                "expected a {} record, found {other}",
                R::TYPE_TAG
            ))),
            FieldValue::Records(_) => Err(StoreError::InvalidDocument(format!(
                "expected a {} record, found a list of records",
                R::TYPE_TAG
            ))),
        }
    }

    /// Converts a list of nested records into `Vec<R>`. An empty array or null yields
    /// an empty list.
    pub fn into_records<R: Record>(self) -> StoreResult<Vec<R>> {
        match self {
            FieldValue::Records(records) => records
                .into_iter()
                .map(|record| record.downcast::<R>())
                .collect(),
            FieldValue::Value(Bson::Null) => Ok(Vec::new()),
            FieldValue::Value(Bson::Array(items)) if items.is_empty() => Ok(Vec::new()),
            FieldValue::Value(other) => Err(StoreError::InvalidDocument(format!(
                "expected a list of {} records, found {other}",
                R::TYPE_TAG
            ))),
            FieldValue::Record(record) => Err(StoreError::InvalidDocument(format!(
                "expected a list of {} records, found a single {} record",
                R::TYPE_TAG,
                record.record_type()
            ))),
        }
    }
}

/// Assigns one field value to a record.
pub type Setter<R> = Arc<dyn Fn(&mut R, FieldValue) -> StoreResult<()> + Send + Sync>;

/// Field-to-setter table of one record type (or embedded field group).
pub struct Schema<R> {
    setters: HashMap<String, Setter<R>>,
}

impl<R: 'static> Schema<R> {
    /// Creates a schema builder.
    pub fn builder() -> SchemaBuilder<R> {
        SchemaBuilder::new()
    }

    /// Returns the setter registered for a document field, if any.
    pub fn setter(&self, field: &str) -> Option<&Setter<R>> {
        self.setters.get(field)
    }

    /// Returns the names of all fields this schema can set, sorted.
    pub fn field_names(&self) -> Vec<&str> {
        let mut names = self.setters.keys().map(String::as_str).collect::<Vec<_>>();
        names.sort_unstable();
        names
    }

    /// Returns the number of settable fields.
    pub fn len(&self) -> usize {
        self.setters.len()
    }

    /// Returns `true` if the schema sets no field.
    pub fn is_empty(&self) -> bool {
        self.setters.is_empty()
    }
}

impl<R> fmt::Debug for Schema<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = self.setters.keys().collect::<Vec<_>>();
        names.sort_unstable();

        f.debug_struct("Schema").field("fields", &names).finish()
    }
}

/// Builder for [`Schema`].
///
/// Registering a second setter for the same field replaces the first one.
pub struct SchemaBuilder<R> {
    setters: HashMap<String, Setter<R>>,
}

impl<R: 'static> SchemaBuilder<R> {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self {
            setters: HashMap::new(),
        }
    }

    /// Registers a raw setter receiving the [`FieldValue`] as-is.
    pub fn field<F>(mut self, name: impl Into<String>, setter: F) -> Self
    where
        F: Fn(&mut R, FieldValue) -> StoreResult<()> + Send + Sync + 'static,
    {
        self.setters.insert(name.into(), Arc::new(setter));
        self
    }

    /// Registers a setter for a plain value, deserialized into `T` first.
    pub fn value<T, F>(self, name: impl Into<String>, setter: F) -> Self
    where
        T: DeserializeOwned,
        F: Fn(&mut R, T) + Send + Sync + 'static,
    {
        self.field(name, move |record: &mut R, value: FieldValue| {
            setter(record, value.deserialize::<T>()?);
            Ok(())
        })
    }

    /// Registers a setter for a nested record. A null value leaves the record untouched.
    pub fn record<N, F>(self, name: impl Into<String>, setter: F) -> Self
    where
        N: Record,
        F: Fn(&mut R, N) + Send + Sync + 'static,
    {
        self.field(name, move |record: &mut R, value: FieldValue| {
            if let Some(nested) = value.into_record::<N>()? {
                setter(record, nested);
            }
            Ok(())
        })
    }

    /// Registers a setter for a list of nested records.
    pub fn records<N, F>(self, name: impl Into<String>, setter: F) -> Self
    where
        N: Record,
        F: Fn(&mut R, Vec<N>) + Send + Sync + 'static,
    {
        self.field(name, move |record: &mut R, value: FieldValue| {
            setter(record, value.into_records::<N>()?);
            Ok(())
        })
    }

    /// Includes every setter of an embedded field group, reached through `project`.
    pub fn include<P, F>(mut self, project: F) -> Self
    where
        P: Fields,
        F: Fn(&mut R) -> &mut P + Send + Sync + 'static,
    {
        let project = Arc::new(project);

        for (name, setter) in P::schema().setters {
            let project = Arc::clone(&project);

            self.setters.insert(
                name,
                Arc::new(move |record: &mut R, value: FieldValue| {
                    setter(project(record), value)
                }),
            );
        }

        self
    }

    /// Builds the schema.
    pub fn build(self) -> Schema<R> {
        Schema {
            setters: self.setters,
        }
    }
}

impl<R: 'static> Default for SchemaBuilder<R> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{document::Attributes, record::RecordMeta};

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Audit {
        created_by: String,
    }

    impl Fields for Audit {
        fn write_attributes(&self, attributes: &mut Attributes) -> StoreResult<()> {
            attributes.value("created_by", &self.created_by)?;
            Ok(())
        }

        fn schema() -> Schema<Self> {
            Schema::builder()
                .value("created_by", |audit: &mut Audit, by: String| {
                    audit.created_by = by
                })
                .build()
        }
    }

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Note {
        meta: RecordMeta,
        audit: Audit,
        body: String,
    }

    impl Fields for Note {
        fn write_attributes(&self, attributes: &mut Attributes) -> StoreResult<()> {
            self.audit.write_attributes(attributes)?;
            attributes.value("body", &self.body)?;
            Ok(())
        }

        fn schema() -> Schema<Self> {
            Schema::builder()
                .include(|note: &mut Note| &mut note.audit)
                .value("body", |note: &mut Note, body: String| note.body = body)
                .build()
        }
    }

    impl Record for Note {
        const TYPE_TAG: &'static str = "Note";

        fn collection_name() -> &'static str {
            "notes"
        }

        fn meta(&self) -> &RecordMeta {
            &self.meta
        }

        fn meta_mut(&mut self) -> &mut RecordMeta {
            &mut self.meta
        }
    }

    #[test]
    fn included_setters_reach_the_embedded_group() {
        let schema = Note::schema();
        let mut note = Note::default();

        assert_eq!(schema.field_names(), vec!["body", "created_by"]);

        let setter = schema.setter("created_by").unwrap();
        setter(&mut note, FieldValue::Value(Bson::String("ada".into()))).unwrap();

        assert_eq!(note.audit.created_by, "ada");
    }

    #[test]
    fn mistyped_values_fail_deserialization() {
        let schema = Note::schema();
        let mut note = Note::default();
        let setter = schema.setter("body").unwrap();

        assert!(matches!(
            setter(&mut note, FieldValue::Value(Bson::Int32(3))),
            Err(StoreError::Serialization(_))
        ));
    }

    #[test]
    fn nested_record_values_convert_by_type() {
        let note = Note {
            body: "hello".into(),
            ..Note::default()
        };

        let value = FieldValue::Record(Box::new(note.clone()));
        assert_eq!(value.into_record::<Note>().unwrap(), Some(note.clone()));

        assert_eq!(
            FieldValue::Value(Bson::Null).into_record::<Note>().unwrap(),
            None
        );
        assert!(
            FieldValue::Value(Bson::Array(vec![]))
                .into_records::<Note>()
                .unwrap()
                .is_empty()
        );
        assert!(matches!(
            FieldValue::Record(Box::new(note)).deserialize::<String>(),
            Err(StoreError::InvalidDocument(_))
        ));
    }
}
