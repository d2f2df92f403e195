//! Registry of record types, keyed by type tag.
//!
//! Reconstruction is driven entirely by the type tag embedded in each document: the
//! registry maps the tag to a factory that creates the default value of the concrete
//! type and feeds every document field through the type's [`Schema`](crate::schema::Schema).

use bson::{Bson, Document};
use std::{collections::HashMap, fmt, sync::Arc};
use tracing::{trace, warn};

use crate::{
    document::{ID_FIELD, TYPE_TAG_FIELD, object_id_of, type_tag_of},
    error::{StoreError, StoreResult},
    record::{AnyRecord, Record},
    schema::FieldValue,
};

type Factory = Arc<dyn Fn(&RecordRegistry, Document) -> StoreResult<Box<dyn AnyRecord>> + Send + Sync>;

#[derive(Clone)]
struct RecordEntry {
    collection: &'static str,
    factory: Factory,
}

/// Maps type tags to the factories that rebuild the corresponding record types.
///
/// Every record type that can appear in a stored document, including types that only
/// ever appear nested inside other records, must be registered.
///
/// # Example
///
/// ```ignore
/// let registry = RecordRegistry::new()
///     .with::<Widget>()
///     .with::<Owner>();
///
/// let widget = registry.reconstruct(document)?.downcast::<Widget>()?;
/// ```
#[derive(Clone, Default)]
pub struct RecordRegistry {
    entries: HashMap<&'static str, RecordEntry>,
}

impl RecordRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `R` under [`Record::TYPE_TAG`], building its schema once.
    ///
    /// Registering a tag a second time replaces the previous entry.
    pub fn register<R: Record>(&mut self) -> &mut Self {
        let schema = Arc::new(R::schema());

        let factory: Factory = Arc::new(move |registry: &RecordRegistry, document: Document| {
            let mut record = R::default();

            for (field, value) in document {
                match field.as_str() {
                    ID_FIELD => {}
                    TYPE_TAG_FIELD => {}
                    name => match schema.setter(name) {
                        Some(setter) => setter(&mut record, registry.convert_value(value)?)?,
                        None => trace!(
                            record_type = R::TYPE_TAG,
                            field = name,
                            "skipping field without setter"
                        ),
                    },
                }
            }

            Ok(Box::new(record) as Box<dyn AnyRecord>)
        });

        let entry = RecordEntry {
            collection: R::collection_name(),
            factory,
        };

        if self.entries.insert(R::TYPE_TAG, entry).is_some() {
            warn!(record_type = R::TYPE_TAG, "record type registered twice, replacing");
        }

        self
    }

    /// Builder-style variant of [`register`](Self::register).
    pub fn with<R: Record>(mut self) -> Self {
        self.register::<R>();
        self
    }

    /// Returns `true` if a record type is registered under `type_tag`.
    pub fn contains(&self, type_tag: &str) -> bool {
        self.entries.contains_key(type_tag)
    }

    /// Returns the collection of the record type registered under `type_tag`.
    pub fn collection_of(&self, type_tag: &str) -> Option<&'static str> {
        self.entries.get(type_tag).map(|entry| entry.collection)
    }

    /// Returns all registered type tags, sorted.
    pub fn type_tags(&self) -> Vec<&'static str> {
        let mut tags = self.entries.keys().copied().collect::<Vec<_>>();
        tags.sort_unstable();
        tags
    }

    /// Rebuilds the record a document describes.
    ///
    /// When the document carries an identifier the record comes back persisted
    /// (`is_new() == false`); nested documents never carry one and stay new.
    ///
    /// # Errors
    ///
    /// - [`StoreError::InvalidDocument`] if the document has no type tag, an `_id` that
    ///   is not an ObjectId, or a field value a setter rejects
    /// - [`StoreError::UnregisteredType`] if the type tag is unknown
    /// - [`StoreError::Serialization`] if a field value does not deserialize
    pub fn reconstruct(&self, document: Document) -> StoreResult<Box<dyn AnyRecord>> {
        let type_tag = type_tag_of(&document).ok_or_else(|| {
            StoreError::InvalidDocument(format!("document has no {TYPE_TAG_FIELD} field"))
        })?;

        let entry = self
            .entries
            .get(type_tag)
            .ok_or_else(|| StoreError::UnregisteredType(type_tag.to_string()))?;

        let id = if document.contains_key(ID_FIELD) {
            Some(object_id_of(&document)?)
        } else {
            None
        };

        let mut record = (entry.factory)(self, document)?;

        if let Some(id) = id {
            record.record_meta_mut().mark_persisted(id);
        }

        Ok(record)
    }

    /// Checks that every record a document describes, nested ones included, has a
    /// registered type, so that [`reconstruct`](Self::reconstruct) can read it back.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnregisteredType`] naming the first unknown type tag.
    pub fn check_readable(&self, document: &Document) -> StoreResult<()> {
        if let Some(type_tag) = type_tag_of(document) {
            if !self.contains(type_tag) {
                return Err(StoreError::UnregisteredType(type_tag.to_string()));
            }
        }

        for value in document.values() {
            match value {
                Bson::Document(nested) if type_tag_of(nested).is_some() => {
                    self.check_readable(nested)?;
                }
                Bson::Array(items) if !items.is_empty() && items.iter().all(is_tagged_document) => {
                    for item in items {
                        if let Bson::Document(nested) = item {
                            self.check_readable(nested)?;
                        }
                    }
                }
                _ => {}
            }
        }

        Ok(())
    }

    fn convert_value(&self, value: Bson) -> StoreResult<FieldValue> {
        match value {
            Bson::Document(document) if type_tag_of(&document).is_some() => {
                Ok(FieldValue::Record(self.reconstruct(document)?))
            }
            Bson::Array(items) if !items.is_empty() && items.iter().all(is_tagged_document) => {
                Ok(FieldValue::Records(
                    items
                        .into_iter()
                        .filter_map(|item| match item {
                            Bson::Document(document) => Some(self.reconstruct(document)),
                            _ => None,
                        })
                        .collect::<StoreResult<Vec<_>>>()?,
                ))
            }
            other => Ok(FieldValue::Value(other)),
        }
    }
}

impl fmt::Debug for RecordRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordRegistry")
            .field("type_tags", &self.type_tags())
            .finish()
    }
}

fn is_tagged_document(value: &Bson) -> bool {
    matches!(value, Bson::Document(document) if type_tag_of(document).is_some())
}
