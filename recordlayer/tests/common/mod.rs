#![allow(dead_code)]

use recordlayer::{memory::InMemoryStore, prelude::*};
use serde::{Deserialize, Serialize};

/// Plain embedded value, stored as an untagged sub-document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: i32,
    pub height: i32,
}

/// Field group shared by several record types.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Audit {
    pub created_by: String,
    pub revision: i32,
}

impl Fields for Audit {
    fn write_attributes(&self, attributes: &mut Attributes) -> StoreResult<()> {
        attributes
            .value("createdBy", &self.created_by)?
            .value("revision", &self.revision)?;
        Ok(())
    }

    fn schema() -> Schema<Self> {
        Schema::builder()
            .value("createdBy", |audit: &mut Audit, created_by: String| audit.created_by = created_by)
            .value("revision", |audit: &mut Audit, revision: i32| audit.revision = revision)
            .build()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Owner {
    meta: RecordMeta,
    pub name: String,
    pub email: Option<String>,
}

impl Owner {
    pub fn new(name: &str, email: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            email: email.map(str::to_string),
            ..Default::default()
        }
    }
}

impl Fields for Owner {
    fn write_attributes(&self, attributes: &mut Attributes) -> StoreResult<()> {
        attributes
            .value("name", &self.name)?
            .value("email", &self.email)?;
        Ok(())
    }

    fn schema() -> Schema<Self> {
        Schema::builder()
            .value("name", |owner: &mut Owner, name: String| owner.name = name)
            .value("email", |owner: &mut Owner, email: Option<String>| owner.email = email)
            .build()
    }
}

impl Record for Owner {
    const TYPE_TAG: &'static str = "Owner";

    fn collection_name() -> &'static str { "owners" }
    fn meta(&self) -> &RecordMeta { &self.meta }
    fn meta_mut(&mut self) -> &mut RecordMeta { &mut self.meta }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Part {
    meta: RecordMeta,
    pub label: String,
    pub quantity: i32,
}

impl Part {
    pub fn new(label: &str, quantity: i32) -> Self {
        Self {
            label: label.to_string(),
            quantity,
            ..Default::default()
        }
    }
}

impl Fields for Part {
    fn write_attributes(&self, attributes: &mut Attributes) -> StoreResult<()> {
        attributes
            .value("label", &self.label)?
            .value("quantity", &self.quantity)?;
        Ok(())
    }

    fn schema() -> Schema<Self> {
        Schema::builder()
            .value("label", |part: &mut Part, label: String| part.label = label)
            .value("quantity", |part: &mut Part, quantity: i32| part.quantity = quantity)
            .build()
    }
}

impl Record for Part {
    const TYPE_TAG: &'static str = "Part";

    fn collection_name() -> &'static str { "parts" }
    fn meta(&self) -> &RecordMeta { &self.meta }
    fn meta_mut(&mut self) -> &mut RecordMeta { &mut self.meta }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Widget {
    meta: RecordMeta,
    pub name: String,
    pub tags: Vec<String>,
    pub size: Dimensions,
    pub owner: Option<Owner>,
    pub parts: Vec<Part>,
    pub audit: Audit,
}

impl Widget {
    pub fn new(name: &str, tags: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            tags: tags.iter().map(|tag| tag.to_string()).collect(),
            ..Default::default()
        }
    }
}

impl Fields for Widget {
    fn write_attributes(&self, attributes: &mut Attributes) -> StoreResult<()> {
        attributes
            .value("name", &self.name)?
            .value("tags", &self.tags)?
            .value("size", &self.size)?
            .optional_record("owner", self.owner.as_ref())?
            .records("parts", &self.parts)?;

        self.audit.write_attributes(attributes)
    }

    fn schema() -> Schema<Self> {
        Schema::builder()
            .value("name", |widget: &mut Widget, name: String| widget.name = name)
            .value("tags", |widget: &mut Widget, tags: Vec<String>| widget.tags = tags)
            .value("size", |widget: &mut Widget, size: Dimensions| widget.size = size)
            .field("owner", |widget: &mut Widget, value: FieldValue| {
                widget.owner = value.into_record::<Owner>()?;
                Ok(())
            })
            .records("parts", |widget: &mut Widget, parts: Vec<Part>| widget.parts = parts)
            .include(|widget: &mut Widget| &mut widget.audit)
            .build()
    }
}

impl Record for Widget {
    const TYPE_TAG: &'static str = "Widget";

    fn collection_name() -> &'static str { "widgets" }
    fn meta(&self) -> &RecordMeta { &self.meta }
    fn meta_mut(&mut self) -> &mut RecordMeta { &mut self.meta }
}

/// A second record type sharing the `widgets` collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Gadget {
    meta: RecordMeta,
    pub name: String,
    pub audit: Audit,
}

impl Gadget {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }
}

impl Fields for Gadget {
    fn write_attributes(&self, attributes: &mut Attributes) -> StoreResult<()> {
        attributes.value("name", &self.name)?;
        self.audit.write_attributes(attributes)
    }

    fn schema() -> Schema<Self> {
        Schema::builder()
            .value("name", |gadget: &mut Gadget, name: String| gadget.name = name)
            .include(|gadget: &mut Gadget| &mut gadget.audit)
            .build()
    }
}

impl Record for Gadget {
    const TYPE_TAG: &'static str = "Gadget";

    fn collection_name() -> &'static str { "widgets" }
    fn meta(&self) -> &RecordMeta { &self.meta }
    fn meta_mut(&mut self) -> &mut RecordMeta { &mut self.meta }
}

pub fn sample_widget() -> Widget {
    Widget {
        size: Dimensions { width: 4, height: 2 },
        owner: Some(Owner::new("ada", Some("ada@example.com"))),
        parts: vec![Part::new("seal", 2), Part::new("bolt", 8)],
        audit: Audit { created_by: "tests".into(), revision: 1 },
        ..Widget::new("a", &["x", "y"])
    }
}

/// Every fixture record type, nested ones included.
pub fn registry() -> RecordRegistry {
    RecordRegistry::new()
        .with::<Widget>()
        .with::<Gadget>()
        .with::<Owner>()
        .with::<Part>()
}

/// A store over a fresh in-memory backend, plus a handle to inspect the raw documents.
pub fn memory_store() -> (InMemoryStore, Store) {
    let backend = InMemoryStore::new();
    let store = Store::builder(backend.clone())
        .registry(registry())
        .build();

    (backend, store)
}
