mod common;

use std::sync::Arc;

use async_trait::async_trait;
use recordlayer::{
    bson::{Bson, Document, oid::ObjectId},
    memory::InMemoryStore,
    prelude::*,
    query::FindQuery,
};

use common::{Audit, Dimensions, Gadget, Owner, Part, Widget, memory_store, registry, sample_widget};

#[tokio::test]
async fn save_inserts_new_record_and_adopts_identifier() {
    let (backend, store) = memory_store();
    let mut widget = sample_widget();

    assert!(widget.meta().is_new());
    assert!(widget.meta().id().is_none());

    assert!(widget.save_in(&store).await.unwrap());
    assert!(!widget.meta().is_new());

    let id = *widget.meta().id().unwrap();
    let documents = backend.documents("widgets").await;

    assert_eq!(documents.len(), 1);
    assert_eq!(documents[0].get_object_id("_id").unwrap(), id);
    assert_eq!(documents[0].get_str("typeTag").unwrap(), "Widget");
    assert!(!documents[0].contains_key("isNew"));

    let owner = documents[0].get_document("owner").unwrap();
    assert_eq!(owner.get_str("typeTag").unwrap(), "Owner");
    assert!(!owner.contains_key("_id"));
    assert_eq!(documents[0].get_array("parts").unwrap().len(), 2);
}

#[tokio::test]
async fn stored_document_has_sorted_attributes() {
    let (backend, store) = memory_store();
    let mut widget = Widget::new("a", &["x"]);
    widget.save_in(&store).await.unwrap();

    let document = backend.documents("widgets").await.remove(0);
    let keys = document.keys().map(String::as_str).collect::<Vec<_>>();

    assert_eq!(
        keys,
        ["_id", "createdBy", "name", "owner", "parts", "revision", "size", "tags", "typeTag"]
    );
}

#[tokio::test]
async fn find_by_id_reconstructs_nested_records() {
    let (_, store) = memory_store();
    let mut widget = sample_widget();
    widget.save_in(&store).await.unwrap();

    let id = widget.meta().id().unwrap().to_hex();
    let loaded = Widget::find_by_id_in(&store, &id).await.unwrap().unwrap();

    assert_eq!(loaded, widget);
    assert!(!loaded.meta().is_new());

    let owner = loaded.owner.as_ref().unwrap();
    assert_eq!(owner.name, "ada");
    assert!(owner.meta().is_new());
    assert!(owner.meta().id().is_none());
    assert!(loaded.parts.iter().all(|part| part.meta().is_new()));
}

#[tokio::test]
async fn save_on_existing_record_replaces_document() {
    let (backend, store) = memory_store();
    let mut widget = sample_widget();
    widget.save_in(&store).await.unwrap();
    let id = *widget.meta().id().unwrap();

    widget.name = "renamed".into();
    widget.owner = None;
    widget.parts.truncate(1);
    assert!(widget.save_in(&store).await.unwrap());

    let documents = backend.documents("widgets").await;
    assert_eq!(documents.len(), 1);
    assert_eq!(documents[0].get_object_id("_id").unwrap(), id);
    assert_eq!(documents[0].get_str("name").unwrap(), "renamed");
    assert_eq!(documents[0].get("owner"), Some(&Bson::Null));
    assert_eq!(documents[0].get_array("parts").unwrap().len(), 1);
    assert_eq!(widget.meta().id(), Some(&id));
}

#[tokio::test]
async fn repeated_save_without_changes_is_idempotent() {
    let (backend, store) = memory_store();
    let mut widget = sample_widget();
    widget.save_in(&store).await.unwrap();
    let before = backend.documents("widgets").await;

    assert!(widget.save_in(&store).await.unwrap());
    assert!(widget.save_in(&store).await.unwrap());

    assert_eq!(backend.documents("widgets").await, before);
}

#[tokio::test]
async fn save_of_removed_record_reports_false() {
    let (backend, store) = memory_store();
    let mut widget = sample_widget();
    widget.save_in(&store).await.unwrap();
    widget.delete_in(&store).await.unwrap();

    assert!(!widget.save_in(&store).await.unwrap());
    assert!(backend.documents("widgets").await.is_empty());
}

#[tokio::test]
async fn delete_removes_document_once() {
    let (_, store) = memory_store();
    let mut widget = sample_widget();
    widget.save_in(&store).await.unwrap();
    let id = widget.meta().id().unwrap().to_hex();

    assert!(widget.delete_in(&store).await.unwrap());
    assert!(!widget.delete_in(&store).await.unwrap());
    assert!(Widget::find_by_id_in(&store, &id).await.unwrap().is_none());

    // the record keeps its identity
    assert!(!widget.meta().is_new());
}

#[tokio::test]
async fn delete_of_unsaved_record_is_rejected() {
    let (_, store) = memory_store();
    let widget = Widget::new("a", &[]);

    let err = widget.delete_in(&store).await.unwrap_err();
    assert!(matches!(err, StoreError::InvalidArgument(_)));
}

#[derive(Debug, Default)]
struct UnacknowledgedBackend;

#[async_trait]
impl StoreBackend for UnacknowledgedBackend {
    async fn find_documents(&self, _: &str, _: &FindQuery) -> StoreResult<Vec<Document>> {
        Ok(Vec::new())
    }

    async fn insert_document(&self, _: &str, _: Document) -> StoreResult<Option<Bson>> {
        Ok(None)
    }

    async fn replace_document(&self, _: &str, _: &ObjectId, _: Document) -> StoreResult<u64> {
        Ok(0)
    }

    async fn delete_document(&self, _: &str, _: &ObjectId) -> StoreResult<u64> {
        Ok(0)
    }
}

#[derive(Debug, Default)]
struct StringIdBackend;

#[async_trait]
impl StoreBackend for StringIdBackend {
    async fn find_documents(&self, _: &str, _: &FindQuery) -> StoreResult<Vec<Document>> {
        Ok(vec![doc! { "typeTag": "Widget", "name": "no id" }])
    }

    async fn insert_document(&self, _: &str, _: Document) -> StoreResult<Option<Bson>> {
        Ok(Some(Bson::String("custom".into())))
    }

    async fn replace_document(&self, _: &str, _: &ObjectId, _: Document) -> StoreResult<u64> {
        Ok(0)
    }

    async fn delete_document(&self, _: &str, _: &ObjectId) -> StoreResult<u64> {
        Ok(0)
    }
}

#[tokio::test]
async fn unacknowledged_insert_leaves_record_new() {
    let store = Store::builder(UnacknowledgedBackend)
        .registry(registry())
        .build();
    let mut widget = sample_widget();

    assert!(!widget.save_in(&store).await.unwrap());
    assert!(widget.meta().is_new());
    assert!(widget.meta().id().is_none());
}

#[tokio::test]
async fn foreign_identifiers_are_rejected() {
    let store = Store::builder(StringIdBackend)
        .registry(registry())
        .build();
    let mut widget = sample_widget();

    let err = widget.save_in(&store).await.unwrap_err();
    assert!(matches!(err, StoreError::MissingIdentifier(_)));
    assert!(widget.meta().is_new());

    let err = Widget::find_in(&store, FindOptions::new()).await.unwrap_err();
    assert!(matches!(err, StoreError::MissingIdentifier(_)));
}

#[tokio::test]
async fn save_with_unregistered_nested_type_writes_nothing() {
    let backend = InMemoryStore::new();
    let store = Store::builder(backend.clone())
        .register::<Widget>()
        .register::<Part>()
        .build();
    let mut widget = sample_widget();

    let err = widget.save_in(&store).await.unwrap_err();

    assert!(matches!(err, StoreError::UnregisteredType(tag) if tag == "Owner"));
    assert!(widget.meta().is_new());
    assert!(widget.meta().id().is_none());
    assert!(backend.documents("widgets").await.is_empty());

    widget.owner = None;
    assert!(widget.save_in(&store).await.unwrap());
    assert_eq!(backend.documents("widgets").await.len(), 1);
}

async fn seed_widgets(store: &Store, count: i32) {
    for index in 0..count {
        let tags: &[&str] = if index % 2 == 0 { &["even"] } else { &["odd"] };
        let mut widget = Widget::new(&format!("w{index:02}"), tags);
        widget.size = Dimensions { width: index, height: count - index };
        widget.save_in(store).await.unwrap();
    }
}

#[tokio::test]
async fn find_applies_default_limit() {
    let (_, store) = memory_store();
    seed_widgets(&store, 25).await;

    let found = Widget::find_in(&store, FindOptions::new()).await.unwrap();
    assert_eq!(found.len(), DEFAULT_LIMIT);

    let all = Widget::find_in(&store, FindOptions::builder().unlimited().build()).await.unwrap();
    assert_eq!(all.len(), 25);
    assert!(all.iter().all(|widget| !widget.meta().is_new()));
}

#[tokio::test]
async fn find_filters_sorts_and_limits_per_call() {
    let (_, store) = memory_store();
    seed_widgets(&store, 10).await;

    let options = FindOptions::builder()
        .filter(doc! { "tags": "even", "size.width": { "$gte": 4 } })
        .sort_by("size.width", SortDirection::Desc)
        .limit(2)
        .build();
    let names = Widget::find_in(&store, options)
        .await
        .unwrap()
        .into_iter()
        .map(|widget| widget.name)
        .collect::<Vec<_>>();

    assert_eq!(names, ["w08", "w06"]);

    // a later call without sort or limit is not affected
    let found = Widget::find_in(&store, FindOptions::matching(doc! { "tags": "odd" })).await.unwrap();
    assert_eq!(found.len(), 5);
    assert_eq!(found[0].name, "w01");
}

#[tokio::test]
async fn find_with_sort_document() {
    let (_, store) = memory_store();
    seed_widgets(&store, 3).await;

    let options = FindOptions::builder()
        .sort(doc! { "size.height": 1 })
        .build();
    let found = Widget::find_in(&store, options).await.unwrap();

    assert_eq!(found[0].name, "w02");

    let err = Widget::find_in(&store, FindOptions::builder().sort(doc! { "name": "up" }).build())
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidArgument(_)));
}

#[tokio::test]
async fn find_one_returns_first_match_or_none() {
    let (_, store) = memory_store();
    seed_widgets(&store, 3).await;

    let options = FindOptions::builder()
        .sort_by("name", SortDirection::Desc)
        .build();
    let found = Widget::find_one_in(&store, options).await.unwrap().unwrap();
    assert_eq!(found.name, "w02");

    let missing = Widget::find_one_in(&store, FindOptions::matching(doc! { "name": "nope" }))
        .await
        .unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn find_by_id_validates_identifier() {
    let (_, store) = memory_store();

    let err = Widget::find_by_id_in(&store, "not-an-id").await.unwrap_err();
    assert!(matches!(err, StoreError::InvalidArgument(_)));

    let absent = ObjectId::new().to_hex();
    assert!(Widget::find_by_id_in(&store, &absent).await.unwrap().is_none());
}

#[tokio::test]
async fn find_by_nested_record_field() {
    let (_, store) = memory_store();
    let mut with_owner = sample_widget();
    with_owner.save_in(&store).await.unwrap();
    Widget::new("b", &[]).save_in(&store).await.unwrap();

    let found = Widget::find_in(&store, FindOptions::matching(doc! { "owner.name": "ada" }))
        .await
        .unwrap();

    assert_eq!(found.len(), 1);
    assert_eq!(found[0].owner, with_owner.owner);
}

#[tokio::test]
async fn unknown_document_fields_are_skipped() {
    let (backend, store) = memory_store();
    let id = ObjectId::new();
    backend
        .insert_document("widgets", doc! {
            "_id": id,
            "typeTag": "Widget",
            "name": "legacy",
            "discontinued": true,
            "revision": 7,
        })
        .await
        .unwrap();

    let widget = Widget::find_by_id_in(&store, &id.to_hex()).await.unwrap().unwrap();

    assert_eq!(widget.name, "legacy");
    assert_eq!(widget.audit, Audit { created_by: String::new(), revision: 7 });
    assert!(widget.tags.is_empty());
    assert_eq!(widget.meta().id(), Some(&id));
}

#[tokio::test]
async fn untagged_and_unregistered_documents_are_rejected() {
    let (backend, store) = memory_store();
    backend
        .insert_document("widgets", doc! { "name": "untagged" })
        .await
        .unwrap();

    let err = Widget::find_in(&store, FindOptions::new()).await.unwrap_err();
    assert!(matches!(err, StoreError::InvalidDocument(_)));

    let (backend, store) = memory_store();
    backend
        .insert_document("widgets", doc! { "typeTag": "Sprocket" })
        .await
        .unwrap();

    let err = Widget::find_in(&store, FindOptions::new()).await.unwrap_err();
    assert!(matches!(err, StoreError::UnregisteredType(tag) if tag == "Sprocket"));
}

#[tokio::test]
async fn shared_collection_loads_each_concrete_type() {
    let (_, store) = memory_store();
    sample_widget().save_in(&store).await.unwrap();
    Gadget::new("g").save_in(&store).await.unwrap();

    let records = store
        .find("widgets", FindOptions::builder().sort_by("name", SortDirection::Asc).build())
        .await
        .unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].downcast_ref::<Widget>().map(|widget| widget.name.as_str()), Some("a"));
    assert_eq!(records[1].downcast_ref::<Gadget>().map(|gadget| gadget.name.as_str()), Some("g"));
    assert!(records.iter().all(|record| !record.record_meta().is_new()));

    let err = Widget::find_in(&store, FindOptions::new()).await.unwrap_err();
    assert!(matches!(
        err,
        StoreError::TypeMismatch { expected: "Widget", found: "Gadget" }
    ));

    let gadgets = Gadget::find_in(&store, FindOptions::matching(doc! { "typeTag": "Gadget" }))
        .await
        .unwrap();
    assert_eq!(gadgets.len(), 1);
}

#[tokio::test]
async fn unsupported_and_malformed_filters() {
    let (_, store) = memory_store();
    seed_widgets(&store, 2).await;

    let err = Widget::find_in(&store, FindOptions::matching(doc! { "name": { "$regex": "^w" } }))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Unsupported(_)));

    let err = Widget::find_in(&store, FindOptions::matching(doc! { "$or": 1 }))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidArgument(_)));
}

#[tokio::test]
async fn records_of_other_collections_are_independent() {
    let (backend, store) = memory_store();
    let mut part = Part::new("spare", 1);
    let mut owner = Owner::new("grace", None);

    part.save_in(&store).await.unwrap();
    owner.save_in(&store).await.unwrap();

    assert_eq!(backend.collection_names().await, ["owners", "parts"]);

    let loaded = Owner::find_by_id_in(&store, &owner.meta().id().unwrap().to_hex())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(loaded.email, None);
    assert!(Part::find_in(&store, FindOptions::new()).await.unwrap().len() == 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_queries_keep_their_own_options() {
    let (_, store) = memory_store();
    seed_widgets(&store, 12).await;
    let store = Arc::new(store);

    let tasks = (1..=8)
        .map(|limit| {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                let options = FindOptions::builder()
                    .sort_by("size.width", if limit % 2 == 0 { SortDirection::Asc } else { SortDirection::Desc })
                    .limit(limit)
                    .build();
                (limit, Widget::find_in(&store, options).await)
            })
        })
        .collect::<Vec<_>>();

    for task in tasks {
        let (limit, found) = task.await.unwrap();
        let found = found.unwrap();
        let expected_first = if limit % 2 == 0 { "w00" } else { "w11" };

        assert_eq!(found.len(), limit);
        assert_eq!(found[0].name, expected_first);
    }
}

#[tokio::test]
async fn store_reports_configuration() {
    let store = Store::builder(InMemoryStore::new())
        .registry(RecordRegistry::new().with::<Widget>())
        .default_limit(5)
        .build();

    assert_eq!(store.default_limit(), 5);
    assert_eq!(store.registry().type_tags(), ["Widget"]);
    assert_eq!(store.registry().collection_of("Widget"), Some("widgets"));
}
