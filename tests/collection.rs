//! Integration tests for persisting records through collections.
//!
//! Each test works on its own database file in a temporary directory and,
//! unless it checks the process-wide registry, its own connection registry.

use std::sync::Arc;

use modeldb::{
    Collection, ConnectionOptions, ConnectionRegistry, DocumentStore, Field, ModelDBError,
    ModelDefinition, Record, StorageError,
};
use serde_json::{json, Value};
use tempfile::{tempdir, TempDir};

fn address() -> Arc<ModelDefinition> {
    ModelDefinition::builder("Address")
        .field("city", Field::string().required())
        .field("zip", Field::string())
        .build()
        .unwrap()
}

fn user(address: &Arc<ModelDefinition>) -> Arc<ModelDefinition> {
    ModelDefinition::builder("User")
        .field("email", Field::string().primary().indexed())
        .field("name", Field::string().required())
        .field("age", Field::integer().indexed())
        .field("address", Field::model(address))
        .build()
        .unwrap()
}

fn note() -> Arc<ModelDefinition> {
    ModelDefinition::builder("Note")
        .field("title", Field::string().required())
        .field("tag", Field::string().indexed())
        .build()
        .unwrap()
}

fn options(dir: &TempDir) -> ConnectionOptions {
    ConnectionOptions::new(dir.path().join("test.redb"))
}

fn collection(definition: &Arc<ModelDefinition>) -> (Collection, TempDir) {
    let dir = tempdir().unwrap();
    let collection =
        Collection::with_registry(definition, options(&dir), Arc::new(ConnectionRegistry::new()));
    (collection, dir)
}

fn ada(definition: &Arc<ModelDefinition>) -> Record {
    Record::from_map(
        definition,
        json!({
            "email": "ada@example.com",
            "name": "Ada",
            "age": 36,
            "address": {"city": "London", "zip": "N1"}
        })
        .as_object()
        .cloned()
        .unwrap(),
    )
    .unwrap()
}

// ============================================================================
// CRUD Tests
// ============================================================================

#[tokio::test]
async fn test_create_read_update_delete() {
    let user = user(&address());
    let (users, _dir) = collection(&user);

    let mut record = ada(&user);
    let key = users.create(&mut record).await.unwrap();
    assert_eq!(key, json!("ada@example.com"));
    assert_eq!(users.count().await.unwrap(), 1);

    let stored = users.read("ada@example.com").await.unwrap().unwrap();
    assert_eq!(stored, record);

    record.set("age", 37).unwrap();
    assert!(users.update(&record).await.unwrap());
    let stored = users.read("ada@example.com").await.unwrap().unwrap();
    assert_eq!(stored.value("age"), Some(&json!(37)));

    assert!(users.delete(&record).await.unwrap());
    assert!(users.read("ada@example.com").await.unwrap().is_none());
    assert_eq!(users.count().await.unwrap(), 0);

    assert!(!users.delete(&record).await.unwrap());
}

#[tokio::test]
async fn test_nested_record_persisted_as_mapping() {
    let address = address();
    let user = user(&address);
    let (users, _dir) = collection(&user);

    let mut record = ada(&user);
    users.create(&mut record).await.unwrap();

    let stored = users.read("ada@example.com").await.unwrap().unwrap();
    let nested = stored.nested("address").expect("address should be a record");
    assert!(Arc::ptr_eq(nested.definition(), &address));
    assert_eq!(nested.value("city"), Some(&json!("London")));

    assert_eq!(
        stored.serialize(true).unwrap()["address"],
        json!({"city": "London", "zip": "N1"})
    );
}

#[tokio::test]
async fn test_generated_key_round_trip() {
    let note = note();
    let (notes, _dir) = collection(&note);

    let mut record = Record::with(&note, None, [("title", "first")]).unwrap();
    let key = notes.create(&mut record).await.unwrap();

    assert!(key.is_string());
    assert_eq!(record.primary_key(), Some(&key));

    let stored = notes.read(key.clone()).await.unwrap().unwrap();
    assert_eq!(stored.value("id"), Some(&key));
    assert_eq!(stored.value("title"), Some(&json!("first")));
}

#[tokio::test]
async fn test_create_duplicate_key_rejected() {
    let user = user(&address());
    let (users, _dir) = collection(&user);

    users.create(&mut ada(&user)).await.unwrap();
    let err = users.create(&mut ada(&user)).await.unwrap_err();

    assert!(matches!(
        err,
        ModelDBError::Storage(StorageError::DuplicateKey { .. })
    ));
    assert_eq!(users.count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_create_missing_required_nested_field() {
    let user = user(&address());
    let (users, _dir) = collection(&user);

    let mut record = Record::from_map(
        &user,
        json!({"email": "x@example.com", "name": "X", "address": {"zip": "1"}})
            .as_object()
            .cloned()
            .unwrap(),
    )
    .unwrap();

    let err = users.create(&mut record).await.unwrap_err();
    assert!(err.is_missing_fields());
    assert_eq!(users.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_update_unknown_key_returns_false() {
    let user = user(&address());
    let (users, _dir) = collection(&user);

    assert!(!users.update(&ada(&user)).await.unwrap());
}

// ============================================================================
// Index Tests
// ============================================================================

#[tokio::test]
async fn test_find_by_indexed_field() {
    let note = note();
    let (notes, _dir) = collection(&note);

    for (title, tag) in [("a", "red"), ("b", "blue"), ("c", "red")] {
        let mut record = Record::with(&note, None, [("title", title), ("tag", tag)]).unwrap();
        notes.create(&mut record).await.unwrap();
    }

    let mut titles: Vec<Value> = notes
        .find_by("tag", "red")
        .await
        .unwrap()
        .iter()
        .filter_map(|record| record.value("title").cloned())
        .collect();
    titles.sort_by_key(|title| title.to_string());
    assert_eq!(titles, vec![json!("a"), json!("c")]);

    assert!(notes.find_by("tag", "green").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_find_by_follows_updates() {
    let user = user(&address());
    let (users, _dir) = collection(&user);

    let mut record = ada(&user);
    users.create(&mut record).await.unwrap();

    record.set("age", 40).unwrap();
    users.update(&record).await.unwrap();

    assert!(users.find_by("age", 36).await.unwrap().is_empty());
    assert_eq!(users.find_by("age", 40).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_find_by_unindexed_field_rejected() {
    let user = user(&address());
    let (users, _dir) = collection(&user);

    let err = users.find_by("name", "Ada").await.unwrap_err();
    assert!(matches!(
        err,
        ModelDBError::Storage(StorageError::IndexNotFound { ref field, .. }) if field == "name"
    ));

    let err = users.find_by("nope", "Ada").await.unwrap_err();
    assert!(err.is_model());
}

// ============================================================================
// Table Lifecycle Tests
// ============================================================================

#[tokio::test]
async fn test_drop_table_then_reuse() {
    let note = note();
    let (notes, _dir) = collection(&note);

    let mut record = Record::with(&note, None, [("title", "t")]).unwrap();
    notes.create(&mut record).await.unwrap();

    assert!(notes.drop_table().await.unwrap());
    assert_eq!(notes.count().await.unwrap(), 0);

    let mut record = Record::with(&note, None, [("title", "again"), ("tag", "x")]).unwrap();
    notes.create(&mut record).await.unwrap();
    assert_eq!(notes.find_by("tag", "x").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_data_persists_across_reconnect() {
    let user = user(&address());
    let dir = tempdir().unwrap();

    {
        let users =
            Collection::with_registry(&user, options(&dir), Arc::new(ConnectionRegistry::new()));
        users.create(&mut ada(&user)).await.unwrap();
        users.close().await.unwrap();
    }

    let users =
        Collection::with_registry(&user, options(&dir), Arc::new(ConnectionRegistry::new()));
    let stored = users.read("ada@example.com").await.unwrap().unwrap();
    assert_eq!(stored.value("name"), Some(&json!("Ada")));
    assert_eq!(users.find_by("age", 36).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_separate_databases_in_one_file() {
    let note = note();
    let dir = tempdir().unwrap();
    let registry = Arc::new(ConnectionRegistry::new());

    let first = Collection::with_registry(&note, options(&dir), Arc::clone(&registry));
    let second =
        Collection::with_registry(&note, options(&dir).with_db("other"), Arc::clone(&registry));

    first
        .create(&mut Record::with(&note, None, [("title", "t"), ("tag", "x")]).unwrap())
        .await
        .unwrap();
    assert_eq!(second.count().await.unwrap(), 0);

    second
        .create(&mut Record::with(&note, None, [("title", "u"), ("tag", "x")]).unwrap())
        .await
        .unwrap();
    second
        .create(&mut Record::with(&note, None, [("title", "v"), ("tag", "x")]).unwrap())
        .await
        .unwrap();

    assert_eq!(first.count().await.unwrap(), 1);
    assert_eq!(second.count().await.unwrap(), 2);
    assert_eq!(first.find_by("tag", "x").await.unwrap().len(), 1);
    assert_eq!(second.find_by("tag", "x").await.unwrap().len(), 2);

    let store = first.connect().await.unwrap().store().unwrap();
    let mut databases = store.list_databases().unwrap();
    databases.sort();
    assert_eq!(databases, vec!["other", "test"]);
}

#[tokio::test]
async fn test_close_one_database_keeps_other_open() {
    let note = note();
    let dir = tempdir().unwrap();
    let registry = Arc::new(ConnectionRegistry::new());

    let first = Collection::with_registry(&note, options(&dir), Arc::clone(&registry));
    let second =
        Collection::with_registry(&note, options(&dir).with_db("other"), Arc::clone(&registry));

    assert_eq!(first.count().await.unwrap(), 0);
    assert_eq!(second.count().await.unwrap(), 0);

    first.close().await.unwrap();
    second
        .create(&mut Record::with(&note, None, [("title", "t")]).unwrap())
        .await
        .unwrap();

    // The closed collection reconnects onto the store still held by the other.
    assert_eq!(first.count().await.unwrap(), 0);
    assert_eq!(second.count().await.unwrap(), 1);
}

// ============================================================================
// Computed Field Tests
// ============================================================================

#[tokio::test]
async fn test_nested_computed_type_survives_read() {
    let stats = ModelDefinition::builder("Stats")
        .field("name", Field::string())
        .field(
            "summary",
            Field::string()
                .computed_fn(|| json!({"hits": 2}))
                .computed_type(),
        )
        .build()
        .unwrap();
    let page = ModelDefinition::builder("Page")
        .field("title", Field::string().indexed())
        .field("stats", Field::model(&stats))
        .build()
        .unwrap();
    let (pages, _dir) = collection(&page);

    let mut record = Record::with(&page, None, [("title", "home")]).unwrap();
    record.set("stats", json!({"name": "daily"})).unwrap();
    let key = pages.create(&mut record).await.unwrap();

    let stored = pages.read(key).await.unwrap().unwrap();
    let nested = stored.nested("stats").unwrap();
    assert_eq!(nested.value("name"), Some(&json!("daily")));
    assert!(!nested.is_set("summary"));
    assert_eq!(
        stored.serialize(true).unwrap()["stats"],
        json!({"name": "daily", "summary": {"hits": 2}})
    );

    let found = pages.find_by("title", "home").await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0], stored);
}

// ============================================================================
// Connection Sharing Tests
// ============================================================================

#[tokio::test]
async fn test_equal_options_share_connection() {
    let note = note();
    let user = user(&address());
    let dir = tempdir().unwrap();
    let registry = Arc::new(ConnectionRegistry::new());

    let notes = Collection::with_registry(&note, options(&dir), Arc::clone(&registry));
    let users = Collection::with_registry(&user, options(&dir), Arc::clone(&registry));

    let a = notes.connect().await.unwrap();
    let b = users.connect().await.unwrap();

    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(registry.open_count().await, 1);

    registry.close().await.unwrap();
    assert!(!a.is_open());
    assert_eq!(registry.open_count().await, 0);

    // Both reconnect transparently on the next operation.
    assert_eq!(notes.count().await.unwrap(), 0);
    assert_eq!(users.count().await.unwrap(), 0);
    assert_eq!(registry.open_count().await, 1);
}

#[tokio::test]
async fn test_global_registry_close() {
    let note = note();
    let dir = tempdir().unwrap();
    let notes = Collection::new(&note, options(&dir));

    notes
        .create(&mut Record::with(&note, None, [("title", "t")]).unwrap())
        .await
        .unwrap();

    ConnectionRegistry::global().close().await.unwrap();
    ConnectionRegistry::global().close().await.unwrap();

    assert_eq!(notes.count().await.unwrap(), 1);
}
