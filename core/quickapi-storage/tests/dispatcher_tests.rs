use quickapi_db::Database;
use quickapi_model::{Column, EntityDescriptor, EntityKind, Relation, TableSchema};
use quickapi_storage::{create_storage, ensure_schema, schema_sql, CreateRequest, StorageError};
use serde_json::{json, Value};
use tempfile::TempDir;

fn pets_schema() -> TableSchema {
    TableSchema::new("id")
        .column(Column::text("name"))
        .column(Column::boolean("alive"))
        .column(Column::json("tags").nullable())
}

fn is_configuration(result: Result<impl Sized, StorageError>) -> bool {
    matches!(result, Err(StorageError::Configuration(_)))
}

// ── Dispatch ─────────────────────────────────────────────────────

#[test]
fn typed_entity_gets_row_storage() {
    let db = Database::open_in_memory().unwrap();
    let entity = EntityDescriptor::<Value>::typed("pets", pets_schema()).shared();
    ensure_schema(&db, entity.as_ref()).unwrap();

    let store = create_storage(&db, entity).unwrap();
    let created = store
        .create(CreateRequest::new(json!({"name": "Rex", "alive": true, "tags": ["good"]})))
        .unwrap();
    assert_eq!(created["tags"], json!(["good"]));
    assert!(created.get("data").is_none());
}

#[test]
fn document_entity_gets_envelope_storage() {
    let db = Database::open_in_memory().unwrap();
    let entity = EntityDescriptor::<Value>::document("notes").shared();
    ensure_schema(&db, entity.as_ref()).unwrap();

    let store = create_storage(&db, entity).unwrap();
    let created = store.create(CreateRequest::new(json!({"title": "x"}))).unwrap();
    assert_eq!(created["data"], json!({"title": "x"}));
}

#[test]
fn typed_entity_without_schema_is_rejected() {
    let db = Database::open_in_memory().unwrap();
    let entity = EntityDescriptor::<Value>::with_kind("pets", EntityKind::Typed, None).shared();
    assert!(is_configuration(create_storage(&db, entity)));
}

#[test]
fn invalid_table_names_are_rejected() {
    let db = Database::open_in_memory().unwrap();
    for name in ["", "pets; DROP TABLE x", "2pets"] {
        let typed = EntityDescriptor::<Value>::typed(name, pets_schema()).shared();
        assert!(is_configuration(create_storage(&db, typed)), "typed '{name}'");

        let document = EntityDescriptor::<Value>::document(name).shared();
        assert!(is_configuration(create_storage(&db, document)), "document '{name}'");
    }
}

#[test]
fn root_entities_use_their_table_override() {
    let db = Database::open_in_memory().unwrap();

    let typed = EntityDescriptor::<Value>::typed("", pets_schema()).with_table("pets").shared();
    ensure_schema(&db, typed.as_ref()).unwrap();
    assert!(db.table_exists("pets").unwrap());
    let store = create_storage(&db, typed).unwrap();
    let created = store.create(CreateRequest::new(json!({"name": "Rex", "alive": true}))).unwrap();
    assert_eq!(created["id"], 1);

    let document = EntityDescriptor::<Value>::document("").with_table("notes").shared();
    ensure_schema(&db, document.as_ref()).unwrap();
    let store = create_storage(&db, document).unwrap();
    let created = store.create(CreateRequest::new(json!({"title": "x"}))).unwrap();
    assert_eq!(created["data"], json!({"title": "x"}));
}

#[test]
fn invalid_column_names_are_rejected() {
    let db = Database::open_in_memory().unwrap();
    let schema = TableSchema::new("id").column(Column::text("name\" TEXT, evil"));
    let entity = EntityDescriptor::<Value>::typed("pets", schema).shared();
    assert!(is_configuration(create_storage(&db, entity)));
}

// ── Schema bring-up ──────────────────────────────────────────────

#[test]
fn ensure_schema_is_idempotent() {
    let db = Database::open_in_memory().unwrap();
    let entity = EntityDescriptor::<Value>::document("notes").shared();
    ensure_schema(&db, entity.as_ref()).unwrap();
    ensure_schema(&db, entity.as_ref()).unwrap();
    assert!(db.table_exists("notes").unwrap());
}

#[test]
fn relation_tables_are_created_with_foreign_key() {
    let db = Database::open_in_memory().unwrap();
    let toys = TableSchema::new("id").column(Column::text("label"));
    let schema = TableSchema::new("id")
        .column(Column::text("name"))
        .relation(Relation::has_many("toys", "toys", "owner_id", toys));
    let entity = EntityDescriptor::<Value>::typed("owners", schema).shared();

    let sql = schema_sql(entity.as_ref()).unwrap();
    assert!(sql.contains(r#""owner_id" INTEGER REFERENCES "owners" ON DELETE CASCADE"#));
    assert!(sql.contains(r#"CREATE INDEX IF NOT EXISTS "idx_toys_owner_id""#));

    ensure_schema(&db, entity.as_ref()).unwrap();
    assert!(db.table_exists("owners").unwrap());
    assert!(db.table_exists("toys").unwrap());
}

#[test]
fn non_nullable_columns_are_not_null() {
    let entity = EntityDescriptor::<Value>::typed("pets", pets_schema()).shared();
    let sql = schema_sql(entity.as_ref()).unwrap();
    assert!(sql.contains(r#""id" INTEGER PRIMARY KEY AUTOINCREMENT"#));
    assert!(sql.contains(r#""name" TEXT NOT NULL"#));
    assert!(sql.contains(r#""alive" INTEGER NOT NULL"#));
    assert!(!sql.contains(r#""tags" TEXT NOT NULL"#));
}

#[test]
fn schema_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("quickapi.db");
    let entity = EntityDescriptor::<Value>::document("notes").shared();

    {
        let db = Database::open(&path).unwrap();
        ensure_schema(&db, entity.as_ref()).unwrap();
        let store = create_storage(&db, entity.clone()).unwrap();
        store.create(CreateRequest::new(json!({"title": "kept"}))).unwrap();
    }

    let db = Database::open(&path).unwrap();
    ensure_schema(&db, entity.as_ref()).unwrap();
    let store = create_storage(&db, entity).unwrap();
    let read = store.read(quickapi_storage::ReadRequest::new(1)).unwrap();
    assert_eq!(read["data"]["title"], "kept");
}
