//! Demo entities: persons owning pets (typed rows) and free-form notes (documents).
//!
//! Persons carry a compare-and-swap stamp. Every write replaces `cas`, and
//! the `version` filter (`version[cas]=<n>`) makes a write apply only while
//! the stored stamp still matches.

use quickapi_model::{
    hook, Column, Entity, EntityDescriptor, NamedFilter, PreloadRegistry, PreloadSpec, RecordHandler,
    Relation, TableSchema,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pet {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub alive: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub person_id: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Person {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub age: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cas: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pets: Vec<Pet>,
}

pub fn pet_schema() -> TableSchema {
    TableSchema::new("id")
        .column(Column::text("name"))
        .column(Column::boolean("alive"))
        .column(Column::integer("person_id").nullable())
}

pub fn person_schema() -> TableSchema {
    TableSchema::new("id")
        .column(Column::text("name"))
        .column(Column::integer("age"))
        .column(Column::integer("cas").nullable())
        .relation(Relation::has_many("pets", "pets", "person_id", pet_schema()))
}

/// Replaces `cas` on every write and checks the record's invariants.
pub struct PersonHandler {
    last: AtomicI64,
}

impl PersonHandler {
    pub fn new() -> Self {
        Self {
            last: AtomicI64::new(0),
        }
    }

    /// A stamp never handed out before by this handler.
    fn next_stamp(&self) -> i64 {
        let now = chrono::Utc::now().timestamp_micros();
        let prev = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| Some(now.max(last + 1)))
            .unwrap_or(now);
        now.max(prev + 1)
    }
}

impl Default for PersonHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordHandler for PersonHandler {
    fn validate(&self, record: &Value) -> Result<(), String> {
        if record["name"].as_str().is_none_or(str::is_empty) {
            return Err("name is required".into());
        }
        if record["age"].as_i64().is_some_and(|age| age < 0) {
            return Err("age must not be negative".into());
        }
        Ok(())
    }

    fn before_save(&self, fields: &mut Map<String, Value>) {
        fields.insert("cas".into(), json!(self.next_stamp()));
    }
}

/// `version[cas]=<n>`: only touch the row while its stamp is `n`.
pub fn version_filter() -> NamedFilter {
    NamedFilter::new("version", |data| {
        let cas = data.get("cas").and_then(|v| v.parse::<i64>().ok());
        hook(move |q| match cas {
            Some(cas) => q.eq("cas", cas),
            None => q,
        })
    })
}

pub fn person_preloads() -> PreloadRegistry {
    PreloadRegistry::new()
        .alias(
            "status",
            "pets",
            PreloadSpec::when(r#""alive" = ?"#).with_converter(|raw| json!(raw.eq_ignore_ascii_case("true"))),
        )
        .alias("naming", "pets", PreloadSpec::when(r#""name" = ?"#))
        .alias("plain", "pets", PreloadSpec::always())
}

pub fn persons() -> Arc<dyn Entity> {
    EntityDescriptor::<Person>::typed("persons", person_schema())
        .with_preloads(person_preloads())
        .with_scopes(vec![version_filter()])
        .with_handler(PersonHandler::new())
        .shared()
}

pub fn pets() -> Arc<dyn Entity> {
    EntityDescriptor::<Pet>::typed("pets", pet_schema()).shared()
}

pub fn notes() -> Arc<dyn Entity> {
    EntityDescriptor::<Value>::document("notes").shared()
}

/// All demo entities, parents first.
pub fn entities() -> Vec<Arc<dyn Entity>> {
    vec![persons(), pets(), notes()]
}
