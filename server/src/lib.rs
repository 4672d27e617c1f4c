//! Process bootstrap for QuickAPI: schema bring-up and the HTTP app.

pub mod demo;

use axum::Router;
use quickapi_api::http::router;
use quickapi_api::HttpConfig;
use quickapi_db::Database;
use quickapi_model::Entity;
use quickapi_storage::{ensure_schema, StorageResult};
use std::sync::Arc;

/// Creates the tables of every entity, then builds the router serving them.
///
/// Entities are brought up in the order given, so a parent that owns a
/// relation table should come before an entity stored in that table.
pub fn build_app(db: &Database, entities: &[Arc<dyn Entity>], config: HttpConfig) -> StorageResult<Router> {
    for entity in entities {
        ensure_schema(db, entity.as_ref())?;
    }
    router(db, entities, config)
}
