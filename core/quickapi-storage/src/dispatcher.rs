use crate::document::DocumentStore;
use crate::error::StorageResult;
use crate::typed::TypedStore;
use crate::Storage;
use quickapi_db::Database;
use quickapi_model::{Entity, EntityKind};
use std::sync::Arc;
use tracing::debug;

/// Returns the storage engine for `entity`'s kind.
///
/// Fails with a configuration error when the entity cannot be served: an
/// invalid or empty table name, or a typed entity without a schema.
pub fn create_storage(db: &Database, entity: Arc<dyn Entity>) -> StorageResult<Arc<dyn Storage>> {
    debug!("creating {} storage for '{}'", entity.kind(), entity.name());
    let storage: Arc<dyn Storage> = match entity.kind() {
        EntityKind::Typed => Arc::new(TypedStore::new(db.clone(), entity)?),
        EntityKind::Document => Arc::new(DocumentStore::new(db.clone(), entity)?),
    };
    Ok(storage)
}
