//! SQLite storage engines for QuickAPI.
//!
//! Every entity is served through the [`Storage`] contract. Which engine
//! implements it depends on the entity's kind:
//! - [`TypedStore`]: one column per field, has-many relations in child tables
//! - [`DocumentStore`]: the record as JSON inside an `{id, created, updated, data}` envelope
//!
//! [`create_storage`] picks the engine; [`ensure_schema`] brings up the tables
//! an entity needs.

mod dispatcher;
mod document;
mod error;
mod request;
mod schema;
mod sql;
mod typed;

pub use dispatcher::create_storage;
pub use document::{DocumentEnvelope, DocumentStore};
pub use error::{StorageError, StorageResult, StoreErrorKind};
pub use request::{
    CreateRequest, DeleteRequest, PatchRequest, ReadRequest, RecordId, SearchRequest, UpdateRequest,
    DEFAULT_TAKE,
};
pub use schema::{ensure_schema, schema_sql};
pub use typed::TypedStore;

use serde_json::Value;

/// CRUD, search and patch over one entity's records.
///
/// Operations are synchronous and independent: each borrows the shared
/// connection for its own statements only. Scope hooks carried by a request
/// narrow the rows an operation may touch; a row they exclude is reported as
/// [`StorageError::NotFound`].
pub trait Storage: Send + Sync {
    /// Persists a new record and returns it as stored.
    fn create(&self, req: CreateRequest) -> StorageResult<Value>;

    /// Fetches one record, with any requested preloads attached.
    fn read(&self, req: ReadRequest) -> StorageResult<Value>;

    /// Replaces a record. The id in the request wins over any id in the payload.
    fn update(&self, req: UpdateRequest) -> StorageResult<Value>;

    fn delete(&self, req: DeleteRequest) -> StorageResult<()>;

    /// Returns at most `take` records after skipping `skip`.
    fn search(&self, req: SearchRequest) -> StorageResult<Vec<Value>>;

    /// Changes only the named fields and returns the record afterwards.
    fn patch(&self, req: PatchRequest) -> StorageResult<Value>;
}
