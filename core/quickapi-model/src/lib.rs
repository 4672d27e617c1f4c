//! Core entity model for QuickAPI.
//!
//! Defines the per-record-type configuration every other crate consumes:
//! - [`Entity`] / [`EntityDescriptor`] - name, storage kind, factories and optional capabilities
//! - [`TableSchema`] - the column/relation layout of a typed entity
//! - [`NamedFilter`] - caller-activatable scopes that turn query maps into [`Hook`]s
//! - [`PreloadSpec`] / [`PreloadRegistry`] - alias-driven conditional eager loads
//! - [`Query`] - the predicate/order/preload value that hooks transform
//! - [`RecordHandler`] - optional lifecycle callbacks (validate, before save, after load)
//!
//! Nothing here performs I/O. Storage engines in `quickapi-storage` interpret
//! these values against SQLite.

mod entity;
mod error;
mod filter;
mod handler;
mod preload;
mod query;
mod schema;

pub use entity::{Entity, EntityDescriptor, EntityKind};
pub use error::{ModelError, ModelResult};
pub use filter::{create_hooks, NamedFilter, ScopeData, ScopeFn, ScopeSource};
pub use handler::RecordHandler;
pub use preload::{resolve_preloads, Converter, PreloadRegistry, PreloadSource, PreloadSpec, ALWAYS_TRUE};
pub use query::{apply_hooks, hook, quote_ident, Condition, Hook, OrderBy, Preload, Query, SortDirection};
pub use schema::{Column, ColumnType, Relation, TableSchema};
