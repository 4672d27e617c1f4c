use crate::error::{ModelError, ModelResult};
use crate::filter::{NamedFilter, ScopeSource};
use crate::handler::RecordHandler;
use crate::preload::PreloadSource;
use crate::schema::TableSchema;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;
use std::sync::Arc;

/// How an entity's records are physically stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// One column per field in a table derived from the record shape.
    Typed,
    /// The whole record as JSON inside an `{id, created, updated, data}` envelope.
    Document,
}

impl EntityKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Typed => "typed",
            Self::Document => "document",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "typed" | "normal" => Ok(Self::Typed),
            "document" | "json" => Ok(Self::Document),
            other => Err(ModelError::UnknownKind(other.to_string())),
        }
    }
}

/// The per-record-type configuration every storage call is made against.
///
/// Capabilities are declared up front: an entity without a preload source or
/// scope source simply never resolves preloads or activates scopes.
pub trait Entity: Send + Sync {
    /// Resource name. Empty means the entity is served at the root path.
    fn name(&self) -> &str;

    /// Physical table name; the resource name unless overridden.
    fn table(&self) -> &str {
        self.name()
    }

    fn kind(&self) -> EntityKind;

    /// The zero value of the record.
    fn create(&self) -> Value;

    /// An empty buffer for bulk reads.
    fn create_array(&self) -> Vec<Value> {
        Vec::new()
    }

    /// Checks that `value` has the record's shape and returns it normalized.
    fn bind(&self, value: Value) -> ModelResult<Value>;

    /// Table layout, required for [`EntityKind::Typed`].
    fn schema(&self) -> Option<&TableSchema> {
        None
    }

    fn preload_source(&self) -> Option<&dyn PreloadSource> {
        None
    }

    fn scope_source(&self) -> Option<&dyn ScopeSource> {
        None
    }

    fn handler(&self) -> Option<&dyn RecordHandler> {
        None
    }
}

/// An [`Entity`] whose record shape is the Rust type `T`.
pub struct EntityDescriptor<T> {
    name: String,
    table: Option<String>,
    kind: EntityKind,
    schema: Option<TableSchema>,
    preloads: Option<Arc<dyn PreloadSource>>,
    scopes: Option<Vec<NamedFilter>>,
    handler: Option<Arc<dyn RecordHandler>>,
    _record: PhantomData<fn() -> T>,
}

impl<T> EntityDescriptor<T>
where
    T: Serialize + DeserializeOwned + Default + 'static,
{
    /// A typed entity stored in `name` with the given layout.
    pub fn typed(name: impl Into<String>, schema: TableSchema) -> Self {
        Self::with_kind(name, EntityKind::Typed, Some(schema))
    }

    /// A document entity stored as JSON envelopes in `name`.
    pub fn document(name: impl Into<String>) -> Self {
        Self::with_kind(name, EntityKind::Document, None)
    }

    /// Builds a descriptor for an explicit kind; a typed kind needs a schema
    /// before storage will accept it.
    pub fn with_kind(name: impl Into<String>, kind: EntityKind, schema: Option<TableSchema>) -> Self {
        Self {
            name: name.into(),
            table: None,
            kind,
            schema,
            preloads: None,
            scopes: None,
            handler: None,
            _record: PhantomData,
        }
    }

    /// Stores records in `table` instead of the table named after the entity.
    /// Required when the entity is served at the root path.
    #[must_use]
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    #[must_use]
    pub fn with_preloads(mut self, source: impl PreloadSource + 'static) -> Self {
        self.preloads = Some(Arc::new(source));
        self
    }

    #[must_use]
    pub fn with_scopes(mut self, filters: Vec<NamedFilter>) -> Self {
        self.scopes = Some(filters);
        self
    }

    #[must_use]
    pub fn with_handler(mut self, handler: impl RecordHandler + 'static) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// Freezes the descriptor for sharing across requests.
    pub fn shared(self) -> Arc<dyn Entity> {
        Arc::new(self)
    }
}

impl<T> Entity for EntityDescriptor<T>
where
    T: Serialize + DeserializeOwned + Default + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn table(&self) -> &str {
        self.table.as_deref().unwrap_or(&self.name)
    }

    fn kind(&self) -> EntityKind {
        self.kind
    }

    fn create(&self) -> Value {
        serde_json::to_value(T::default()).unwrap_or(Value::Null)
    }

    fn bind(&self, value: Value) -> ModelResult<Value> {
        let record: T = serde_json::from_value(value)?;
        Ok(serde_json::to_value(record)?)
    }

    fn schema(&self) -> Option<&TableSchema> {
        self.schema.as_ref()
    }

    fn preload_source(&self) -> Option<&dyn PreloadSource> {
        self.preloads.as_deref()
    }

    fn scope_source(&self) -> Option<&dyn ScopeSource> {
        self.scopes.as_ref().map(|s| s as &dyn ScopeSource)
    }

    fn handler(&self) -> Option<&dyn RecordHandler> {
        self.handler.as_deref()
    }
}

impl<T> fmt::Debug for EntityDescriptor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityDescriptor")
            .field("name", &self.name)
            .field("table", &self.table)
            .field("kind", &self.kind)
            .field("schema", &self.schema)
            .field("preloads", &self.preloads.is_some())
            .field("scopes", &self.scopes)
            .field("handler", &self.handler.is_some())
            .finish()
    }
}
