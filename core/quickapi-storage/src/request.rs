//! Request values handed to the storage contract.
//!
//! Built fresh by a transport for one call and consumed by it.

use quickapi_model::Hook;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Primary key of a stored record.
pub type RecordId = i64;

/// Default page size used by transports when the caller sends none.
pub const DEFAULT_TAKE: u64 = 25;

pub struct CreateRequest {
    pub entity: Value,
}

pub struct ReadRequest {
    pub id: RecordId,
    /// Preload alias → activation value.
    pub preload: BTreeMap<String, String>,
}

pub struct UpdateRequest {
    pub id: RecordId,
    pub entity: Value,
    pub hooks: Vec<Hook>,
}

pub struct DeleteRequest {
    pub id: RecordId,
    pub hooks: Vec<Hook>,
}

pub struct SearchRequest {
    pub skip: u64,
    pub take: u64,
    /// Field → value equality constraints, combined with AND.
    pub r#where: BTreeMap<String, String>,
    /// Field → direction.
    pub sort: BTreeMap<String, String>,
    pub preload: BTreeMap<String, String>,
    pub hooks: Vec<Hook>,
}

pub struct PatchRequest {
    pub id: RecordId,
    pub data: Map<String, Value>,
    pub preload: BTreeMap<String, String>,
    pub hooks: Vec<Hook>,
}

impl CreateRequest {
    pub fn new(entity: Value) -> Self {
        Self { entity }
    }
}

impl ReadRequest {
    pub fn new(id: RecordId) -> Self {
        Self {
            id,
            preload: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_preload(mut self, preload: BTreeMap<String, String>) -> Self {
        self.preload = preload;
        self
    }
}

impl UpdateRequest {
    pub fn new(id: RecordId, entity: Value) -> Self {
        Self {
            id,
            entity,
            hooks: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_hooks(mut self, hooks: Vec<Hook>) -> Self {
        self.hooks = hooks;
        self
    }
}

impl DeleteRequest {
    pub fn new(id: RecordId) -> Self {
        Self {
            id,
            hooks: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_hooks(mut self, hooks: Vec<Hook>) -> Self {
        self.hooks = hooks;
        self
    }
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self {
            skip: 0,
            take: DEFAULT_TAKE,
            r#where: BTreeMap::new(),
            sort: BTreeMap::new(),
            preload: BTreeMap::new(),
            hooks: Vec::new(),
        }
    }
}

impl SearchRequest {
    pub fn new(skip: u64, take: u64) -> Self {
        Self {
            skip,
            take,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn filter(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.r#where.insert(field.into(), value.into());
        self
    }

    #[must_use]
    pub fn sort(mut self, field: impl Into<String>, direction: impl Into<String>) -> Self {
        self.sort.insert(field.into(), direction.into());
        self
    }

    #[must_use]
    pub fn preload(mut self, alias: impl Into<String>, value: impl Into<String>) -> Self {
        self.preload.insert(alias.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_hooks(mut self, hooks: Vec<Hook>) -> Self {
        self.hooks = hooks;
        self
    }
}

impl PatchRequest {
    pub fn new(id: RecordId, data: Map<String, Value>) -> Self {
        Self {
            id,
            data,
            preload: BTreeMap::new(),
            hooks: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_preload(mut self, preload: BTreeMap<String, String>) -> Self {
        self.preload = preload;
        self
    }

    #[must_use]
    pub fn with_hooks(mut self, hooks: Vec<Hook>) -> Self {
        self.hooks = hooks;
        self
    }
}

impl fmt::Debug for SearchRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchRequest")
            .field("skip", &self.skip)
            .field("take", &self.take)
            .field("where", &self.r#where)
            .field("sort", &self.sort)
            .field("preload", &self.preload)
            .field("hooks", &self.hooks.len())
            .finish()
    }
}
