//! Topic-addressed request/reply transport.
//!
//! Every entity answers six topics, `<prefix>.<name>.<action>`. A request is a
//! JSON body; the reply carries a status code and either a body or a problem
//! text. Delivery (queues, brokers) is up to the embedding process.

use crate::problem::ApiError;
use quickapi_db::Database;
use quickapi_model::{create_hooks, Entity, Hook, ScopeData};
use quickapi_storage::{
    create_storage, CreateRequest, DeleteRequest, PatchRequest, ReadRequest, RecordId,
    SearchRequest, Storage, StorageResult, UpdateRequest, DEFAULT_TAKE,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// The operation a topic invokes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Create,
    Read,
    Update,
    Delete,
    Search,
    Patch,
}

impl Action {
    pub const ALL: [Action; 6] = [
        Self::Create,
        Self::Read,
        Self::Update,
        Self::Delete,
        Self::Search,
        Self::Patch,
    ];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Search => "search",
            Self::Patch => "patch",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Joins the non-empty segments of a topic with dots.
pub fn topicify(prefix: &str, name: &str, action: Action) -> String {
    [prefix, name, action.as_str()]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(".")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadBody {
    pub id: RecordId,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub preload: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateBody {
    pub id: RecordId,
    pub entity: Value,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub scopes: ScopeData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteBody {
    pub id: RecordId,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub scopes: ScopeData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchBody {
    #[serde(default)]
    pub skip: u64,
    #[serde(default = "default_take")]
    pub take: u64,
    #[serde(default, rename = "where", skip_serializing_if = "BTreeMap::is_empty")]
    pub r#where: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub sort: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub preload: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub scopes: ScopeData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchBody {
    pub id: RecordId,
    pub data: Map<String, Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub preload: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub scopes: ScopeData,
}

fn default_take() -> u64 {
    DEFAULT_TAKE
}

/// Reply to one RPC request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcReply {
    pub code: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub problem: Option<String>,
}

impl RpcReply {
    pub fn ok(body: Option<Value>) -> Self {
        Self {
            code: 200,
            body,
            problem: None,
        }
    }

    pub fn problem(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            body: None,
            problem: Some(message.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code < 300
    }
}

impl From<ApiError> for RpcReply {
    fn from(err: ApiError) -> Self {
        let problem = err.to_problem();
        Self::problem(problem.code, problem.message)
    }
}

struct Endpoint {
    entity: Arc<dyn Entity>,
    storage: Arc<dyn Storage>,
}

impl Endpoint {
    fn hooks(&self, scopes: &ScopeData) -> Vec<Hook> {
        create_hooks(self.entity.scope_source(), scopes)
    }

    fn call(&self, action: Action, body: Value) -> Result<Option<Value>, ApiError> {
        match action {
            Action::Create => Ok(Some(self.storage.create(CreateRequest::new(body))?)),
            Action::Read => {
                let body: ReadBody = decode(body)?;
                let req = ReadRequest::new(body.id).with_preload(body.preload);
                Ok(Some(self.storage.read(req)?))
            }
            Action::Update => {
                let body: UpdateBody = decode(body)?;
                let req = UpdateRequest::new(body.id, body.entity).with_hooks(self.hooks(&body.scopes));
                Ok(Some(self.storage.update(req)?))
            }
            Action::Delete => {
                let body: DeleteBody = decode(body)?;
                let req = DeleteRequest::new(body.id).with_hooks(self.hooks(&body.scopes));
                self.storage.delete(req)?;
                Ok(None)
            }
            Action::Search => {
                let body: SearchBody = decode(body)?;
                let req = SearchRequest {
                    skip: body.skip,
                    take: body.take,
                    hooks: self.hooks(&body.scopes),
                    r#where: body.r#where,
                    sort: body.sort,
                    preload: body.preload,
                };
                Ok(Some(Value::Array(self.storage.search(req)?)))
            }
            Action::Patch => {
                let body: PatchBody = decode(body)?;
                let req = PatchRequest::new(body.id, body.data)
                    .with_preload(body.preload)
                    .with_hooks(self.hooks(&body.scopes));
                Ok(Some(self.storage.patch(req)?))
            }
        }
    }
}

fn decode<T: DeserializeOwned>(body: Value) -> Result<T, ApiError> {
    serde_json::from_value(body).map_err(|e| ApiError::BadRequest(e.to_string()))
}

/// Dispatches topics to the entities registered with it.
pub struct RpcRouter {
    routes: HashMap<String, (Arc<Endpoint>, Action)>,
}

impl RpcRouter {
    /// Registers the six topics of every entity under `prefix`.
    pub fn new(db: &Database, prefix: &str, entities: &[Arc<dyn Entity>]) -> StorageResult<Self> {
        let mut routes = HashMap::new();
        for entity in entities {
            let endpoint = Arc::new(Endpoint {
                storage: create_storage(db, entity.clone())?,
                entity: entity.clone(),
            });
            for action in Action::ALL {
                routes.insert(topicify(prefix, entity.name(), action), (endpoint.clone(), action));
            }
        }
        Ok(Self { routes })
    }

    /// Registered topics, sorted.
    pub fn topics(&self) -> Vec<&str> {
        let mut topics: Vec<&str> = self.routes.keys().map(String::as_str).collect();
        topics.sort_unstable();
        topics
    }

    /// Handles one request. Storage calls block; run this off any async runtime.
    pub fn handle(&self, topic: &str, body: Value) -> RpcReply {
        let Some((endpoint, action)) = self.routes.get(topic) else {
            warn!("no handler for topic '{}'", topic);
            return RpcReply::problem(404, format!("unknown topic '{topic}'"));
        };

        debug!("rpc {} ({})", topic, action);
        match endpoint.call(*action, body) {
            Ok(body) => RpcReply::ok(body),
            Err(err) => RpcReply::from(err),
        }
    }
}
