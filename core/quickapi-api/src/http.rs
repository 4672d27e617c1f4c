//! REST routes for every registered entity.
//!
//! Each entity is mounted at `/{name}`, or at `/` when its name is empty:
//!
//! | method | path      | operation |
//! |--------|-----------|-----------|
//! | POST   | `/`       | create (201) |
//! | GET    | `/{id}`   | read |
//! | PUT    | `/{id}`   | update |
//! | DELETE | `/{id}`   | delete (200, empty body) |
//! | GET    | `/`       | search |
//! | PATCH  | `/{id}`   | patch |
//!
//! `GET /_discover` lists the mounted entity names. A malformed id or body
//! gets the same JSON problem reply as any other bad request.

use crate::config::HttpConfig;
use crate::params::Params;
use crate::problem::ApiError;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use quickapi_db::Database;
use quickapi_model::{create_hooks, Entity, Hook};
use quickapi_storage::{
    create_storage, CreateRequest, DeleteRequest, PatchRequest, ReadRequest, RecordId,
    SearchRequest, Storage, StorageError, StorageResult, UpdateRequest,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info};

/// One entity together with the storage serving it.
struct Mount {
    entity: Arc<dyn Entity>,
    storage: Arc<dyn Storage>,
    config: Arc<HttpConfig>,
}

impl Mount {
    fn hooks(&self, params: &Params) -> Vec<Hook> {
        create_hooks(self.entity.scope_source(), &params.groups())
    }
}

/// Response of `GET /_discover`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discovery {
    pub entities: Vec<String>,
}

/// Builds the router serving `entities` from `db`.
///
/// An entity with an empty name is served at `/`. Fails when an entity
/// cannot be served or two entities share a name; nothing is mounted in
/// that case.
pub fn router(db: &Database, entities: &[Arc<dyn Entity>], config: HttpConfig) -> StorageResult<Router> {
    let config = Arc::new(config);
    let mut app = Router::new();
    let mut names: Vec<String> = Vec::with_capacity(entities.len());

    for entity in entities {
        let name = entity.name().to_string();
        if names.contains(&name) {
            return Err(StorageError::Configuration(format!(
                "entity name '{name}' is mounted twice"
            )));
        }
        let storage = create_storage(db, entity.clone())?;
        let mount = Arc::new(Mount {
            entity: entity.clone(),
            storage,
            config: config.clone(),
        });
        let routes = entity_routes(&config).with_state(mount);
        app = if name.is_empty() {
            app.merge(routes)
        } else {
            app.nest(&format!("/{name}"), routes)
        };
        info!("mounted {} entity '{}' at /{}", entity.kind(), name, name);
        names.push(name);
    }

    let discovery = Arc::new(Discovery { entities: names });
    let discover = Router::new()
        .route("/_discover", get(discover))
        .with_state(discovery);

    Ok(app.merge(discover))
}

fn entity_routes(config: &HttpConfig) -> Router<Arc<Mount>> {
    let by_id = format!("/{{{}}}", config.id_param);
    Router::new()
        .route("/", get(search_records).post(create_record))
        .route(
            &by_id,
            get(read_record)
                .put(update_record)
                .delete(delete_record)
                .patch(patch_record),
        )
}

/// Runs a storage call off the async runtime.
async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> StorageResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .map_err(ApiError::from)
}

async fn discover(State(discovery): State<Arc<Discovery>>) -> Json<Discovery> {
    Json((*discovery).clone())
}

async fn create_record(
    State(mount): State<Arc<Mount>>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let Json(body) = body?;
    let storage = mount.storage.clone();
    let record = blocking(move || storage.create(CreateRequest::new(body))).await?;
    debug!("POST /{}", mount.entity.name());
    Ok((StatusCode::CREATED, Json(record)))
}

async fn read_record(
    State(mount): State<Arc<Mount>>,
    id: Result<Path<RecordId>, PathRejection>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<Value>, ApiError> {
    let Path(id) = id?;
    let params = Params::new(pairs);
    let req = ReadRequest::new(id).with_preload(params.map(&mount.config.preload_param));
    let storage = mount.storage.clone();
    Ok(Json(blocking(move || storage.read(req)).await?))
}

async fn update_record(
    State(mount): State<Arc<Mount>>,
    id: Result<Path<RecordId>, PathRejection>,
    Query(pairs): Query<Vec<(String, String)>>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Path(id) = id?;
    let Json(body) = body?;
    let params = Params::new(pairs);
    let req = UpdateRequest::new(id, body).with_hooks(mount.hooks(&params));
    let storage = mount.storage.clone();
    Ok(Json(blocking(move || storage.update(req)).await?))
}

async fn delete_record(
    State(mount): State<Arc<Mount>>,
    id: Result<Path<RecordId>, PathRejection>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<StatusCode, ApiError> {
    let Path(id) = id?;
    let params = Params::new(pairs);
    let req = DeleteRequest::new(id).with_hooks(mount.hooks(&params));
    let storage = mount.storage.clone();
    blocking(move || storage.delete(req)).await?;
    Ok(StatusCode::OK)
}

async fn search_records(
    State(mount): State<Arc<Mount>>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<Vec<Value>>, ApiError> {
    let params = Params::new(pairs);
    let config = &mount.config;
    let req = SearchRequest {
        skip: params.uint(&config.skip_param, config.default_skip)?,
        take: params.uint(&config.take_param, config.default_take)?,
        r#where: params.map(&config.where_param),
        sort: params.map(&config.sort_param),
        preload: params.map(&config.preload_param),
        hooks: mount.hooks(&params),
    };
    let storage = mount.storage.clone();
    Ok(Json(blocking(move || storage.search(req)).await?))
}

async fn patch_record(
    State(mount): State<Arc<Mount>>,
    id: Result<Path<RecordId>, PathRejection>,
    Query(pairs): Query<Vec<(String, String)>>,
    data: Result<Json<Map<String, Value>>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Path(id) = id?;
    let Json(data) = data?;
    let params = Params::new(pairs);
    let req = PatchRequest::new(id, data)
        .with_preload(params.map(&mount.config.preload_param))
        .with_hooks(mount.hooks(&params));
    let storage = mount.storage.clone();
    Ok(Json(blocking(move || storage.patch(req)).await?))
}
