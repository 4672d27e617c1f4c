//! Storage engine for document entities.
//!
//! Each record is one row `{id, created, updated, data}` where `data` holds
//! the caller's JSON text verbatim. Filters reach into `data` through
//! `json_extract`; sorting is limited to the envelope columns.

use crate::error::{StorageError, StorageResult};
use crate::request::{
    CreateRequest, DeleteRequest, PatchRequest, ReadRequest, RecordId, SearchRequest, UpdateRequest,
};
use crate::sql::{is_identifier, now_millis, scalar_of, to_sql_params};
use crate::Storage;
use quickapi_db::Database;
use quickapi_model::{apply_hooks, quote_ident, Entity, Hook, ModelError, Query, SortDirection};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// Envelope columns a search may sort on.
const SORTABLE: [&str; 3] = ["id", "created", "updated"];

const COLUMNS: &str = r#""id", "created", "updated", "data""#;

/// A stored document as returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentEnvelope {
    pub id: RecordId,
    /// Creation time, milliseconds since the Unix epoch.
    pub created: i64,
    /// Last write time, milliseconds since the Unix epoch.
    pub updated: i64,
    pub data: Value,
}

impl DocumentEnvelope {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let text: String = row.get(3)?;
        let data = serde_json::from_str(&text).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
        })?;
        Ok(Self {
            id: row.get(0)?,
            created: row.get(1)?,
            updated: row.get(2)?,
            data,
        })
    }

    fn into_value(self) -> StorageResult<Value> {
        serde_json::to_value(self).map_err(|e| StorageError::Validation(e.to_string()))
    }
}

/// Stores records of a document entity as JSON envelopes.
pub struct DocumentStore {
    db: Database,
    entity: Arc<dyn Entity>,
    table: String,
}

impl DocumentStore {
    pub fn new(db: Database, entity: Arc<dyn Entity>) -> StorageResult<Self> {
        let table = entity.table().to_string();
        if !is_identifier(&table) {
            return Err(StorageError::Configuration(format!(
                "invalid table name '{table}' for document entity"
            )));
        }
        Ok(Self { db, entity, table })
    }

    /// Validates the payload and serializes it for the `data` column.
    fn payload(&self, value: Value) -> StorageResult<String> {
        let record = self.entity.bind(value)?;
        if let Some(handler) = self.entity.handler() {
            handler.validate(&record).map_err(ModelError::Rejected)?;
        }
        Ok(record.to_string())
    }

    fn by_id(id: RecordId) -> Query {
        Query::new().eq("id", id)
    }

    fn not_found(&self, id: RecordId) -> StorageError {
        StorageError::NotFound(format!("{} {id}", self.table))
    }

    fn fetch(&self, conn: &Connection, id: RecordId) -> StorageResult<DocumentEnvelope> {
        let sql = format!("SELECT {COLUMNS} FROM {} WHERE \"id\" = ?1", quote_ident(&self.table));
        conn.query_row(&sql, [id], DocumentEnvelope::from_row)
            .optional()?
            .ok_or_else(|| self.not_found(id))
    }

    fn finish(&self, envelope: DocumentEnvelope) -> StorageResult<Value> {
        let mut value = envelope.into_value()?;
        if let Some(handler) = self.entity.handler() {
            handler.after_load(&mut value);
        }
        Ok(value)
    }

    /// Runs an UPDATE whose WHERE clause is the id plus scope conditions.
    fn update_where(
        &self,
        conn: &Connection,
        set: &str,
        mut params: Vec<SqlValue>,
        id: RecordId,
        hooks: &[Hook],
    ) -> StorageResult<usize> {
        let query = apply_hooks(Self::by_id(id), hooks);
        let (where_sql, where_params) = query
            .where_sql()
            .unwrap_or_else(|| ("1 = 1".to_string(), Vec::new()));
        params.extend(to_sql_params(&where_params));

        let sql = format!("UPDATE {} SET {set} WHERE {where_sql}", quote_ident(&self.table));
        debug!("{}", sql);
        Ok(conn.execute(&sql, params_from_iter(params))?)
    }
}

/// JSON path addressing the top-level member `field`.
fn json_path(field: &str) -> StorageResult<String> {
    if field.is_empty() || field.contains('"') || field.contains('\\') {
        return Err(StorageError::Validation(format!(
            "invalid document field name '{field}'"
        )));
    }
    Ok(format!("$.\"{field}\""))
}

impl Storage for DocumentStore {
    fn create(&self, req: CreateRequest) -> StorageResult<Value> {
        let data = self.payload(req.entity)?;
        let now = now_millis();

        let envelope = self
            .db
            .with_conn(|conn| {
                let sql = format!(
                    "INSERT INTO {} (\"created\", \"updated\", \"data\") VALUES (?1, ?1, ?2)",
                    quote_ident(&self.table)
                );
                debug!("{}", sql);
                conn.execute(&sql, rusqlite::params![now, data])?;
                let id = conn.last_insert_rowid();
                self.fetch(conn, id)
            })
            .inspect_err(|e| warn!("creating {} failed: {}", self.table, e))?;

        debug!("created {} {}", self.table, envelope.id);
        self.finish(envelope)
    }

    fn read(&self, req: ReadRequest) -> StorageResult<Value> {
        let envelope = self.db.with_conn(|conn| self.fetch(conn, req.id))?;
        self.finish(envelope)
    }

    fn update(&self, req: UpdateRequest) -> StorageResult<Value> {
        let data = self.payload(req.entity)?;
        let params = vec![SqlValue::Text(data), SqlValue::Integer(now_millis())];

        let envelope = self
            .db
            .with_conn(|conn| {
                let set = r#""data" = ?, "updated" = MAX(?, "updated" + 1)"#;
                if self.update_where(conn, set, params, req.id, &req.hooks)? == 0 {
                    return Err(self.not_found(req.id));
                }
                self.fetch(conn, req.id)
            })
            .inspect_err(|e| warn!("updating {} {} failed: {}", self.table, req.id, e))?;

        self.finish(envelope)
    }

    fn delete(&self, req: DeleteRequest) -> StorageResult<()> {
        let query = apply_hooks(Self::by_id(req.id), &req.hooks);
        let (where_sql, where_params) = query
            .where_sql()
            .unwrap_or_else(|| ("1 = 1".to_string(), Vec::new()));
        let sql = format!("DELETE FROM {} WHERE {where_sql}", quote_ident(&self.table));

        let deleted = self.db.with_conn(|conn| {
            debug!("{}", sql);
            conn.execute(&sql, params_from_iter(to_sql_params(&where_params)))
                .map_err(StorageError::from)
        })?;
        if deleted == 0 {
            return Err(self.not_found(req.id));
        }
        debug!("deleted {} {}", self.table, req.id);
        Ok(())
    }

    fn search(&self, req: SearchRequest) -> StorageResult<Vec<Value>> {
        let mut query = Query::new().offset(req.skip).limit(req.take);

        for (field, raw) in &req.r#where {
            query = query.filter(
                r#"json_extract("data", ?) IN (?, ?)"#,
                vec![
                    Value::String(json_path(field)?),
                    Value::String(raw.clone()),
                    scalar_of(raw),
                ],
            );
        }

        for (field, direction) in &req.sort {
            if !SORTABLE.contains(&field.as_str()) {
                debug!("ignoring sort on document field '{}'", field);
                continue;
            }
            let direction = SortDirection::parse(direction).ok_or_else(|| {
                StorageError::Validation(format!("invalid sort direction '{direction}'"))
            })?;
            query = query.order_by(quote_ident(field), direction);
        }

        let query = apply_hooks(query, &req.hooks);
        let mut sql = format!("SELECT {COLUMNS} FROM {}", quote_ident(&self.table));
        let mut params = Vec::new();
        if let Some((where_sql, where_params)) = query.where_sql() {
            sql.push_str(" WHERE ");
            sql.push_str(&where_sql);
            params.extend(to_sql_params(&where_params));
        }
        if let Some(order) = query.order_sql() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&order);
        }
        sql.push_str(" LIMIT ? OFFSET ?");
        params.push(SqlValue::Integer(query.limit.map_or(-1, clamp)));
        params.push(SqlValue::Integer(query.offset.map_or(0, clamp)));

        let envelopes = self
            .db
            .with_conn(|conn| {
                debug!("{}", sql);
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(params_from_iter(params), DocumentEnvelope::from_row)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()
                    .map_err(StorageError::from)
            })
            .inspect_err(|e| warn!("searching {} failed: {}", self.table, e))?;

        envelopes.into_iter().map(|e| self.finish(e)).collect()
    }

    fn patch(&self, req: PatchRequest) -> StorageResult<Value> {
        let mut data = req.data;
        if let Some(handler) = self.entity.handler() {
            handler.before_save(&mut data);
        }

        let mut params = Vec::new();
        let mut set = String::from(r#""data""#);
        if !data.is_empty() {
            let mut args = Vec::new();
            for (field, value) in &data {
                params.push(SqlValue::Text(json_path(field)?));
                params.push(SqlValue::Text(value.to_string()));
                args.push("?, json(?)");
            }
            set = format!(r#"json_set("data", {})"#, args.join(", "));
        }
        params.push(SqlValue::Integer(now_millis()));
        let set = format!(r#""data" = {set}, "updated" = MAX(?, "updated" + 1)"#);

        let envelope = self
            .db
            .with_conn(|conn| {
                if self.update_where(conn, &set, params, req.id, &req.hooks)? == 0 {
                    return Err(self.not_found(req.id));
                }
                self.fetch(conn, req.id)
            })
            .inspect_err(|e| warn!("patching {} {} failed: {}", self.table, req.id, e))?;

        debug!("patched {} {}", self.table, req.id);
        self.finish(envelope)
    }
}

fn clamp(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}
