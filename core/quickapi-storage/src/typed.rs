//! Storage engine for typed entities: one column per record field.

use crate::error::{StorageError, StorageResult};
use crate::request::{
    CreateRequest, DeleteRequest, PatchRequest, ReadRequest, RecordId, SearchRequest, UpdateRequest,
};
use crate::sql::{coerce_filter, column_value, is_identifier, row_to_object, to_sql_params};
use crate::Storage;
use quickapi_db::Database;
use quickapi_model::{
    apply_hooks, quote_ident, resolve_preloads, Entity, ModelError, Preload, Query, Relation, SortDirection,
    TableSchema, ALWAYS_TRUE,
};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Stores records of a typed entity in its table, one row per record.
///
/// `where`, `sort` and patch keys are checked against the table schema; only
/// declared columns ever reach statement text, and every value is bound.
pub struct TypedStore {
    db: Database,
    entity: Arc<dyn Entity>,
    table: String,
    schema: TableSchema,
}

impl TypedStore {
    pub fn new(db: Database, entity: Arc<dyn Entity>) -> StorageResult<Self> {
        let table = entity.table().to_string();
        let schema = entity.schema().cloned().ok_or_else(|| {
            StorageError::Configuration(format!("typed entity '{table}' has no table schema"))
        })?;
        validate_schema(&table, &schema)?;
        Ok(Self {
            db,
            entity,
            table,
            schema,
        })
    }

    fn bind_record(&self, value: Value) -> StorageResult<Map<String, Value>> {
        let record = self.entity.bind(value)?;
        if let Some(handler) = self.entity.handler() {
            handler.validate(&record).map_err(ModelError::Rejected)?;
        }
        let Value::Object(mut fields) = record else {
            return Err(StorageError::Validation(format!(
                "'{}' records must be JSON objects",
                self.table
            )));
        };
        if let Some(handler) = self.entity.handler() {
            handler.before_save(&mut fields);
        }
        Ok(fields)
    }

    fn finish(&self, mut record: Value) -> Value {
        if let Some(handler) = self.entity.handler() {
            handler.after_load(&mut record);
        }
        record
    }

    /// Preloads for every relation the caller supplied rows for.
    fn supplied_relations(&self, fields: &Map<String, Value>) -> Vec<Preload> {
        self.schema
            .relations
            .iter()
            .filter(|r| matches!(fields.get(&r.name), Some(Value::Array(_))))
            .map(|r| Preload {
                relation: r.name.clone(),
                condition: ALWAYS_TRUE.to_string(),
                params: Vec::new(),
            })
            .collect()
    }

    fn by_id(&self, id: RecordId) -> Query {
        Query::new().eq(&self.schema.primary_key, id)
    }

    fn not_found(&self, id: RecordId) -> StorageError {
        StorageError::NotFound(format!("{} {id}", self.table))
    }

    fn read_one(&self, conn: &Connection, id: RecordId, preloads: Vec<Preload>) -> StorageResult<Value> {
        let mut query = self.by_id(id).limit(1);
        query.preloads = preloads;
        load(conn, &self.table, &self.schema, &query)?
            .into_iter()
            .next()
            .ok_or_else(|| self.not_found(id))
    }

    /// Inserts or updates the rows supplied for each relation.
    fn save_relations(&self, conn: &Connection, id: RecordId, fields: &Map<String, Value>) -> StorageResult<()> {
        for relation in &self.schema.relations {
            let Some(Value::Array(children)) = fields.get(&relation.name) else {
                continue;
            };
            for child in children {
                let Value::Object(child) = child else {
                    return Err(StorageError::Validation(format!(
                        "'{}' entries must be JSON objects",
                        relation.name
                    )));
                };
                save_child(conn, relation, id, child)?;
            }
        }
        Ok(())
    }
}

impl Storage for TypedStore {
    fn create(&self, req: CreateRequest) -> StorageResult<Value> {
        let fields = self.bind_record(req.entity)?;
        let preloads = self.supplied_relations(&fields);

        let record = self.db.with_conn(|conn| {
            let tx = conn.transaction()?;
            let id = insert_row(&tx, &self.table, &self.schema, &fields, None)?;
            self.save_relations(&tx, id, &fields)?;
            tx.commit()?;
            debug!("created {} {}", self.table, id);
            self.read_one(conn, id, preloads)
        });

        record.map(|r| self.finish(r)).inspect_err(|e| {
            warn!("creating {} failed: {}", self.table, e);
        })
    }

    fn read(&self, req: ReadRequest) -> StorageResult<Value> {
        let preloads = resolve_preloads(self.entity.preload_source(), &req.preload);
        let record = self.db.with_conn(|conn| self.read_one(conn, req.id, preloads))?;
        Ok(self.finish(record))
    }

    fn update(&self, req: UpdateRequest) -> StorageResult<Value> {
        let mut fields = self.bind_record(req.entity)?;
        fields.insert(self.schema.primary_key.clone(), Value::from(req.id));
        let preloads = self.supplied_relations(&fields);

        let mut assignments = Vec::new();
        let mut params = Vec::new();
        for column in self.schema.value_columns() {
            let value = fields.get(&column.name).unwrap_or(&Value::Null);
            assignments.push(format!("{} = ?", quote_ident(&column.name)));
            params.push(column_value(column, value)?);
        }

        let query = apply_hooks(self.by_id(req.id), &req.hooks);
        let record = self.db.with_conn(|conn| {
            let tx = conn.transaction()?;
            let changed = update_rows(&tx, &self.table, &self.schema.primary_key, assignments, params, &query)?;
            if changed == 0 {
                return Err(self.not_found(req.id));
            }
            self.save_relations(&tx, req.id, &fields)?;
            tx.commit()?;
            debug!("updated {} {}", self.table, req.id);
            self.read_one(conn, req.id, preloads)
        });

        record.map(|r| self.finish(r)).inspect_err(|e| {
            warn!("updating {} {} failed: {}", self.table, req.id, e);
        })
    }

    fn delete(&self, req: DeleteRequest) -> StorageResult<()> {
        let query = apply_hooks(self.by_id(req.id), &req.hooks);
        let (where_sql, where_params) = query
            .where_sql()
            .unwrap_or_else(|| ("1 = 1".to_string(), Vec::new()));

        self.db.with_conn(|conn| {
            let tx = conn.transaction()?;
            let count_sql = format!(
                "SELECT COUNT(*) FROM {} WHERE {where_sql}",
                quote_ident(&self.table)
            );
            let count: i64 = tx.query_row(&count_sql, params_from_iter(to_sql_params(&where_params)), |row| {
                row.get(0)
            })?;
            if count == 0 {
                return Err(self.not_found(req.id));
            }

            for relation in &self.schema.relations {
                let sql = format!(
                    "DELETE FROM {} WHERE {} = ?1",
                    quote_ident(&relation.table),
                    quote_ident(&relation.foreign_key)
                );
                tx.execute(&sql, [req.id])?;
            }
            let sql = format!(
                "DELETE FROM {} WHERE {} = ?1",
                quote_ident(&self.table),
                quote_ident(&self.schema.primary_key)
            );
            tx.execute(&sql, [req.id])?;
            tx.commit()?;
            debug!("deleted {} {}", self.table, req.id);
            Ok(())
        })
    }

    fn search(&self, req: SearchRequest) -> StorageResult<Vec<Value>> {
        let mut query = Query::new().offset(req.skip).limit(req.take);
        query.preloads = resolve_preloads(self.entity.preload_source(), &req.preload);

        for (field, raw) in &req.r#where {
            let column = self.schema.find_column(field).ok_or_else(|| {
                StorageError::Validation(format!("unknown filter field '{field}' on {}", self.table))
            })?;
            query = query.eq(&column.name, coerce_filter(column, raw)?);
        }

        for (field, direction) in &req.sort {
            if self.schema.find_column(field).is_none() {
                return Err(StorageError::Validation(format!(
                    "unknown sort field '{field}' on {}",
                    self.table
                )));
            }
            let direction = SortDirection::parse(direction).ok_or_else(|| {
                StorageError::Validation(format!("invalid sort direction '{direction}'"))
            })?;
            query = query.order_by(quote_ident(field), direction);
        }

        let query = apply_hooks(query, &req.hooks);
        let records = self
            .db
            .with_conn(|conn| load(conn, &self.table, &self.schema, &query))
            .inspect_err(|e| warn!("searching {} failed: {}", self.table, e))?;

        Ok(records.into_iter().map(|r| self.finish(r)).collect())
    }

    fn patch(&self, req: PatchRequest) -> StorageResult<Value> {
        let mut fields = req.data;
        if let Some(handler) = self.entity.handler() {
            handler.before_save(&mut fields);
        }

        let mut assignments = Vec::new();
        let mut params = Vec::new();
        for (field, value) in &fields {
            if *field == self.schema.primary_key {
                return Err(StorageError::Validation(format!(
                    "'{field}' is the primary key and cannot be patched"
                )));
            }
            let column = self.schema.find_column(field).ok_or_else(|| {
                StorageError::Validation(format!("unknown field '{field}' on {}", self.table))
            })?;
            assignments.push(format!("{} = ?", quote_ident(&column.name)));
            params.push(column_value(column, value)?);
        }

        let preloads = resolve_preloads(self.entity.preload_source(), &req.preload);
        let query = apply_hooks(self.by_id(req.id), &req.hooks);
        let record = self.db.with_conn(|conn| {
            let changed = update_rows(conn, &self.table, &self.schema.primary_key, assignments, params, &query)?;
            if changed == 0 {
                return Err(self.not_found(req.id));
            }
            debug!("patched {} {}", self.table, req.id);
            self.read_one(conn, req.id, preloads)
        });

        record.map(|r| self.finish(r)).inspect_err(|e| {
            warn!("patching {} {} failed: {}", self.table, req.id, e);
        })
    }
}

fn validate_schema(table: &str, schema: &TableSchema) -> StorageResult<()> {
    let bad = |what: &str, name: &str| {
        StorageError::Configuration(format!("invalid {what} name '{name}' in entity '{table}'"))
    };

    if !is_identifier(table) {
        return Err(bad("table", table));
    }
    if schema.find_column(&schema.primary_key).is_none() {
        return Err(StorageError::Configuration(format!(
            "primary key '{}' of '{table}' is not a column",
            schema.primary_key
        )));
    }
    for column in &schema.columns {
        if !is_identifier(&column.name) {
            return Err(bad("column", &column.name));
        }
    }
    for relation in &schema.relations {
        if !is_identifier(&relation.table) {
            return Err(bad("table", &relation.table));
        }
        if !is_identifier(&relation.foreign_key) {
            return Err(bad("column", &relation.foreign_key));
        }
        validate_schema(&relation.table, &relation.schema)?;
    }
    Ok(())
}

/// Selects the rows matching `query` and attaches its preloads.
fn load(conn: &Connection, table: &str, schema: &TableSchema, query: &Query) -> StorageResult<Vec<Value>> {
    let select = column_list(schema);
    let mut sql = format!("SELECT {select} FROM {}", quote_ident(table));
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
    if query.limit.is_some() || query.offset.is_some() {
        sql.push_str(" LIMIT ? OFFSET ?");
        params.push(SqlValue::Integer(query.limit.map_or(-1, clamp)));
        params.push(SqlValue::Integer(query.offset.map_or(0, clamp)));
    }

    debug!("{}", sql);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(params), |row| row_to_object(&schema.columns, row))?;
    let mut records = Vec::new();
    for row in rows {
        records.push(row?);
    }

    for preload in &query.preloads {
        attach_preload(conn, schema, &mut records, preload)?;
    }

    Ok(records.into_iter().map(Value::Object).collect())
}

/// Loads the related rows for every parent in `records` and stores them
/// under the relation's field.
fn attach_preload(
    conn: &Connection,
    schema: &TableSchema,
    records: &mut [Map<String, Value>],
    preload: &Preload,
) -> StorageResult<()> {
    let relation = schema.find_relation(&preload.relation).ok_or_else(|| {
        StorageError::Validation(format!("unknown relation '{}'", preload.relation))
    })?;
    if records.is_empty() {
        return Ok(());
    }

    // One JSON array parameter keeps large pages under SQLite's variable limit.
    let parent_ids: Vec<i64> = records
        .iter()
        .filter_map(|r| r.get(&schema.primary_key).and_then(Value::as_i64))
        .collect();
    let fk = quote_ident(&relation.foreign_key);
    let columns = column_list(&relation.schema);
    let (select, fk_index) = match relation
        .schema
        .columns
        .iter()
        .position(|c| c.name == relation.foreign_key)
    {
        Some(index) => (columns, index),
        None => (format!("{columns}, {fk}"), relation.schema.columns.len()),
    };
    let sql = format!(
        "SELECT {select} FROM {} WHERE {fk} IN (SELECT value FROM json_each(?)) AND ({}) ORDER BY {}",
        quote_ident(&relation.table),
        preload.condition,
        quote_ident(&relation.schema.primary_key),
    );

    let mut params = vec![SqlValue::Text(Value::from(parent_ids).to_string())];
    params.extend(to_sql_params(&preload.params));

    debug!("{}", sql);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(params), |row| {
        let child = row_to_object(&relation.schema.columns, row)?;
        let parent: i64 = row.get(fk_index)?;
        Ok((parent, child))
    })?;

    let mut grouped: HashMap<i64, Vec<Value>> = HashMap::new();
    for row in rows {
        let (parent, child) = row?;
        grouped.entry(parent).or_default().push(Value::Object(child));
    }

    for record in records.iter_mut() {
        let children = record
            .get(&schema.primary_key)
            .and_then(Value::as_i64)
            .and_then(|id| grouped.remove(&id))
            .unwrap_or_default();
        record.insert(relation.name.clone(), Value::Array(children));
    }
    Ok(())
}

/// Inserts the schema columns present in `fields`; returns the new row id.
///
/// A null or zero primary key is left for SQLite to assign.
fn insert_row(
    conn: &Connection,
    table: &str,
    schema: &TableSchema,
    fields: &Map<String, Value>,
    parent: Option<(&str, RecordId)>,
) -> StorageResult<RecordId> {
    let mut columns = Vec::new();
    let mut params = Vec::new();

    for column in &schema.columns {
        if parent.is_some_and(|(fk, _)| fk == column.name) {
            continue;
        }
        let Some(value) = fields.get(&column.name) else {
            continue;
        };
        if column.name == schema.primary_key && matches!(value.as_i64(), None | Some(0)) {
            continue;
        }
        columns.push(quote_ident(&column.name));
        params.push(column_value(column, value)?);
    }
    if let Some((fk, parent_id)) = parent {
        columns.push(quote_ident(fk));
        params.push(SqlValue::Integer(parent_id));
    }

    let sql = if columns.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES", quote_ident(table))
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(table),
            columns.join(", "),
            vec!["?"; columns.len()].join(", ")
        )
    };

    debug!("{}", sql);
    conn.execute(&sql, params_from_iter(params))?;
    Ok(conn.last_insert_rowid())
}

/// Upserts one related row owned by `parent_id`.
fn save_child(
    conn: &Connection,
    relation: &Relation,
    parent_id: RecordId,
    child: &Map<String, Value>,
) -> StorageResult<()> {
    let schema = &relation.schema;
    let child_id = child
        .get(&schema.primary_key)
        .and_then(Value::as_i64)
        .filter(|id| *id != 0);

    if let Some(child_id) = child_id {
        let mut assignments = Vec::new();
        let mut params = Vec::new();
        for column in schema.value_columns() {
            if column.name == relation.foreign_key {
                continue;
            }
            if let Some(value) = child.get(&column.name) {
                assignments.push(format!("{} = ?", quote_ident(&column.name)));
                params.push(column_value(column, value)?);
            }
        }
        assignments.push(format!("{} = ?", quote_ident(&relation.foreign_key)));
        params.push(SqlValue::Integer(parent_id));
        params.push(SqlValue::Integer(child_id));

        let sql = format!(
            "UPDATE {} SET {} WHERE {} = ?",
            quote_ident(&relation.table),
            assignments.join(", "),
            quote_ident(&schema.primary_key)
        );
        debug!("{}", sql);
        if conn.execute(&sql, params_from_iter(params))? > 0 {
            return Ok(());
        }
    }

    insert_row(conn, &relation.table, schema, child, Some((&relation.foreign_key, parent_id)))?;
    Ok(())
}

/// Runs `UPDATE table SET assignments WHERE <query conditions>`.
fn update_rows(
    conn: &Connection,
    table: &str,
    primary_key: &str,
    mut assignments: Vec<String>,
    mut params: Vec<SqlValue>,
    query: &Query,
) -> StorageResult<usize> {
    if assignments.is_empty() {
        let pk = quote_ident(primary_key);
        assignments.push(format!("{pk} = {pk}"));
    }
    let (where_sql, where_params) = query
        .where_sql()
        .unwrap_or_else(|| ("1 = 1".to_string(), Vec::new()));
    params.extend(to_sql_params(&where_params));

    let sql = format!(
        "UPDATE {} SET {} WHERE {where_sql}",
        quote_ident(table),
        assignments.join(", ")
    );
    debug!("{}", sql);
    Ok(conn.execute(&sql, params_from_iter(params))?)
}

fn column_list(schema: &TableSchema) -> String {
    schema
        .columns
        .iter()
        .map(|c| quote_ident(&c.name))
        .collect::<Vec<_>>()
        .join(", ")
}

fn clamp(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}
