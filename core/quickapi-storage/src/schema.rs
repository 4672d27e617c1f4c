//! Idempotent table bring-up. No migrations: existing tables are left as they are.

use crate::error::{StorageError, StorageResult};
use crate::sql::is_identifier;
use quickapi_db::Database;
use quickapi_model::{quote_ident, Column, Entity, EntityKind, Relation, TableSchema};
use tracing::info;

/// DDL for the tables `entity` is stored in.
pub fn schema_sql(entity: &dyn Entity) -> StorageResult<String> {
    let table = entity.table();
    if !is_identifier(table) {
        return Err(StorageError::Configuration(format!("invalid table name '{table}'")));
    }

    match entity.kind() {
        EntityKind::Document => Ok(format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    \"id\" INTEGER PRIMARY KEY AUTOINCREMENT,\n    \"created\" INTEGER NOT NULL,\n    \"updated\" INTEGER NOT NULL,\n    \"data\" TEXT NOT NULL\n);\n",
            quote_ident(table)
        )),
        EntityKind::Typed => {
            let schema = entity.schema().ok_or_else(|| {
                StorageError::Configuration(format!("typed entity '{table}' has no table schema"))
            })?;
            let mut sql = create_table(table, schema, None)?;
            for relation in &schema.relations {
                sql.push_str(&create_table(&relation.table, &relation.schema, Some((table, relation)))?);
                sql.push_str(&format!(
                    "CREATE INDEX IF NOT EXISTS {} ON {} ({});\n",
                    quote_ident(&format!("idx_{}_{}", relation.table, relation.foreign_key)),
                    quote_ident(&relation.table),
                    quote_ident(&relation.foreign_key)
                ));
            }
            Ok(sql)
        }
    }
}

/// Creates the tables `entity` needs if they do not exist yet.
pub fn ensure_schema(db: &Database, entity: &dyn Entity) -> StorageResult<()> {
    let sql = schema_sql(entity)?;
    db.execute_batch(&sql)?;
    info!("schema ready for {} entity '{}' in table '{}'", entity.kind(), entity.name(), entity.table());
    Ok(())
}

fn create_table(table: &str, schema: &TableSchema, parent: Option<(&str, &Relation)>) -> StorageResult<String> {
    for name in std::iter::once(table).chain(schema.columns.iter().map(|c| c.name.as_str())) {
        if !is_identifier(name) {
            return Err(StorageError::Configuration(format!("invalid identifier '{name}'")));
        }
    }

    let mut defs: Vec<String> = schema
        .columns
        .iter()
        .map(|column| column_def(schema, column, parent))
        .collect();

    if let Some((parent_table, relation)) = parent {
        if !is_identifier(&relation.foreign_key) {
            return Err(StorageError::Configuration(format!(
                "invalid identifier '{}'",
                relation.foreign_key
            )));
        }
        if schema.find_column(&relation.foreign_key).is_none() {
            defs.push(format!(
                "{} INTEGER REFERENCES {} ON DELETE CASCADE",
                quote_ident(&relation.foreign_key),
                quote_ident(parent_table)
            ));
        }
    }

    Ok(format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {}\n);\n",
        quote_ident(table),
        defs.join(",\n    ")
    ))
}

fn column_def(schema: &TableSchema, column: &Column, parent: Option<(&str, &Relation)>) -> String {
    let name = quote_ident(&column.name);
    if column.name == schema.primary_key {
        return format!("{name} INTEGER PRIMARY KEY AUTOINCREMENT");
    }
    let mut def = format!("{name} {}", column.column_type.sql_type());
    if let Some((parent_table, relation)) = parent
        && relation.foreign_key == column.name
    {
        def.push_str(&format!(" REFERENCES {} ON DELETE CASCADE", quote_ident(parent_table)));
    } else if !column.nullable {
        def.push_str(" NOT NULL");
    }
    def
}
