use serde::{Deserialize, Serialize};

/// Describes the physical layout of a typed entity's table.
///
/// Each column maps to the top-level record field of the same name. Has-many
/// relations live in their own tables and are keyed back to the parent's
/// primary key through `foreign_key`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    /// Auto-increment integer primary key column.
    pub primary_key: String,
    pub columns: Vec<Column>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relations: Vec<Relation>,
}

impl TableSchema {
    /// A schema containing only the integer primary key.
    pub fn new(primary_key: &str) -> Self {
        Self {
            primary_key: primary_key.into(),
            columns: vec![Column::integer(primary_key)],
            relations: Vec::new(),
        }
    }

    #[must_use]
    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    #[must_use]
    pub fn relation(mut self, relation: Relation) -> Self {
        self.relations.push(relation);
        self
    }

    pub fn find_column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn find_relation(&self, name: &str) -> Option<&Relation> {
        self.relations.iter().find(|r| r.name == name)
    }

    /// Columns other than the primary key.
    pub fn value_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(move |c| c.name != self.primary_key)
    }
}

/// A column extracted from the record's top-level fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub column_type: ColumnType,
    #[serde(default)]
    pub nullable: bool,
}

impl Column {
    fn simple(name: &str, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: false,
        }
    }

    /// Shorthand for a 64-bit integer column.
    pub fn integer(name: &str) -> Self {
        Self::simple(name, ColumnType::Integer)
    }

    /// Shorthand for a floating point column.
    pub fn real(name: &str) -> Self {
        Self::simple(name, ColumnType::Real)
    }

    /// Shorthand for a text column.
    pub fn text(name: &str) -> Self {
        Self::simple(name, ColumnType::Text)
    }

    /// Shorthand for a boolean column (stored as 0/1).
    pub fn boolean(name: &str) -> Self {
        Self::simple(name, ColumnType::Boolean)
    }

    /// Shorthand for a column holding serialized JSON.
    pub fn json(name: &str) -> Self {
        Self::simple(name, ColumnType::Json)
    }

    #[must_use]
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }
}

/// The logical type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Integer,
    Real,
    Text,
    Boolean,
    Json,
}

impl ColumnType {
    /// SQLite storage class used in DDL.
    #[must_use]
    pub const fn sql_type(&self) -> &'static str {
        match self {
            Self::Integer | Self::Boolean => "INTEGER",
            Self::Real => "REAL",
            Self::Text | Self::Json => "TEXT",
        }
    }
}

/// A has-many association owned by the parent record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    /// Record field holding the related rows; also the preload key.
    pub name: String,
    pub table: String,
    /// Column in `table` referencing the parent's primary key.
    pub foreign_key: String,
    pub schema: TableSchema,
}

impl Relation {
    pub fn has_many(name: &str, table: &str, foreign_key: &str, schema: TableSchema) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            foreign_key: foreign_key.into(),
            schema,
        }
    }
}
