//! The query value built up by request translation and scope hooks.
//!
//! A [`Query`] is a plain description of what a storage engine should add to
//! the statement it is about to run: conjunctive conditions with bound
//! parameters, ordering, paging and conditional eager loads. Engines own the
//! table and column list; hooks only ever see and return a `Query`.

use serde_json::Value;
use std::sync::Arc;

/// A query transform produced by an activated scope.
pub type Hook = Arc<dyn Fn(Query) -> Query + Send + Sync>;

/// Wraps a closure as a [`Hook`].
pub fn hook<F>(f: F) -> Hook
where
    F: Fn(Query) -> Query + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Applies hooks to a query in the order given.
#[must_use]
pub fn apply_hooks(query: Query, hooks: &[Hook]) -> Query {
    hooks.iter().fold(query, |q, h| h(q))
}

/// Quotes an identifier for use in SQL text.
#[must_use]
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Direction of an ORDER BY term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    /// Parses `asc`/`desc` case-insensitively. An empty value means ascending.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "asc" => Some(Self::Asc),
            "desc" => Some(Self::Desc),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// One conjunct of the WHERE clause: an SQL fragment with `?` placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub sql: String,
    pub params: Vec<Value>,
}

/// One ORDER BY term. `expr` is emitted as-is.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub expr: String,
    pub direction: SortDirection,
}

/// A conditional eager load of a relation.
#[derive(Debug, Clone, PartialEq)]
pub struct Preload {
    /// Relation name as declared in the table schema.
    pub relation: String,
    /// Condition on the related rows, `?` bound in order to `params`.
    pub condition: String,
    pub params: Vec<Value>,
}

/// Predicates, ordering, paging and preloads for one storage call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub conditions: Vec<Condition>,
    pub order: Vec<OrderBy>,
    pub offset: Option<u64>,
    pub limit: Option<u64>,
    pub preloads: Vec<Preload>,
}

impl Query {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a raw condition. Every `?` in `sql` consumes one parameter.
    #[must_use]
    pub fn filter(mut self, sql: impl Into<String>, params: Vec<Value>) -> Self {
        self.conditions.push(Condition {
            sql: sql.into(),
            params,
        });
        self
    }

    /// Adds `"column" = ?`.
    #[must_use]
    pub fn eq(self, column: &str, value: impl Into<Value>) -> Self {
        let sql = format!("{} = ?", quote_ident(column));
        self.filter(sql, vec![value.into()])
    }

    #[must_use]
    pub fn order_by(mut self, expr: impl Into<String>, direction: SortDirection) -> Self {
        self.order.push(OrderBy {
            expr: expr.into(),
            direction,
        });
        self
    }

    #[must_use]
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn preload(
        mut self,
        relation: impl Into<String>,
        condition: impl Into<String>,
        params: Vec<Value>,
    ) -> Self {
        self.preloads.push(Preload {
            relation: relation.into(),
            condition: condition.into(),
            params,
        });
        self
    }

    /// Renders the conditions as one conjunction, or `None` when there are none.
    pub fn where_sql(&self) -> Option<(String, Vec<Value>)> {
        if self.conditions.is_empty() {
            return None;
        }
        let sql = self
            .conditions
            .iter()
            .map(|c| format!("({})", c.sql))
            .collect::<Vec<_>>()
            .join(" AND ");
        let params = self
            .conditions
            .iter()
            .flat_map(|c| c.params.iter().cloned())
            .collect();
        Some((sql, params))
    }

    /// Renders the ORDER BY list without the keyword.
    pub fn order_sql(&self) -> Option<String> {
        if self.order.is_empty() {
            return None;
        }
        Some(
            self.order
                .iter()
                .map(|o| format!("{} {}", o.expr, o.direction.as_sql()))
                .collect::<Vec<_>>()
                .join(", "),
        )
    }
}

/// Counts `?` placeholders outside single-quoted literals.
pub(crate) fn placeholder_count(sql: &str) -> usize {
    let mut in_literal = false;
    let mut count = 0;
    for c in sql.chars() {
        match c {
            '\'' => in_literal = !in_literal,
            '?' if !in_literal => count += 1,
            _ => {}
        }
    }
    count
}
