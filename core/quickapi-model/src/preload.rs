//! Alias-driven conditional eager loads.
//!
//! A caller names an alias and an activation value (`preload[status]=true`).
//! The entity maps the alias to one or more relations, each with an SQL
//! condition template and a converter from the raw string to the value bound
//! into that template.

use crate::query::{placeholder_count, Preload};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// Condition used when a spec leaves its condition empty.
pub const ALWAYS_TRUE: &str = "1 = 1";

/// Converts the raw activation string into the value bound into the condition.
pub type Converter = Arc<dyn Fn(&str) -> Value + Send + Sync>;

/// How to eager-load one relation for an alias.
#[derive(Clone, Default)]
pub struct PreloadSpec {
    /// SQL condition on the related rows. Empty means unconditional.
    pub condition: String,
    /// `None` passes the raw string through.
    pub converter: Option<Converter>,
}

impl PreloadSpec {
    /// Unconditional eager load.
    #[must_use]
    pub fn always() -> Self {
        Self::default()
    }

    /// Eager load of the related rows matching `condition`.
    pub fn when(condition: impl Into<String>) -> Self {
        Self {
            condition: condition.into(),
            converter: None,
        }
    }

    #[must_use]
    pub fn with_converter<F>(mut self, converter: F) -> Self
    where
        F: Fn(&str) -> Value + Send + Sync + 'static,
    {
        self.converter = Some(Arc::new(converter));
        self
    }

    /// The condition with the always-true default applied.
    pub fn effective_condition(&self) -> &str {
        if self.condition.trim().is_empty() {
            ALWAYS_TRUE
        } else {
            &self.condition
        }
    }

    /// Converts the activation value, defaulting to the raw string.
    pub fn convert(&self, raw: &str) -> Value {
        match &self.converter {
            Some(converter) => converter(raw),
            None => Value::String(raw.to_string()),
        }
    }
}

impl fmt::Debug for PreloadSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreloadSpec")
            .field("condition", &self.condition)
            .field("converter", &self.converter.is_some())
            .finish()
    }
}

/// Capability of an entity that understands preload aliases.
pub trait PreloadSource: Send + Sync {
    /// Relation name → spec for `alias`, or `None` for an unknown alias.
    fn preload(&self, alias: &str) -> Option<BTreeMap<String, PreloadSpec>>;
}

impl<F> PreloadSource for F
where
    F: Fn(&str) -> Option<BTreeMap<String, PreloadSpec>> + Send + Sync,
{
    fn preload(&self, alias: &str) -> Option<BTreeMap<String, PreloadSpec>> {
        self(alias)
    }
}

/// Descriptor-owned table of preload aliases.
#[derive(Debug, Clone, Default)]
pub struct PreloadRegistry {
    aliases: HashMap<String, BTreeMap<String, PreloadSpec>>,
}

impl PreloadRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `relation` under `alias`. One alias may configure several relations.
    #[must_use]
    pub fn alias(mut self, alias: impl Into<String>, relation: impl Into<String>, spec: PreloadSpec) -> Self {
        self.aliases
            .entry(alias.into())
            .or_default()
            .insert(relation.into(), spec);
        self
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}

impl PreloadSource for PreloadRegistry {
    fn preload(&self, alias: &str) -> Option<BTreeMap<String, PreloadSpec>> {
        self.aliases.get(alias).cloned()
    }
}

/// Resolves requested aliases (alias → activation value) into preloads.
///
/// Missing capability and unknown aliases contribute nothing.
pub fn resolve_preloads(
    source: Option<&dyn PreloadSource>,
    aliases: &BTreeMap<String, String>,
) -> Vec<Preload> {
    let Some(source) = source else {
        return Vec::new();
    };

    let mut preloads = Vec::new();
    for (alias, activation) in aliases {
        let Some(specs) = source.preload(alias) else {
            continue;
        };
        for (relation, spec) in specs {
            let condition = spec.effective_condition().to_string();
            let value = spec.convert(activation);
            let params = vec![value; placeholder_count(&condition)];
            preloads.push(Preload {
                relation,
                condition,
                params,
            });
        }
    }
    preloads
}
