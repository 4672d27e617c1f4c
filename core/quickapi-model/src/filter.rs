//! Named filters: business rules activated by query parameter groups.
//!
//! An entity declares its filters once. At request time the transport hands
//! over every parameter group the caller supplied; each declared filter whose
//! name appears produces one [`Hook`]. Hooks come back in declaration order,
//! never in the order the caller happened to send the groups.

use crate::query::Hook;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// Turns the activating key/value map into a query transform.
pub type ScopeFn = Arc<dyn Fn(&BTreeMap<String, String>) -> Hook + Send + Sync>;

/// Activated parameter groups, keyed by filter name.
pub type ScopeData = HashMap<String, BTreeMap<String, String>>;

/// A scope bound to the name of the parameter group that activates it.
#[derive(Clone)]
pub struct NamedFilter {
    pub name: String,
    pub scope: ScopeFn,
}

impl NamedFilter {
    pub fn new<F>(name: impl Into<String>, scope: F) -> Self
    where
        F: Fn(&BTreeMap<String, String>) -> Hook + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            scope: Arc::new(scope),
        }
    }
}

impl fmt::Debug for NamedFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamedFilter").field("name", &self.name).finish_non_exhaustive()
    }
}

/// Capability of an entity that declares named filters.
pub trait ScopeSource: Send + Sync {
    fn scopes(&self) -> &[NamedFilter];
}

impl ScopeSource for Vec<NamedFilter> {
    fn scopes(&self) -> &[NamedFilter] {
        self
    }
}

/// Builds the hooks for every declared filter present in `activated`.
pub fn create_hooks(source: Option<&dyn ScopeSource>, activated: &ScopeData) -> Vec<Hook> {
    let Some(source) = source else {
        return Vec::new();
    };

    source
        .scopes()
        .iter()
        .filter_map(|filter| activated.get(&filter.name).map(|data| (filter.scope)(data)))
        .collect()
}
