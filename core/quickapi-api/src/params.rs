//! Query-string extraction: plain values and `name[key]=value` bracket maps.

use crate::problem::ApiError;
use quickapi_model::ScopeData;
use std::collections::BTreeMap;

/// The decoded query string of one request, in the order it was sent.
#[derive(Debug, Clone, Default)]
pub struct Params {
    pairs: Vec<(String, String)>,
}

impl Params {
    pub fn new(pairs: Vec<(String, String)>) -> Self {
        Self { pairs }
    }

    /// First value of a plain parameter.
    pub fn value(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Non-negative integer parameter; absent means `default`.
    pub fn uint(&self, name: &str, default: u64) -> Result<u64, ApiError> {
        match self.value(name) {
            None => Ok(default),
            Some(raw) => raw.trim().parse().map_err(|_| {
                ApiError::BadRequest(format!("'{name}' must be a non-negative integer, got '{raw}'"))
            }),
        }
    }

    /// All `name[key]=value` entries as `key → value`. A repeated key keeps the last value.
    pub fn map(&self, name: &str) -> BTreeMap<String, String> {
        self.pairs
            .iter()
            .filter_map(|(k, v)| match split_bracket(k) {
                Some((group, key)) if group == name => Some((key.to_string(), v.clone())),
                _ => None,
            })
            .collect()
    }

    /// Every bracket group, keyed by group name. Named filters pick theirs out of this.
    pub fn groups(&self) -> ScopeData {
        let mut groups = ScopeData::new();
        for (k, v) in &self.pairs {
            if let Some((group, key)) = split_bracket(k) {
                groups
                    .entry(group.to_string())
                    .or_default()
                    .insert(key.to_string(), v.clone());
            }
        }
        groups
    }
}

/// Splits `group[key]` into its parts.
fn split_bracket(raw: &str) -> Option<(&str, &str)> {
    let inner = raw.strip_suffix(']')?;
    let (group, key) = inner.split_once('[')?;
    if group.is_empty() || key.is_empty() || key.contains(['[', ']']) {
        return None;
    }
    Some((group, key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn brackets() {
        assert_eq!(split_bracket("where[alive]"), Some(("where", "alive")));
        assert_eq!(split_bracket("where[]"), None);
        assert_eq!(split_bracket("[alive]"), None);
        assert_eq!(split_bracket("where"), None);
        assert_eq!(split_bracket("a[b][c]"), None);
    }
}
