use quickapi_storage::DEFAULT_TAKE;
use serde::{Deserialize, Serialize};

/// Names and defaults the HTTP transport reads requests with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Path parameter holding the record id.
    pub id_param: String,
    /// Bracket map of preload aliases, e.g. `preload[status]=true`.
    pub preload_param: String,
    /// Bracket map of equality filters, e.g. `where[alive]=true`.
    pub where_param: String,
    /// Bracket map of sort directions, e.g. `sort[id]=desc`.
    pub sort_param: String,
    pub skip_param: String,
    pub take_param: String,
    pub default_skip: u64,
    pub default_take: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            id_param: "id".into(),
            preload_param: "preload".into(),
            where_param: "where".into(),
            sort_param: "sort".into(),
            skip_param: "skip".into(),
            take_param: "take".into(),
            default_skip: 0,
            default_take: DEFAULT_TAKE,
        }
    }
}
