//! Remote wiki reference.

use serde::{Deserialize, Serialize};

/// One wiki a global account is registered on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct RemoteSystemRef {
    /// Database name of the wiki, e.g. `enwiki`.
    pub system_id: String,
    /// Action API endpoint, e.g. `https://en.wikipedia.org/w/api.php`.
    pub api_endpoint: String,
}

impl RemoteSystemRef {
    pub fn new(system_id: impl Into<String>, api_endpoint: impl Into<String>) -> Self {
        Self {
            system_id: system_id.into(),
            api_endpoint: api_endpoint.into(),
        }
    }
}
