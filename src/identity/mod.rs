//! Global account lookup.
//!
//! Asks the coordinating wiki which local wikis a global account is merged into
//! and keeps the ones where the account has edited.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use crate::errors::AppError;
use crate::models::RemoteSystemRef;
use crate::remote::RemoteCaller;

/// Path appended to a wiki's base URL to reach its Action API.
const API_PATH: &str = "/w/api.php";

#[derive(Debug, Deserialize)]
struct GlobalUserInfoBody {
    query: Option<GlobalUserInfoQuery>,
}

#[derive(Debug, Deserialize)]
struct GlobalUserInfoQuery {
    globaluserinfo: Option<GlobalUserInfo>,
}

#[derive(Debug, Deserialize)]
struct GlobalUserInfo {
    #[serde(default)]
    missing: bool,
    #[serde(default)]
    merged: Vec<MergedAccount>,
}

#[derive(Debug, Deserialize)]
struct MergedAccount {
    wiki: String,
    url: String,
    #[serde(default)]
    editcount: u64,
}

/// Resolves a username to the wikis it has edited on.
pub struct IdentityResolver {
    caller: Arc<dyn RemoteCaller>,
    meta_api_url: String,
}

impl IdentityResolver {
    pub fn new(caller: Arc<dyn RemoteCaller>, meta_api_url: impl Into<String>) -> Self {
        Self {
            caller,
            meta_api_url: meta_api_url.into(),
        }
    }

    /// Wikis where `username` has a positive edit count, ordered by wiki id.
    ///
    /// An unknown or edit-less account yields an empty list. Any transport
    /// failure or unexpected body is [`AppError::UpstreamUnavailable`].
    pub async fn resolve(&self, username: &str) -> Result<Vec<RemoteSystemRef>, AppError> {
        let params = [
            ("action", "query"),
            ("meta", "globaluserinfo"),
            ("guiuser", username),
            ("guiprop", "merged"),
            ("format", "json"),
            ("formatversion", "2"),
        ];

        let body = self
            .caller
            .get(&self.meta_api_url, &params)
            .await
            .map_err(|e| {
                tracing::error!(username = %username, "Global account lookup failed: {}", e);
                AppError::UpstreamUnavailable(format!("Global account lookup failed: {}", e))
            })?;

        let systems = parse_merged_accounts(body)?;
        tracing::info!(
            username = %username,
            systems = systems.len(),
            "Resolved global account"
        );
        Ok(systems)
    }
}

fn parse_merged_accounts(body: Value) -> Result<Vec<RemoteSystemRef>, AppError> {
    if let Some(error) = body.get("error") {
        return Err(AppError::UpstreamUnavailable(format!(
            "Global account lookup rejected: {}",
            error
        )));
    }

    let parsed: GlobalUserInfoBody = serde_json::from_value(body).map_err(|e| {
        AppError::UpstreamUnavailable(format!("Malformed global account response: {}", e))
    })?;

    let info = parsed
        .query
        .and_then(|q| q.globaluserinfo)
        .ok_or_else(|| {
            AppError::UpstreamUnavailable(
                "Malformed global account response: missing globaluserinfo".to_string(),
            )
        })?;

    if info.missing {
        return Ok(Vec::new());
    }

    // Keyed by wiki id so duplicates collapse and the order is stable
    let systems: BTreeMap<String, RemoteSystemRef> = info
        .merged
        .into_iter()
        .filter(|account| account.editcount > 0)
        .map(|account| {
            let endpoint = format!("{}{}", account.url.trim_end_matches('/'), API_PATH);
            (
                account.wiki.clone(),
                RemoteSystemRef::new(account.wiki, endpoint),
            )
        })
        .collect();

    Ok(systems.into_values().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::fake::{api_error, FakeRemoteCaller};
    use crate::remote::RemoteError;
    use serde_json::json;

    const META: &str = "https://meta.example.org/w/api.php";

    fn build(caller: FakeRemoteCaller) -> (IdentityResolver, Arc<FakeRemoteCaller>) {
        let caller = Arc::new(caller);
        (IdentityResolver::new(caller.clone(), META), caller)
    }

    #[tokio::test]
    async fn test_resolve_filters_zero_edit_wikis() {
        let (resolver, caller) = build(FakeRemoteCaller::new(|_| {
            Ok(json!({
                "batchcomplete": true,
                "query": { "globaluserinfo": {
                    "home": "enwiki",
                    "name": "Example",
                    "merged": [
                        { "wiki": "enwiki", "url": "https://en.wikipedia.org", "editcount": 120 },
                        { "wiki": "dewiki", "url": "https://de.wikipedia.org/", "editcount": 3 },
                        { "wiki": "metawiki", "url": "https://meta.wikimedia.org", "editcount": 0 },
                        { "wiki": "frwiki", "url": "https://fr.wikipedia.org" }
                    ]
                }}
            }))
        }));

        let systems = resolver.resolve("Example").await.unwrap();

        assert_eq!(
            systems,
            vec![
                RemoteSystemRef::new("dewiki", "https://de.wikipedia.org/w/api.php"),
                RemoteSystemRef::new("enwiki", "https://en.wikipedia.org/w/api.php"),
            ]
        );

        let calls = caller.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].endpoint, META);
        assert_eq!(calls[0].param("meta"), Some("globaluserinfo"));
        assert_eq!(calls[0].param("guiuser"), Some("Example"));
        assert_eq!(calls[0].param("guiprop"), Some("merged"));
    }

    #[tokio::test]
    async fn test_resolve_missing_user_is_empty() {
        let (resolver, _) = build(FakeRemoteCaller::new(|_| {
            Ok(json!({ "query": { "globaluserinfo": { "missing": true } } }))
        }));

        assert!(resolver.resolve("Nobody").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_resolve_transport_failure_is_upstream_unavailable() {
        let (resolver, _) =
            build(FakeRemoteCaller::new(|_| Err(RemoteError::Timeout)));

        let err = resolver.resolve("Example").await.unwrap_err();
        assert!(matches!(err, AppError::UpstreamUnavailable(_)));
    }

    #[tokio::test]
    async fn test_resolve_malformed_body_is_upstream_unavailable() {
        let (resolver, _) = build(FakeRemoteCaller::new(|_| Ok(json!({ "query": {} }))));
        assert!(matches!(
            resolver.resolve("Example").await,
            Err(AppError::UpstreamUnavailable(_))
        ));

        let (resolver, _) = build(FakeRemoteCaller::new(|_| {
            Ok(json!({ "query": { "globaluserinfo": { "merged": "nope" } } }))
        }));
        assert!(matches!(
            resolver.resolve("Example").await,
            Err(AppError::UpstreamUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_resolve_api_error_is_upstream_unavailable() {
        let (resolver, _) = build(FakeRemoteCaller::new(|_| {
            Ok(api_error("badvalue", "Unrecognized value"))
        }));
        assert!(matches!(
            resolver.resolve("Example").await,
            Err(AppError::UpstreamUnavailable(_))
        ));
    }
}
