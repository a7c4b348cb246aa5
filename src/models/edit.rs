//! Edit records and per-wiki pagination state.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// A top-of-page edit by the queried user on one wiki.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EditRecord {
    pub revision_id: u64,
    pub page_title: String,
    pub system_id: String,
    pub api_endpoint: String,
    pub author_username: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub size_delta: i64,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub is_latest_revision_of_page: bool,
}

/// Opaque per-wiki continuation tokens.
///
/// A missing entry means "start from the newest contribution". Tokens are never
/// interpreted, only handed back to the wiki that issued them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContinuationState(BTreeMap<String, String>);

impl ContinuationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, system_id: &str) -> Option<&str> {
        self.0.get(system_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ContinuationState {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Request body for aggregating contributions.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregationRequest {
    pub username: String,
    /// Accepts either a JSON object or a JSON-encoded string of one.
    #[serde(default, deserialize_with = "deserialize_continuation")]
    pub continuation_state: ContinuationState,
}

/// Aggregated contributions returned to the caller.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregationResponse {
    pub edits: Vec<EditRecord>,
    pub next_continuation_state: ContinuationState,
}

fn deserialize_continuation<'de, D>(deserializer: D) -> Result<ContinuationState, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Encoded {
        Map(ContinuationState),
        Text(String),
    }

    match Option::<Encoded>::deserialize(deserializer)? {
        None => Ok(ContinuationState::default()),
        Some(Encoded::Map(state)) => Ok(state),
        Some(Encoded::Text(text)) if text.trim().is_empty() => Ok(ContinuationState::default()),
        Some(Encoded::Text(text)) => serde_json::from_str(&text).map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_continuation_accepts_object() {
        let req: AggregationRequest = serde_json::from_str(
            r#"{"username":"Example","continuationState":{"enwiki":"20240101000000|42"}}"#,
        )
        .unwrap();
        assert_eq!(
            req.continuation_state.get("enwiki"),
            Some("20240101000000|42")
        );
    }

    #[test]
    fn test_continuation_accepts_encoded_string() {
        let req: AggregationRequest = serde_json::from_str(
            r#"{"username":"Example","continuationState":"{\"dewiki\":\"tok\"}"}"#,
        )
        .unwrap();
        assert_eq!(req.continuation_state.get("dewiki"), Some("tok"));
        assert_eq!(req.continuation_state.len(), 1);
    }

    #[test]
    fn test_continuation_defaults_to_empty() {
        let req: AggregationRequest = serde_json::from_str(r#"{"username":"Example"}"#).unwrap();
        assert!(req.continuation_state.is_empty());

        let req: AggregationRequest =
            serde_json::from_str(r#"{"username":"Example","continuationState":null}"#).unwrap();
        assert!(req.continuation_state.is_empty());

        let req: AggregationRequest =
            serde_json::from_str(r#"{"username":"Example","continuationState":""}"#).unwrap();
        assert!(req.continuation_state.is_empty());
    }

    #[test]
    fn test_continuation_rejects_malformed_string() {
        let result: Result<AggregationRequest, _> =
            serde_json::from_str(r#"{"username":"Example","continuationState":"{not json"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_edit_record_wire_names() {
        let edit = EditRecord {
            revision_id: 7,
            page_title: "Sandbox".to_string(),
            system_id: "enwiki".to_string(),
            api_endpoint: "https://en.wikipedia.org/w/api.php".to_string(),
            author_username: "Example".to_string(),
            timestamp: "2024-03-01T12:00:00Z".parse().unwrap(),
            size_delta: -12,
            comment: "tidy".to_string(),
            is_latest_revision_of_page: true,
        };
        let value = serde_json::to_value(&edit).unwrap();
        assert_eq!(value["revisionId"], 7);
        assert_eq!(value["pageTitle"], "Sandbox");
        assert_eq!(value["authorUsername"], "Example");
        assert_eq!(value["timestamp"], "2024-03-01T12:00:00Z");
        assert_eq!(value["isLatestRevisionOfPage"], true);
    }
}
