//! Rollback request and result models.

use serde::{Deserialize, Serialize};

use super::EditRecord;

/// The parts of an [`EditRecord`] needed to roll it back.
///
/// A full `EditRecord` JSON object deserializes into this; extra fields are ignored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RollbackTarget {
    pub revision_id: u64,
    pub system_id: String,
    pub api_endpoint: String,
    pub page_title: String,
    pub author_username: String,
}

impl From<&EditRecord> for RollbackTarget {
    fn from(edit: &EditRecord) -> Self {
        Self {
            revision_id: edit.revision_id,
            system_id: edit.system_id.clone(),
            api_endpoint: edit.api_endpoint.clone(),
            page_title: edit.page_title.clone(),
            author_username: edit.author_username.clone(),
        }
    }
}

/// Outcome of a single rollback.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RollbackOutcome {
    Success,
    Failed,
}

/// Result for one submitted edit, in submission order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RollbackResult {
    pub revision_id: u64,
    pub system_id: String,
    pub page_title: String,
    pub outcome: RollbackOutcome,
    pub error_detail: Option<String>,
    /// Raw error payload when the wiki rejected the rollback.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_error: Option<serde_json::Value>,
}

impl RollbackResult {
    pub fn success(target: &RollbackTarget) -> Self {
        Self {
            revision_id: target.revision_id,
            system_id: target.system_id.clone(),
            page_title: target.page_title.clone(),
            outcome: RollbackOutcome::Success,
            error_detail: None,
            remote_error: None,
        }
    }

    pub fn failed(
        target: &RollbackTarget,
        detail: impl Into<String>,
        remote_error: Option<serde_json::Value>,
    ) -> Self {
        Self {
            revision_id: target.revision_id,
            system_id: target.system_id.clone(),
            page_title: target.page_title.clone(),
            outcome: RollbackOutcome::Failed,
            error_detail: Some(detail.into()),
            remote_error,
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == RollbackOutcome::Success
    }
}

/// Request body for a rollback batch.
#[derive(Debug, Clone, Deserialize)]
pub struct RollbackRequest {
    #[serde(default)]
    pub edits: Vec<RollbackTarget>,
}

/// Rollback batch response.
#[derive(Debug, Clone, Serialize)]
pub struct RollbackResponse {
    pub success: bool,
    pub results: Vec<RollbackResult>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_from_full_edit_json() {
        let target: RollbackTarget = serde_json::from_value(serde_json::json!({
            "revisionId": 991,
            "pageTitle": "Talk:Example",
            "systemId": "frwiki",
            "apiEndpoint": "https://fr.wikipedia.org/w/api.php",
            "authorUsername": "Vandal",
            "timestamp": "2024-01-02T03:04:05Z",
            "sizeDelta": 300,
            "comment": "",
            "isLatestRevisionOfPage": true
        }))
        .unwrap();

        assert_eq!(target.revision_id, 991);
        assert_eq!(target.system_id, "frwiki");
        assert_eq!(target.author_username, "Vandal");
    }

    #[test]
    fn test_result_serialization() {
        let target = RollbackTarget {
            revision_id: 5,
            system_id: "enwiki".to_string(),
            api_endpoint: "https://en.wikipedia.org/w/api.php".to_string(),
            page_title: "Sandbox".to_string(),
            author_username: "Example".to_string(),
        };

        let ok = serde_json::to_value(RollbackResult::success(&target)).unwrap();
        assert_eq!(ok["outcome"], "success");
        assert!(ok["errorDetail"].is_null());
        assert!(ok.get("remoteError").is_none());

        let failed = serde_json::to_value(RollbackResult::failed(&target, "boom", None)).unwrap();
        assert_eq!(failed["outcome"], "failed");
        assert_eq!(failed["errorDetail"], "boom");
        assert_eq!(failed["revisionId"], 5);
    }
}
