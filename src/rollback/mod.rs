//! Sequential bulk rollback.
//!
//! Items are processed one at a time: fetch a rollback token from the edit's
//! wiki, then submit the rollback. A failing item is recorded and the batch
//! moves on. A fixed pause follows every item to stay under the wikis'
//! rate limits.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::models::{RollbackResult, RollbackTarget};
use crate::remote::RemoteCaller;

/// Token handed out to anonymous sessions; it cannot authorize a rollback.
const ANONYMOUS_TOKEN: &str = "+\\";

/// Why a single rollback did not go through.
#[derive(Debug, Clone, PartialEq)]
pub enum RollbackFailure {
    /// No usable rollback token could be obtained
    TokenFetch(String),
    /// The rollback request itself did not complete
    Submit(String),
    /// The wiki answered with an error payload
    Rejected { detail: String, payload: Value },
}

impl RollbackFailure {
    fn into_parts(self) -> (String, Option<Value>) {
        match self {
            RollbackFailure::Rejected { detail, payload } => (detail, Some(payload)),
            other => (other.to_string(), None),
        }
    }
}

impl std::fmt::Display for RollbackFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RollbackFailure::TokenFetch(msg) => write!(f, "token fetch failed: {}", msg),
            RollbackFailure::Submit(msg) => write!(f, "rollback submit failed: {}", msg),
            RollbackFailure::Rejected { detail, .. } => write!(f, "{}", detail),
        }
    }
}

impl std::error::Error for RollbackFailure {}

/// Render an Action API `error` object as `code: info`.
fn describe_api_error(error: &Value) -> String {
    let code = error.get("code").and_then(Value::as_str);
    let info = error.get("info").and_then(Value::as_str);
    match (code, info) {
        (Some(code), Some(info)) => format!("{}: {}", code, info),
        (Some(code), None) => code.to_string(),
        (None, Some(info)) => info.to_string(),
        (None, None) => error.to_string(),
    }
}

/// Runs one rollback batch to completion.
pub struct RollbackOrchestrator {
    caller: Arc<dyn RemoteCaller>,
    delay: Duration,
}

impl RollbackOrchestrator {
    pub fn new(caller: Arc<dyn RemoteCaller>, delay: Duration) -> Self {
        Self { caller, delay }
    }

    /// Roll back every target in order. Always returns one result per target, in input order.
    pub async fn execute(&self, targets: &[RollbackTarget]) -> Vec<RollbackResult> {
        let mut results = Vec::with_capacity(targets.len());

        for (index, target) in targets.iter().enumerate() {
            let result = match self.rollback_one(target).await {
                Ok(()) => {
                    tracing::info!(
                        system = %target.system_id,
                        revision_id = target.revision_id,
                        title = %target.page_title,
                        "Rolled back edit"
                    );
                    RollbackResult::success(target)
                }
                Err(failure) => {
                    tracing::warn!(
                        system = %target.system_id,
                        revision_id = target.revision_id,
                        title = %target.page_title,
                        "Rollback failed: {}",
                        failure
                    );
                    let (detail, payload) = failure.into_parts();
                    RollbackResult::failed(target, detail, payload)
                }
            };
            results.push(result);

            tracing::trace!(item = index + 1, total = targets.len(), "Throttling");
            tokio::time::sleep(self.delay).await;
        }

        let succeeded = results.iter().filter(|r| r.is_success()).count();
        tracing::info!(
            total = results.len(),
            succeeded,
            failed = results.len() - succeeded,
            "Rollback batch finished"
        );

        results
    }

    async fn rollback_one(&self, target: &RollbackTarget) -> Result<(), RollbackFailure> {
        let token = self.fetch_token(&target.api_endpoint).await?;

        let form = [
            ("action", "rollback"),
            ("title", target.page_title.as_str()),
            ("user", target.author_username.as_str()),
            ("token", token.as_str()),
            ("format", "json"),
            ("formatversion", "2"),
        ];
        let body = self
            .caller
            .post(&target.api_endpoint, &form)
            .await
            .map_err(|e| RollbackFailure::Submit(e.to_string()))?;

        match body.get("error") {
            Some(error) => Err(RollbackFailure::Rejected {
                detail: describe_api_error(error),
                payload: error.clone(),
            }),
            None => Ok(()),
        }
    }

    async fn fetch_token(&self, endpoint: &str) -> Result<String, RollbackFailure> {
        let params = [
            ("action", "query"),
            ("meta", "tokens"),
            ("type", "rollback"),
            ("format", "json"),
            ("formatversion", "2"),
        ];
        let body = self
            .caller
            .get(endpoint, &params)
            .await
            .map_err(|e| RollbackFailure::TokenFetch(e.to_string()))?;

        if let Some(error) = body.get("error") {
            return Err(RollbackFailure::TokenFetch(describe_api_error(error)));
        }

        let token = body
            .pointer("/query/tokens/rollbacktoken")
            .and_then(Value::as_str)
            .ok_or_else(|| RollbackFailure::TokenFetch("no rollback token in response".to_string()))?;

        if token.is_empty() || token == ANONYMOUS_TOKEN {
            return Err(RollbackFailure::TokenFetch(
                "wiki issued an anonymous token; the caller's credentials were not accepted"
                    .to_string(),
            ));
        }

        Ok(token.to_string())
    }
}
