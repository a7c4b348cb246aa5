//! Cross-wiki contribution aggregation.
//!
//! One task per wiki fetches a single page of the user's newest contributions,
//! bounded by a worker pool. Only edits that are still the top revision of their
//! page are kept. The pool of kept edits is capped; once it is full, wikis whose
//! fetch has not started yet are skipped. Each wiki's pagination cursor is handed
//! back to the caller so the next call continues with older edits.

mod collector;

pub use collector::EditCollector;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;

use crate::config::Config;
use crate::models::{AggregationResponse, ContinuationState, EditRecord, RemoteSystemRef};
use crate::remote::RemoteCaller;

/// Contribution properties requested from every wiki.
const UC_PROP: &str = "title|ids|timestamp|user|comment|sizediff|flags";

/// Tunables for one aggregation.
#[derive(Debug, Clone, Copy)]
pub struct AggregationSettings {
    /// Maximum number of edits returned
    pub limit: usize,
    /// Wikis queried at the same time
    pub max_workers: usize,
    /// Contributions requested per wiki
    pub page_size: usize,
}

impl AggregationSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            limit: config.edit_limit,
            max_workers: config.max_workers,
            page_size: config.page_size,
        }
    }
}

/// What happened to one wiki during an aggregation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SystemOutcome {
    /// Page fetched. `retained` counts this wiki's edits in the final result.
    ///
    /// The cursor always points past the whole page. Standing edits from that page
    /// that lost out to newer edits elsewhere are not offered again on later calls.
    Fetched {
        system_id: String,
        retained: usize,
        continuation: Option<String>,
    },
    /// Not fetched because the pool was already full. The incoming cursor is kept.
    Skipped {
        system_id: String,
        continuation: Option<String>,
    },
    /// Fetch failed; the wiki contributes nothing.
    Failed { system_id: String, reason: String },
}

impl SystemOutcome {
    pub fn system_id(&self) -> &str {
        match self {
            SystemOutcome::Fetched { system_id, .. }
            | SystemOutcome::Skipped { system_id, .. }
            | SystemOutcome::Failed { system_id, .. } => system_id,
        }
    }

    fn continuation(&self) -> Option<&str> {
        match self {
            SystemOutcome::Fetched { continuation, .. }
            | SystemOutcome::Skipped { continuation, .. } => continuation.as_deref(),
            SystemOutcome::Failed { .. } => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, SystemOutcome::Failed { .. })
    }
}

/// Result of one aggregation.
#[derive(Debug, Clone)]
pub struct Aggregation {
    /// Newest first, at most `limit` long.
    pub edits: Vec<EditRecord>,
    pub next_continuation: ContinuationState,
    /// One entry per wiki, ordered by wiki id.
    pub outcomes: Vec<SystemOutcome>,
}

impl Aggregation {
    fn empty() -> Self {
        Self {
            edits: Vec::new(),
            next_continuation: ContinuationState::new(),
            outcomes: Vec::new(),
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = &SystemOutcome> {
        self.outcomes.iter().filter(|o| o.is_failed())
    }

    pub fn into_response(self) -> AggregationResponse {
        AggregationResponse {
            edits: self.edits,
            next_continuation_state: self.next_continuation,
        }
    }
}

/// One entry of `list=usercontribs`.
#[derive(Debug, Deserialize)]
struct UserContrib {
    revid: u64,
    title: String,
    timestamp: DateTime<Utc>,
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    comment: String,
    #[serde(default)]
    sizediff: i64,
    #[serde(default, deserialize_with = "deserialize_flag")]
    top: bool,
}

/// `formatversion=2` sends `true`; the legacy format sends `""` when set and omits it otherwise.
fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Bool(flag) => flag,
        Value::Null => false,
        _ => true,
    })
}

impl UserContrib {
    fn into_edit(self, system: &RemoteSystemRef, username: &str) -> EditRecord {
        EditRecord {
            revision_id: self.revid,
            page_title: self.title,
            system_id: system.system_id.clone(),
            api_endpoint: system.api_endpoint.clone(),
            author_username: self.user.unwrap_or_else(|| username.to_string()),
            timestamp: self.timestamp,
            size_delta: self.sizediff,
            comment: self.comment,
            is_latest_revision_of_page: self.top,
        }
    }
}

struct ContribsPage {
    contribs: Vec<UserContrib>,
    cursor: Option<String>,
}

fn parse_contribs_page(body: &Value) -> Result<ContribsPage, String> {
    if let Some(error) = body.get("error") {
        return Err(format!("API error: {}", error));
    }

    let entries = body
        .get("query")
        .and_then(|q| q.get("usercontribs"))
        .and_then(Value::as_array)
        .ok_or_else(|| "malformed response: missing query.usercontribs".to_string())?;

    let contribs = entries
        .iter()
        .filter_map(|entry| match UserContrib::deserialize(entry) {
            Ok(contrib) => Some(contrib),
            Err(e) => {
                tracing::debug!("Skipping unparseable contribution: {}", e);
                None
            }
        })
        .collect();

    let cursor = body
        .get("continue")
        .and_then(|c| c.get("uccontinue"))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    Ok(ContribsPage { contribs, cursor })
}

/// State shared by the tasks of one aggregation.
struct FetchContext {
    caller: Arc<dyn RemoteCaller>,
    username: String,
    page_size: String,
    pool: Mutex<EditCollector>,
}

/// Fans out over wikis and merges their top-of-page edits.
pub struct ContributionAggregator {
    caller: Arc<dyn RemoteCaller>,
    settings: AggregationSettings,
}

impl ContributionAggregator {
    pub fn new(caller: Arc<dyn RemoteCaller>, settings: AggregationSettings) -> Self {
        Self { caller, settings }
    }

    /// Aggregate the newest standing edits of `username` across `systems`.
    ///
    /// Never fails: a wiki that errors or times out contributes no edits and is
    /// reported in [`Aggregation::outcomes`].
    pub async fn aggregate(
        &self,
        username: &str,
        systems: &[RemoteSystemRef],
        continuation: &ContinuationState,
    ) -> Aggregation {
        if systems.is_empty() {
            return Aggregation::empty();
        }

        let ctx = Arc::new(FetchContext {
            caller: Arc::clone(&self.caller),
            username: username.to_string(),
            page_size: self.settings.page_size.to_string(),
            pool: Mutex::new(EditCollector::new(self.settings.limit)),
        });
        let permits = Arc::new(Semaphore::new(self.settings.max_workers.max(1)));

        let mut tasks = JoinSet::new();
        for system in systems {
            let ctx = Arc::clone(&ctx);
            let permits = Arc::clone(&permits);
            let system = system.clone();
            let token = continuation.get(&system.system_id).map(str::to_string);

            tasks.spawn(async move {
                let _permit = match permits.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return SystemOutcome::Failed {
                            system_id: system.system_id,
                            reason: "worker pool closed".to_string(),
                        }
                    }
                };
                fetch_system(&ctx, &system, token).await
            });
        }

        let mut outcomes = Vec::with_capacity(systems.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => tracing::error!("Contribution fetch task aborted: {}", e),
            }
        }
        outcomes.sort_by(|a, b| a.system_id().cmp(b.system_id()));

        let next_continuation: ContinuationState = outcomes
            .iter()
            .filter_map(|o| o.continuation().map(|token| (o.system_id(), token)))
            .collect();

        let edits = {
            let mut pool = ctx.pool.lock().await;
            std::mem::replace(&mut *pool, EditCollector::new(0)).into_sorted()
        };

        for outcome in &mut outcomes {
            if let SystemOutcome::Fetched {
                system_id,
                retained,
                ..
            } = outcome
            {
                *retained = edits.iter().filter(|e| e.system_id == *system_id).count();
            }
        }

        let failed = outcomes.iter().filter(|o| o.is_failed()).count();
        let contributing = outcomes
            .iter()
            .filter(|o| matches!(o, SystemOutcome::Fetched { retained, .. } if *retained > 0))
            .count();
        tracing::info!(
            username = %username,
            systems = systems.len(),
            failed,
            contributing,
            edits = edits.len(),
            continuations = next_continuation.len(),
            "Aggregated contributions"
        );

        Aggregation {
            edits,
            next_continuation,
            outcomes,
        }
    }
}

async fn fetch_system(
    ctx: &FetchContext,
    system: &RemoteSystemRef,
    token: Option<String>,
) -> SystemOutcome {
    if ctx.pool.lock().await.is_full() {
        tracing::debug!(system = %system.system_id, "Pool full, skipping fetch");
        return SystemOutcome::Skipped {
            system_id: system.system_id.clone(),
            continuation: token,
        };
    }

    let mut params = vec![
        ("action", "query"),
        ("list", "usercontribs"),
        ("ucuser", ctx.username.as_str()),
        ("uclimit", ctx.page_size.as_str()),
        ("ucprop", UC_PROP),
        ("format", "json"),
        ("formatversion", "2"),
    ];
    if let Some(token) = token.as_deref() {
        params.push(("uccontinue", token));
    }

    let page = match ctx.caller.get(&system.api_endpoint, &params).await {
        Ok(body) => parse_contribs_page(&body),
        Err(e) => Err(e.to_string()),
    };
    let page = match page {
        Ok(page) => page,
        Err(reason) => {
            tracing::warn!(system = %system.system_id, "Contribution fetch failed: {}", reason);
            return SystemOutcome::Failed {
                system_id: system.system_id.clone(),
                reason,
            };
        }
    };

    let mut accepted = 0;
    {
        let mut pool = ctx.pool.lock().await;
        for contrib in page.contribs.into_iter().filter(|c| c.top) {
            if pool.offer(contrib.into_edit(system, &ctx.username)) {
                accepted += 1;
            }
        }
    }

    tracing::debug!(
        system = %system.system_id,
        accepted,
        more = page.cursor.is_some(),
        "Fetched contributions"
    );

    // Final per-wiki count is settled once every fetch has finished
    SystemOutcome::Fetched {
        system_id: system.system_id.clone(),
        retained: accepted,
        continuation: page.cursor,
    }
}
