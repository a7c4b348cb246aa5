//! Contribution aggregation endpoint.

use axum::{extract::State, Json};

use super::{remote_caller, require_username, ApiJson, ApiResult};
use crate::aggregator::{AggregationSettings, ContributionAggregator, SystemOutcome};
use crate::auth::CallerCredentials;
use crate::identity::IdentityResolver;
use crate::models::{AggregationRequest, AggregationResponse};
use crate::AppState;

/// POST /api/contributions - Newest standing edits of a user across all their wikis.
pub async fn aggregate_contributions(
    State(state): State<AppState>,
    credentials: CallerCredentials,
    ApiJson(request): ApiJson<AggregationRequest>,
) -> ApiResult<AggregationResponse> {
    let username = require_username(&request.username)?;
    let caller = remote_caller(&state, &credentials);

    let systems = IdentityResolver::new(caller.clone(), state.config.meta_api_url.as_str())
        .resolve(username)
        .await?;

    let aggregator =
        ContributionAggregator::new(caller, AggregationSettings::from_config(&state.config));
    let aggregation = aggregator
        .aggregate(username, &systems, &request.continuation_state)
        .await;

    for failure in aggregation.failures() {
        if let SystemOutcome::Failed { system_id, reason } = failure {
            tracing::debug!(system = %system_id, "Wiki left out of aggregation: {}", reason);
        }
    }

    Ok(Json(aggregation.into_response()))
}
