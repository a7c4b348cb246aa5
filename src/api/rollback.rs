//! Bulk rollback endpoint.

use axum::{extract::State, Json};

use super::{ApiJson, ApiResult};
use crate::auth::CallerCredentials;
use crate::errors::AppError;
use crate::models::{RollbackRequest, RollbackResponse};
use crate::remote::HttpRemoteCaller;
use crate::rollback::RollbackOrchestrator;
use crate::AppState;

/// POST /api/rollback - Roll back the submitted edits one by one.
pub async fn rollback_edits(
    State(state): State<AppState>,
    credentials: CallerCredentials,
    ApiJson(request): ApiJson<RollbackRequest>,
) -> ApiResult<RollbackResponse> {
    let Some(context) = credentials.context(&state.config) else {
        return Err(AppError::Unauthorized("Login required".to_string()));
    };

    tracing::info!(items = request.edits.len(), "Starting rollback batch");

    let caller = HttpRemoteCaller::signed(state.http.clone(), &context).into_shared();
    let orchestrator = RollbackOrchestrator::new(caller, state.config.rollback_delay);
    let results = orchestrator.execute(&request.edits).await;

    Ok(Json(RollbackResponse {
        success: true,
        results,
    }))
}
