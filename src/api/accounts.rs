//! Global account endpoints.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;

use super::{remote_caller, require_username, ApiResult};
use crate::auth::CallerCredentials;
use crate::identity::IdentityResolver;
use crate::models::RemoteSystemRef;
use crate::AppState;

/// Wikis a global account has edited on.
#[derive(Debug, Serialize)]
pub struct AccountSystemsResponse {
    pub username: String,
    pub systems: Vec<RemoteSystemRef>,
}

/// GET /api/accounts/{username}/systems - List the wikis an account has edited on.
pub async fn list_account_systems(
    State(state): State<AppState>,
    credentials: CallerCredentials,
    Path(username): Path<String>,
) -> ApiResult<AccountSystemsResponse> {
    let username = require_username(&username)?;

    let resolver = IdentityResolver::new(
        remote_caller(&state, &credentials),
        state.config.meta_api_url.as_str(),
    );
    let systems = resolver.resolve(username).await?;

    Ok(Json(AccountSystemsResponse {
        username: username.to_string(),
        systems,
    }))
}
