//! REST API module.
//!
//! Handlers resolve accounts, aggregate contributions and run rollback batches.
//! Each request builds its own remote caller from the caller's credentials.

mod accounts;
mod contributions;
mod rollback;

pub use accounts::*;
pub use contributions::*;
pub use rollback::*;

use std::sync::Arc;

use axum::{extract::FromRequest, Json};

use crate::auth::CallerCredentials;
use crate::errors::AppError;
use crate::remote::{HttpRemoteCaller, RemoteCaller};
use crate::AppState;

/// Response type for API handlers.
pub type ApiResult<T> = Result<Json<T>, AppError>;

/// JSON body whose rejections are reported in the error envelope.
#[derive(FromRequest)]
#[from_request(via(Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// Remote caller for this request: signed when the caller presented credentials.
fn remote_caller(state: &AppState, credentials: &CallerCredentials) -> Arc<dyn RemoteCaller> {
    match credentials.context(&state.config) {
        Some(context) => HttpRemoteCaller::signed(state.http.clone(), &context).into_shared(),
        None => HttpRemoteCaller::anonymous(state.http.clone()).into_shared(),
    }
}

/// Trimmed, non-empty username or a validation error.
fn require_username(raw: &str) -> Result<&str, AppError> {
    let username = raw.trim();
    if username.is_empty() {
        return Err(AppError::Validation("Username is required".to_string()));
    }
    Ok(username)
}
