//! Service access gate and caller credential extraction.
//!
//! The pre-shared key gate uses constant-time comparison to mitigate timing
//! attacks. Caller OAuth access tokens arrive in request headers and are turned
//! into a per-request [`CallerContext`]; nothing is kept between requests.

use std::convert::Infallible;

use axum::{
    extract::{FromRequestParts, Request},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use subtle::ConstantTimeEq;

use crate::config::Config;
use crate::errors::AppError;
use crate::remote::{AccessToken, CallerContext, ConsumerToken};

/// Header name for the API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Header carrying the caller's OAuth access token key.
pub const ACCESS_TOKEN_HEADER: &str = "x-oauth-token";

/// Header carrying the caller's OAuth access token secret.
pub const ACCESS_SECRET_HEADER: &str = "x-oauth-token-secret";

/// PSK authentication layer function that takes the expected PSK as a parameter.
pub async fn psk_auth_layer(
    expected_psk: Option<String>,
    request: Request,
    next: Next,
) -> Response {
    // If no PSK is configured, allow all requests (dev mode)
    let Some(expected) = expected_psk else {
        return next.run(request).await;
    };

    let provided = header_value(request.headers(), API_KEY_HEADER).or_else(|| {
        request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.strip_prefix("Bearer "))
            .map(|s| s.to_string())
    });

    match provided {
        Some(key) if constant_time_compare(&key, &expected) => next.run(request).await,
        Some(_) => AppError::Unauthorized("Invalid API key".to_string()).into_response(),
        None => AppError::Unauthorized("Missing or invalid API key".to_string()).into_response(),
    }
}

/// Perform constant-time string comparison.
fn constant_time_compare(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// The caller's OAuth access token, when one was presented.
#[derive(Debug, Clone)]
pub struct CallerCredentials(pub Option<AccessToken>);

impl CallerCredentials {
    fn from_headers(headers: &HeaderMap) -> Self {
        let key = header_value(headers, ACCESS_TOKEN_HEADER);
        let secret = header_value(headers, ACCESS_SECRET_HEADER);
        match (key, secret) {
            (Some(key), Some(secret)) => Self(Some(AccessToken { key, secret })),
            _ => Self(None),
        }
    }

    /// Signing context for this caller, if both the caller and the service have credentials.
    pub fn context(&self, config: &Config) -> Option<CallerContext> {
        let access = self.0.clone()?;
        let consumer = ConsumerToken {
            key: config.consumer_key.clone()?,
            secret: config.consumer_secret.clone()?,
        };
        Some(CallerContext::new(consumer, access))
    }
}

impl<S> FromRequestParts<S> for CallerCredentials
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_headers(&parts.headers))
    }
}
