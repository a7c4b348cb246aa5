//! Outbound calls to wiki Action API endpoints.
//!
//! [`RemoteCaller`] is the seam the identity resolver, the aggregator and the
//! rollback orchestrator talk through. [`HttpRemoteCaller`] is the reqwest
//! implementation; it owns timeout and User-Agent policy through the shared
//! client and optionally signs every request for one caller.

mod oauth;

#[cfg(test)]
pub mod fake;

pub use oauth::*;

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{header::AUTHORIZATION, Url};
use serde_json::Value;

use crate::config::Config;
use crate::errors::AppError;

/// Failure of a single outbound call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// The endpoint string is not a valid absolute URL
    InvalidEndpoint(String),
    /// The call exceeded the configured timeout
    Timeout,
    /// Connection or protocol failure
    Transport(String),
    /// Non-success HTTP status
    Status(u16),
    /// Body was not the expected JSON
    Decode(String),
}

impl std::fmt::Display for RemoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RemoteError::InvalidEndpoint(endpoint) => write!(f, "invalid endpoint: {}", endpoint),
            RemoteError::Timeout => write!(f, "request timed out"),
            RemoteError::Transport(msg) => write!(f, "transport error: {}", msg),
            RemoteError::Status(code) => write!(f, "unexpected HTTP status {}", code),
            RemoteError::Decode(msg) => write!(f, "malformed response: {}", msg),
        }
    }
}

impl std::error::Error for RemoteError {}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RemoteError::Timeout
        } else if err.is_decode() {
            RemoteError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            RemoteError::Status(status.as_u16())
        } else {
            RemoteError::Transport(err.to_string())
        }
    }
}

/// Issues GET/POST calls against one Action API endpoint and returns the JSON body.
#[async_trait]
pub trait RemoteCaller: Send + Sync {
    /// GET `endpoint` with `params` as the query string.
    async fn get(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<Value, RemoteError>;

    /// POST `form` as `application/x-www-form-urlencoded` to `endpoint`.
    async fn post(&self, endpoint: &str, form: &[(&str, &str)]) -> Result<Value, RemoteError>;
}

/// Build the shared outbound client with the configured timeout and User-Agent.
pub fn build_http_client(config: &Config) -> Result<reqwest::Client, AppError> {
    let client = reqwest::Client::builder()
        .timeout(config.request_timeout)
        .user_agent(config.user_agent.as_str())
        .build()?;
    Ok(client)
}

/// reqwest-backed [`RemoteCaller`], signed when built with a [`CallerContext`].
pub struct HttpRemoteCaller {
    client: reqwest::Client,
    signer: Option<OAuthSigner>,
}

impl HttpRemoteCaller {
    /// Unsigned caller, for public read-only queries.
    pub fn anonymous(client: reqwest::Client) -> Self {
        Self {
            client,
            signer: None,
        }
    }

    /// Caller that signs every request on behalf of `context`.
    pub fn signed(client: reqwest::Client, context: &CallerContext) -> Self {
        Self {
            client,
            signer: Some(context.signer()),
        }
    }

    pub fn into_shared(self) -> Arc<dyn RemoteCaller> {
        Arc::new(self)
    }

    fn parse_endpoint(endpoint: &str) -> Result<Url, RemoteError> {
        let url =
            Url::parse(endpoint).map_err(|_| RemoteError::InvalidEndpoint(endpoint.to_string()))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            _ => Err(RemoteError::InvalidEndpoint(endpoint.to_string())),
        }
    }

    async fn read_json(response: reqwest::Response) -> Result<Value, RemoteError> {
        let status = response.status();
        if !status.is_success() {
            return Err(RemoteError::Status(status.as_u16()));
        }
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| RemoteError::Decode(e.to_string()))
    }
}

#[async_trait]
impl RemoteCaller for HttpRemoteCaller {
    async fn get(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<Value, RemoteError> {
        let mut url = Self::parse_endpoint(endpoint)?;
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params.iter());
        }

        let mut request = self.client.get(url.clone());
        if let Some(signer) = &self.signer {
            request = request.header(AUTHORIZATION, signer.authorization_header("GET", &url, &[]));
        }

        tracing::debug!(endpoint = %endpoint, signed = self.signer.is_some(), "GET");
        let response = request.send().await?;
        Self::read_json(response).await
    }

    async fn post(&self, endpoint: &str, form: &[(&str, &str)]) -> Result<Value, RemoteError> {
        let url = Self::parse_endpoint(endpoint)?;

        let mut request = self.client.post(url.clone()).form(form);
        if let Some(signer) = &self.signer {
            request = request.header(AUTHORIZATION, signer.authorization_header("POST", &url, form));
        }

        tracing::debug!(endpoint = %endpoint, signed = self.signer.is_some(), "POST");
        let response = request.send().await?;
        Self::read_json(response).await
    }
}
