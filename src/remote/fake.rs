//! Scripted in-memory [`RemoteCaller`] for unit tests.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{RemoteCaller, RemoteError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// One call seen by the fake.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: Method,
    pub endpoint: String,
    pub params: BTreeMap<String, String>,
}

impl RecordedCall {
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}

type Handler = Box<dyn Fn(&RecordedCall) -> Result<Value, RemoteError> + Send + Sync>;

pub struct FakeRemoteCaller {
    handler: Handler,
    latency: Duration,
    calls: Mutex<Vec<RecordedCall>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeRemoteCaller {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&RecordedCall) -> Result<Value, RemoteError> + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            latency: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Delay every response, so overlapping calls become observable.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn dispatch(
        &self,
        method: Method,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<Value, RemoteError> {
        let call = RecordedCall {
            method,
            endpoint: endpoint.to_string(),
            params: params
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        };
        self.calls.lock().unwrap().push(call.clone());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let result = (self.handler)(&call);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

#[async_trait]
impl RemoteCaller for FakeRemoteCaller {
    async fn get(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<Value, RemoteError> {
        self.dispatch(Method::Get, endpoint, params).await
    }

    async fn post(&self, endpoint: &str, form: &[(&str, &str)]) -> Result<Value, RemoteError> {
        self.dispatch(Method::Post, endpoint, form).await
    }
}

/// A `list=usercontribs` contribution as returned with `formatversion=2`.
pub fn contrib(revid: u64, title: &str, timestamp: &str, top: bool) -> Value {
    json!({
        "userid": 1,
        "user": "Example",
        "pageid": revid * 10,
        "revid": revid,
        "parentid": revid.saturating_sub(1),
        "ns": 0,
        "title": title,
        "timestamp": timestamp,
        "comment": format!("edit {}", revid),
        "size": 100,
        "sizediff": 4,
        "top": top,
    })
}

/// A `list=usercontribs` page, with a continuation cursor when `cursor` is set.
pub fn contribs_page(contribs: Vec<Value>, cursor: Option<&str>) -> Value {
    let mut body = json!({
        "batchcomplete": true,
        "query": { "usercontribs": contribs },
    });
    if let Some(cursor) = cursor {
        body["continue"] = json!({ "uccontinue": cursor, "continue": "-||" });
    }
    body
}

/// An Action API error payload.
pub fn api_error(code: &str, info: &str) -> Value {
    json!({ "error": { "code": code, "info": info, "docref": "See /w/api.php" } })
}
