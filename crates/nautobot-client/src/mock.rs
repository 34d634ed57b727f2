//! In-memory transport for unit testing
//!
//! [`MockTransport`] records every request it receives and answers through a
//! caller-supplied handler, so tests can assert on verbs, URLs, payloads and
//! call counts without a running Nautobot instance.

use crate::error::Result;
use crate::transport::{HttpRequest, HttpResponse, Transport};
use serde_json::{Value, json};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

type Handler = dyn Fn(&HttpRequest) -> HttpResponse + Send + Sync;

/// Mock transport for testing
#[derive(Clone)]
pub struct MockTransport {
    handler: Arc<Handler>,
    requests: Arc<Mutex<Vec<HttpRequest>>>,
}

impl MockTransport {
    /// Create a mock answering every request through `handler`
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&HttpRequest) -> HttpResponse + Send + Sync + 'static,
    {
        Self {
            handler: Arc::new(handler),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Mock answering every request with `200` and the same JSON body
    pub fn json(body: Value) -> Self {
        Self::new(move |_| HttpResponse::json(200, &body))
    }

    /// Every request received so far, oldest first
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Most recent request, if any
    pub fn last_request(&self) -> Option<HttpRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }

    /// Number of requests received so far
    pub fn request_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockTransport")
            .field("requests", &self.request_count())
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let response = (self.handler)(&request);
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);
        Ok(response)
    }
}

/// Query parameters of a request, including those embedded in its URL
pub fn query_params(request: &HttpRequest) -> Vec<(String, String)> {
    let mut params = Vec::new();
    if let Some((_, query)) = request.url.split_once('?') {
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let decode = |s: &str| {
                urlencoding::decode(s)
                    .map(|c| c.into_owned())
                    .unwrap_or_else(|_| s.to_string())
            };
            params.push((decode(key), decode(value)));
        }
    }
    params.extend(request.params.iter().cloned());
    params
}

/// Handler emulating a paginated list endpoint of `count` items
///
/// Items look like `{"id": n, "name": "item-n"}`. `limit` is capped at
/// `max_page_size`, which is also the page size when `limit` is absent or 0.
/// `next` links carry every non-paging parameter forward.
pub fn paginated_handler(
    base: &str,
    count: u64,
    max_page_size: u64,
) -> impl Fn(&HttpRequest) -> HttpResponse + Send + Sync + 'static {
    let base = base.to_string();
    move |request| {
        let params = query_params(request);
        let lookup = |name: &str| {
            params
                .iter()
                .rev()
                .find(|(k, _)| k == name)
                .and_then(|(_, v)| v.parse::<u64>().ok())
        };
        let limit = match lookup("limit") {
            None | Some(0) => max_page_size,
            Some(limit) => limit.min(max_page_size),
        };
        let offset = lookup("offset").unwrap_or(0);
        let end = (offset + limit).min(count);
        let results: Vec<Value> = (offset.min(end)..end)
            .map(|id| json!({"id": id, "name": format!("item-{id}")}))
            .collect();

        let carried: String = params
            .iter()
            .filter(|(k, _)| k != "limit" && k != "offset")
            .map(|(k, v)| format!("&{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect();
        let next = (end < count).then(|| format!("{base}?limit={limit}&offset={end}{carried}"));
        let previous = (offset > 0).then(|| format!("{base}?limit={limit}{carried}"));

        HttpResponse::json(
            200,
            &json!({
                "count": count,
                "next": next,
                "previous": previous,
                "results": results,
            }),
        )
    }
}
