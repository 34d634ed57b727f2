//! Request building and pagination
//!
//! [`Request`] addresses one URL of the Nautobot API. It attaches auth and
//! version headers, interprets status codes, and turns paginated list
//! responses into a single JSON array, either by following `next` links or by
//! fetching the remaining pages concurrently.

use crate::client::NautobotClient;
use crate::error::{NautobotError, Result};
use crate::transport::{HttpMethod, HttpRequest, HttpResponse, Transport};
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// Paginated response wrapper from Nautobot API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub previous: Option<String>,
    pub results: Vec<T>,
}

/// Number of pages needed to hold `count` items, `page_size` at a time
///
/// A zero page size means the server did not reveal its page size; callers
/// must fall back to following `next` links.
pub fn calc_pages(page_size: u64, count: u64) -> u64 {
    if page_size == 0 {
        return 0;
    }
    count.div_ceil(page_size)
}

/// Make sure a URL ends with a slash
pub fn normalize_url(url: &str) -> String {
    if url.ends_with('/') {
        url.to_string()
    } else {
        format!("{url}/")
    }
}

fn param(key: &str, value: impl ToString) -> (String, String) {
    (key.to_string(), value.to_string())
}

/// Split a JSON response into a pagination envelope, or hand it back untouched
fn into_page(value: Value) -> std::result::Result<PaginatedResponse<Value>, Value> {
    let is_page = value.get("results").is_some_and(Value::is_array);
    if !is_page {
        return Err(value);
    }
    serde_json::from_value(value.clone()).map_err(|_| value)
}

/// A single call (or a paginated series of calls) against one URL
#[derive(Debug, Clone)]
pub struct Request {
    transport: Arc<dyn Transport>,
    base: String,
    url: String,
    token: Option<String>,
    filters: Vec<(String, String)>,
    limit: Option<u64>,
    offset: Option<u64>,
    threading: bool,
    max_workers: usize,
    api_version: Option<String>,
}

impl Request {
    /// Create a request against `base`, inheriting the client's settings
    pub fn new(base: &str, client: &NautobotClient) -> Self {
        let base = normalize_url(base);
        Self {
            transport: client.transport(),
            url: base.clone(),
            base,
            token: client.token().map(str::to_string),
            filters: Vec::new(),
            limit: None,
            offset: None,
            threading: client.threading(),
            max_workers: client.max_workers(),
            api_version: client.api_version().map(str::to_string),
        }
    }

    /// Address the detail URL `<base><key>/`
    pub fn key(mut self, key: impl std::fmt::Display) -> Self {
        self.url = format!("{}{}/", self.base, key);
        self
    }

    /// Query parameters sent with every page
    pub fn filters(mut self, filters: Vec<(String, String)>) -> Self {
        self.filters = filters;
        self
    }

    /// Page size; 0 asks for the server maximum
    pub fn limit(mut self, limit: Option<u64>) -> Self {
        self.limit = limit;
        self
    }

    /// Fetch the single page starting here
    pub fn offset(mut self, offset: Option<u64>) -> Self {
        self.offset = offset;
        self
    }

    /// Override the client threading setting
    pub fn threading(mut self, threading: bool) -> Self {
        self.threading = threading;
        self
    }

    /// Override the API version; `None` keeps the client default
    pub fn api_version(mut self, api_version: Option<String>) -> Self {
        if api_version.is_some() {
            self.api_version = api_version;
        }
        self
    }

    /// Collection or detail URL
    pub fn url(&self) -> &str {
        &self.url
    }

    fn headers(&self, method: HttpMethod, has_body: bool) -> Vec<(String, String)> {
        let mut headers = Vec::new();
        let writes = matches!(method, HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch)
            || (method == HttpMethod::Delete && has_body);
        if writes {
            headers.push(param("Content-Type", "application/json"));
        }
        match &self.api_version {
            Some(version) => {
                headers.push(param("Accept", format!("application/json; version={version}")));
            }
            None if !writes => headers.push(param("Accept", "application/json")),
            None => {}
        }
        if let Some(token) = &self.token {
            headers.push(param("Authorization", format!("Token {token}")));
        }
        headers
    }

    /// Hand a request to the transport without interpreting the status
    async fn send(
        &self,
        method: HttpMethod,
        url_override: Option<&str>,
        add_params: &[(String, String)],
        data: Option<&Value>,
    ) -> Result<HttpResponse> {
        let mut params = Vec::new();
        if url_override.is_none() {
            params = self.filters.clone();
            for (key, value) in add_params {
                params.retain(|(k, _)| k != key);
                params.push((key.clone(), value.clone()));
            }
        }

        let request = HttpRequest {
            method,
            url: url_override.unwrap_or(&self.url).to_string(),
            params,
            headers: self.headers(method, data.is_some()),
            body: data.cloned(),
        };
        debug!("{} {} params={:?}", method, request.url, request.params);

        self.transport.send(request).await
    }

    /// Send a request and decode the response according to the API contract
    ///
    /// DELETE yields `Value::Bool(true)` on success since delete responses
    /// carry no body.
    async fn make_call(
        &self,
        method: HttpMethod,
        url_override: Option<&str>,
        add_params: &[(String, String)],
        data: Option<&Value>,
    ) -> Result<Value> {
        let url = url_override.unwrap_or(&self.url);
        let response = self.send(method, url_override, add_params, data).await?;

        if response.status == 204 && method == HttpMethod::Post {
            return Err(NautobotError::Allocation { url: url.to_string() });
        }
        if !response.is_success() {
            return Err(NautobotError::from_response(
                response.status,
                &response.reason,
                url,
                &response.body,
            ));
        }
        if method == HttpMethod::Delete {
            return Ok(Value::Bool(true));
        }

        serde_json::from_str(&response.body).map_err(|_| NautobotError::Content {
            url: url.to_string(),
        })
    }

    /// GET the URL, merging every page of a paginated response
    ///
    /// Returns a JSON array for list endpoints and the raw object otherwise.
    pub async fn get(&self) -> Result<Value> {
        self.get_with(Vec::new()).await
    }

    /// GET with extra query parameters layered over the filters
    pub async fn get_with(&self, add_params: Vec<(String, String)>) -> Result<Value> {
        if self.offset.is_some() && !self.limit.is_some_and(|limit| limit > 0) {
            return Err(NautobotError::Validation(
                "offset requires a positive limit".to_string(),
            ));
        }

        let mut add_params = add_params;
        if add_params.is_empty() {
            if let Some(limit) = self.limit {
                add_params.push(param("limit", limit));
                if let (true, Some(offset)) = (limit > 0, self.offset) {
                    add_params.push(param("offset", offset));
                }
            }
        }

        if self.threading {
            self.req_all_threaded(add_params).await
        } else {
            self.req_all(add_params).await
        }
    }

    async fn req_all(&self, add_params: Vec<(String, String)>) -> Result<Value> {
        let response = self.make_call(HttpMethod::Get, None, &add_params, None).await?;
        let page = match into_page(response) {
            Ok(page) => page,
            Err(raw) => return Ok(raw),
        };

        let mut results = page.results;
        if self.offset.is_some() {
            return Ok(Value::Array(results));
        }

        let mut next = page.next;
        if add_params.is_empty() && next.is_some() {
            // Ask for everything that is left in one go; the server may still
            // cap the page and hand back another `next` link.
            let rest = vec![param("limit", page.count), param("offset", results.len())];
            let response = self.make_call(HttpMethod::Get, None, &rest, None).await?;
            let page: PaginatedResponse<Value> = serde_json::from_value(response)?;
            results.extend(page.results);
            next = page.next;
        }

        self.follow_next(results, next).await
    }

    async fn follow_next(
        &self,
        mut results: Vec<Value>,
        mut next: Option<String>,
    ) -> Result<Value> {
        while let Some(next_url) = next.take() {
            debug!("Fetching page: {}", next_url);
            let response = self.make_call(HttpMethod::Get, Some(&next_url), &[], None).await?;
            let page: PaginatedResponse<Value> = serde_json::from_value(response)?;
            results.extend(page.results);
            next = page.next;
        }
        Ok(Value::Array(results))
    }

    async fn req_all_threaded(&self, add_params: Vec<(String, String)>) -> Result<Value> {
        // limit=0 asks the server for its maximum page size
        let add_params = if add_params.is_empty() {
            vec![param("limit", 0)]
        } else {
            add_params
        };

        let response = self.make_call(HttpMethod::Get, None, &add_params, None).await?;
        let page = match into_page(response) {
            Ok(page) => page,
            Err(raw) => return Ok(raw),
        };

        let mut results = page.results;
        if page.next.is_none() || self.offset.is_some() {
            return Ok(Value::Array(results));
        }

        let page_size = results.len() as u64;
        let pages = calc_pages(page_size, page.count);
        if pages <= 1 {
            warn!(
                "Cannot derive page layout for {} (page size {}, count {}), following next links",
                self.url, page_size, page.count
            );
            return self.follow_next(results, page.next).await;
        }

        let offsets: Vec<u64> = (1..pages).map(|page| page * page_size).collect();
        debug!(
            "Fetching {} remaining pages of {} with {} workers",
            offsets.len(),
            self.url,
            self.max_workers
        );

        let pages: Vec<Vec<Value>> = stream::iter(offsets)
            .map(|offset| {
                let params = vec![param("offset", offset), param("limit", page_size)];
                async move {
                    let response = self.make_call(HttpMethod::Get, None, &params, None).await?;
                    let page: PaginatedResponse<Value> = serde_json::from_value(response)?;
                    Ok::<_, NautobotError>(page.results)
                }
            })
            .buffer_unordered(self.max_workers.max(1))
            .try_collect()
            .await?;

        for page in pages {
            results.extend(page);
        }
        Ok(Value::Array(results))
    }

    /// Makes a POST request
    ///
    /// A 204 answer is reported as [`NautobotError::Allocation`].
    pub async fn post(&self, data: &Value) -> Result<Value> {
        self.make_call(HttpMethod::Post, None, &[], Some(data)).await
    }

    /// Makes a PUT request
    pub async fn put(&self, data: &Value) -> Result<Value> {
        self.make_call(HttpMethod::Put, None, &[], Some(data)).await
    }

    /// Makes a PATCH request
    pub async fn patch(&self, data: &Value) -> Result<Value> {
        self.make_call(HttpMethod::Patch, None, &[], Some(data)).await
    }

    /// Makes a DELETE request, optionally with a bulk payload
    pub async fn delete(&self, data: Option<&Value>) -> Result<bool> {
        let response = self.make_call(HttpMethod::Delete, None, &[], data).await?;
        Ok(response.as_bool().unwrap_or(true))
    }

    /// Makes an OPTIONS request
    pub async fn options(&self) -> Result<Value> {
        self.make_call(HttpMethod::Options, None, &[], None).await
    }

    /// Number of objects matching the filters, fetched with `limit=1`
    pub async fn get_count(&self) -> Result<u64> {
        let response = self
            .make_call(HttpMethod::Get, None, &[param("limit", 1)], None)
            .await?;
        let page: PaginatedResponse<Value> = serde_json::from_value(response)?;
        Ok(page.count)
    }

    /// Value of the `API-Version` header on the API root, empty if absent
    pub async fn get_version(&self) -> Result<String> {
        let response = self.send(HttpMethod::Get, Some(&self.base), &[], None).await?;
        if !response.is_success() {
            return Err(NautobotError::from_response(
                response.status,
                &response.reason,
                &self.base,
                &response.body,
            ));
        }
        Ok(response.header("API-Version").unwrap_or_default().to_string())
    }

    /// Contents of `<base>/status/`
    pub async fn get_status(&self) -> Result<Value> {
        let url = format!("{}status/", self.base);
        self.make_call(HttpMethod::Get, Some(&url), &[], None).await
    }

    /// The OpenAPI document at `<base>/docs/?format=openapi`
    pub async fn get_openapi(&self) -> Result<Value> {
        let url = format!("{}docs/?format=openapi", self.base);
        self.make_call(HttpMethod::Get, Some(&url), &[], None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::mock::{MockTransport, paginated_handler, query_params};
    use serde_json::json;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const DEVICES: &str = "http://nb.local/api/dcim/devices/";

    fn client(mock: &MockTransport, threading: bool) -> NautobotClient {
        let config = ClientConfig::new("http://nb.local", Some("abc123".to_string()))
            .threading(threading)
            .max_workers(3);
        NautobotClient::with_transport(config, Arc::new(mock.clone()))
    }

    fn ids(value: &Value) -> Vec<u64> {
        value
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v["id"].as_u64().unwrap())
            .collect()
    }

    #[test]
    fn test_calc_pages() {
        assert_eq!(calc_pages(50, 100), 2);
        assert_eq!(calc_pages(50, 101), 3);
        assert_eq!(calc_pages(50, 0), 0);
        assert_eq!(calc_pages(50, 1), 1);
        assert_eq!(calc_pages(1, 7), 7);
        assert_eq!(calc_pages(0, 10), 0);
    }

    #[test]
    fn test_normalize_url() {
        assert_eq!(normalize_url("http://nb/api/dcim/devices"), "http://nb/api/dcim/devices/");
        assert_eq!(normalize_url("http://nb/api/dcim/devices/"), "http://nb/api/dcim/devices/");
    }

    #[tokio::test]
    async fn test_get_sets_headers() {
        let mock = MockTransport::new(|_| HttpResponse::json(200, &json!({"id": 1})));
        let config =
            ClientConfig::new("http://nb.local", Some("abc123".to_string())).api_version("2.4");
        let client = NautobotClient::with_transport(config, Arc::new(mock.clone()));

        Request::new(DEVICES, &client).key(1).get().await.unwrap();

        let sent = mock.last_request().unwrap();
        assert_eq!(sent.url, "http://nb.local/api/dcim/devices/1/");
        assert_eq!(sent.header("Authorization"), Some("Token abc123"));
        assert_eq!(sent.header("Accept"), Some("application/json; version=2.4"));
        assert_eq!(sent.header("Content-Type"), None);
    }

    #[tokio::test]
    async fn test_write_sets_content_type() {
        let mock = MockTransport::new(|_| HttpResponse::json(201, &json!({"id": 1})));
        let client = client(&mock, false);

        Request::new(DEVICES, &client).post(&json!({"name": "sw1"})).await.unwrap();

        let sent = mock.last_request().unwrap();
        assert_eq!(sent.method, HttpMethod::Post);
        assert_eq!(sent.header("Content-Type"), Some("application/json"));
        assert_eq!(sent.body, Some(json!({"name": "sw1"})));
    }

    #[tokio::test]
    async fn test_post_204_is_allocation_error() {
        let mock = MockTransport::new(|_| HttpResponse::no_content());
        let client = client(&mock, false);

        let err = Request::new("http://nb.local/api/ipam/prefixes/1/available-ips/", &client)
            .post(&json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, NautobotError::Allocation { .. }));
    }

    #[tokio::test]
    async fn test_non_json_success_is_content_error() {
        let mock = MockTransport::new(|_| HttpResponse::text(200, "<html>login</html>"));
        let client = client(&mock, false);

        let err = Request::new(DEVICES, &client).get().await.unwrap_err();
        assert!(matches!(err, NautobotError::Content { .. }));
    }

    #[tokio::test]
    async fn test_error_status_is_request_error() {
        let mock = MockTransport::new(|_| HttpResponse::json(400, &json!({"detail": "bad"})));
        let client = client(&mock, false);

        let err = Request::new(DEVICES, &client).patch(&json!({})).await.unwrap_err();
        match err {
            NautobotError::Request { status, body, url, .. } => {
                assert_eq!(status, 400);
                assert_eq!(body, Some(json!({"detail": "bad"})));
                assert_eq!(url, DEVICES);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_delete_returns_true_without_body() {
        let mock = MockTransport::new(|_| HttpResponse::no_content());
        let client = client(&mock, false);

        assert!(Request::new(DEVICES, &client).key("abc").delete(None).await.unwrap());
        let sent = mock.last_request().unwrap();
        assert_eq!(sent.method, HttpMethod::Delete);
        assert_eq!(sent.header("Content-Type"), None);
    }

    #[tokio::test]
    async fn test_offset_without_limit_fails_before_request() {
        let mock = MockTransport::new(|_| HttpResponse::json(200, &json!({})));
        let client = client(&mock, false);

        let err = Request::new(DEVICES, &client).offset(Some(10)).get().await.unwrap_err();
        assert!(matches!(err, NautobotError::Validation(_)));

        let err = Request::new(DEVICES, &client)
            .limit(Some(0))
            .offset(Some(10))
            .get()
            .await
            .unwrap_err();
        assert!(matches!(err, NautobotError::Validation(_)));
        assert_eq!(mock.request_count(), 0);
    }

    #[tokio::test]
    async fn test_sequential_fetch_returns_all_in_order() {
        for (count, page_size) in [(0, 50), (1, 50), (50, 50), (101, 50), (7, 2)] {
            let mock = MockTransport::new(paginated_handler(DEVICES, count, page_size));
            let client = client(&mock, false);

            let result = Request::new(DEVICES, &client).get().await.unwrap();
            let expected: Vec<u64> = (0..count).collect();
            assert_eq!(ids(&result), expected, "count={count} page_size={page_size}");
        }
    }

    #[tokio::test]
    async fn test_sequential_fetch_requests_remainder_in_one_call() {
        let mock = MockTransport::new(paginated_handler(DEVICES, 120, 50));
        let client = client(&mock, false);

        Request::new(DEVICES, &client).get().await.unwrap();

        // First page at the default size, then limit=count offset=50, which the
        // server caps at 50 again, then a final next link.
        let requests = mock.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[1].param("limit"), Some("120"));
        assert_eq!(requests[1].param("offset"), Some("50"));
        assert!(requests[2].url.contains("offset=100"));
    }

    #[tokio::test]
    async fn test_explicit_offset_returns_single_page() {
        let mock = MockTransport::new(paginated_handler(DEVICES, 30, 50));
        let client = client(&mock, false);

        let result = Request::new(DEVICES, &client)
            .limit(Some(5))
            .offset(Some(10))
            .get()
            .await
            .unwrap();
        assert_eq!(ids(&result), (10..15).collect::<Vec<_>>());
        assert_eq!(mock.request_count(), 1);
    }

    #[tokio::test]
    async fn test_limit_without_offset_pages_through_everything() {
        let mock = MockTransport::new(paginated_handler(DEVICES, 12, 50));
        let client = client(&mock, false);

        let result = Request::new(DEVICES, &client).limit(Some(5)).get().await.unwrap();
        assert_eq!(ids(&result), (0..12).collect::<Vec<_>>());
        assert_eq!(mock.request_count(), 3);
    }

    #[tokio::test]
    async fn test_concurrent_fetch_returns_every_item() {
        for (count, page_size) in [(1, 50), (100, 50), (101, 50), (250, 10), (9, 1)] {
            let mock = MockTransport::new(paginated_handler(DEVICES, count, page_size));
            let client = client(&mock, true);

            let result = Request::new(DEVICES, &client).get().await.unwrap();
            let got: HashSet<u64> = ids(&result).into_iter().collect();
            assert_eq!(result.as_array().unwrap().len() as u64, count);
            assert_eq!(got, (0..count).collect::<HashSet<_>>());

            let first = &mock.requests()[0];
            assert_eq!(first.param("limit"), Some("0"));
            assert_eq!(
                mock.request_count() as u64,
                calc_pages(page_size, count).max(1),
                "count={count} page_size={page_size}"
            );
        }
    }

    #[tokio::test]
    async fn test_concurrent_fetch_keeps_order_within_page() {
        let mock = MockTransport::new(paginated_handler(DEVICES, 30, 10));
        let client = client(&mock, true);

        let result = Request::new(DEVICES, &client).get().await.unwrap();
        for chunk in ids(&result).chunks(10) {
            assert!(chunk.windows(2).all(|w| w[1] == w[0] + 1));
        }
    }

    #[tokio::test]
    async fn test_concurrent_fetch_falls_back_on_empty_first_page() {
        // A server that returns no items on the first page but still links to
        // more: the page size is unknown, so pagination follows next links.
        let mock = MockTransport::new(|req| {
            if req.param("limit") == Some("0") {
                HttpResponse::json(200, &json!({
                    "count": 2,
                    "next": "http://nb.local/api/dcim/devices/?page=2",
                    "previous": null,
                    "results": [],
                }))
            } else {
                HttpResponse::json(200, &json!({
                    "count": 2,
                    "next": null,
                    "previous": null,
                    "results": [{"id": 0}, {"id": 1}],
                }))
            }
        });
        let client = client(&mock, true);

        let result = Request::new(DEVICES, &client).get().await.unwrap();
        assert_eq!(ids(&result), vec![0, 1]);
        assert_eq!(mock.request_count(), 2);
    }

    #[tokio::test]
    async fn test_filters_are_sent_with_every_page() {
        let mock = MockTransport::new(paginated_handler(DEVICES, 30, 10));
        let client = client(&mock, true);

        Request::new(DEVICES, &client)
            .filters(vec![param("role", "leaf"), param("role", "spine")])
            .get()
            .await
            .unwrap();

        for request in mock.requests() {
            let roles: Vec<&str> = request
                .params
                .iter()
                .filter(|(k, _)| k == "role")
                .map(|(_, v)| v.as_str())
                .collect();
            assert_eq!(roles, vec!["leaf", "spine"]);
        }
    }

    #[tokio::test]
    async fn test_next_links_keep_filter_values_intact() {
        let mock = MockTransport::new(paginated_handler(DEVICES, 30, 10));
        let client = client(&mock, false);

        let result = Request::new(DEVICES, &client)
            .filters(vec![param("role", "leaf&spine x")])
            .get()
            .await
            .unwrap();
        assert_eq!(ids(&result), (0..30).collect::<Vec<_>>());

        let requests = mock.requests();
        assert!(requests.iter().any(|r| r.url.contains('?')));
        for request in requests {
            let roles: Vec<String> = query_params(&request)
                .into_iter()
                .filter(|(k, _)| k == "role")
                .map(|(_, v)| v)
                .collect();
            assert_eq!(roles, vec!["leaf&spine x"]);
        }
    }

    /// Handler that reports `first` items on the first call and `later` after
    fn changing_collection(first: u64, later: u64) -> MockTransport {
        let calls = AtomicUsize::new(0);
        let before = paginated_handler(DEVICES, first, 10);
        let after = paginated_handler(DEVICES, later, 10);
        MockTransport::new(move |req| {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                before(req)
            } else {
                after(req)
            }
        })
    }

    #[tokio::test]
    async fn test_concurrent_fetch_tolerates_collection_changes() {
        for (later, expected) in [(15, 15), (35, 30)] {
            let mock = changing_collection(30, later);
            let client = client(&mock, true);

            let result = Request::new(DEVICES, &client).get().await.unwrap();
            let got = ids(&result);
            assert_eq!(got.len(), expected, "collection changed to {later}");
            let unique: HashSet<u64> = got.iter().copied().collect();
            assert_eq!(unique.len(), got.len());
            assert!(got.iter().all(|id| *id < 30));
            assert_eq!(mock.request_count(), 3);
        }
    }

    #[tokio::test]
    async fn test_detail_response_is_returned_raw() {
        let mock =
            MockTransport::new(|_| HttpResponse::json(200, &json!({"id": 1, "name": "sw1"})));
        let client = client(&mock, true);

        let result = Request::new(DEVICES, &client).key(1).get().await.unwrap();
        assert_eq!(result, json!({"id": 1, "name": "sw1"}));
    }

    #[tokio::test]
    async fn test_get_count() {
        let mock = MockTransport::new(|_| {
            HttpResponse::json(200, &json!({
                "count": 42,
                "next": "http://nb.local/api/dcim/devices/?limit=1&offset=1&q=abcd",
                "previous": null,
                "results": [],
            }))
        });
        let client = client(&mock, false);

        let count = Request::new("http://nb.local/api/dcim/devices", &client)
            .filters(vec![param("q", "abcd")])
            .get_count()
            .await
            .unwrap();
        assert_eq!(count, 42);

        let sent = mock.last_request().unwrap();
        assert_eq!(sent.url, DEVICES);
        assert_eq!(sent.params, vec![param("q", "abcd"), param("limit", 1)]);
    }

    #[tokio::test]
    async fn test_get_version_and_openapi() {
        let mock = MockTransport::new(|req| {
            if req.url.ends_with("docs/?format=openapi") {
                HttpResponse::json(200, &json!({"openapi": "3.0.3"}))
            } else {
                HttpResponse::json(200, &json!({})).with_header("API-Version", "2.4")
            }
        });
        let client = client(&mock, false);
        let request = Request::new("http://nb.local/api", &client);

        assert_eq!(request.get_version().await.unwrap(), "2.4");
        assert_eq!(request.get_openapi().await.unwrap(), json!({"openapi": "3.0.3"}));
        assert_eq!(
            mock.last_request().unwrap().url,
            "http://nb.local/api/docs/?format=openapi"
        );
    }
}
