//! HTTP transport
//!
//! Requests and responses cross the [`Transport`] seam as plain data so the
//! query layer can be exercised against [`crate::mock::MockTransport`] in
//! unit tests. [`HttpClient`] is the reqwest-backed implementation.

use crate::config::ClientConfig;
use crate::error::Result;
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use std::fmt;
use tracing::debug;

/// HTTP verbs used by the Nautobot API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Options,
}

impl HttpMethod {
    /// Verb as sent on the wire
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Options => "OPTIONS",
        }
    }

    fn to_reqwest(self) -> Method {
        match self {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Patch => Method::PATCH,
            HttpMethod::Delete => Method::DELETE,
            HttpMethod::Options => Method::OPTIONS,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An outgoing request described as data
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    /// Absolute URL, possibly already carrying a query string (`next` links)
    pub url: String,
    /// Query parameters appended to `url`
    pub params: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl HttpRequest {
    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// First value of a query parameter
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// `url` with `params` encoded into its query string
    pub fn full_url(&self) -> String {
        if self.params.is_empty() {
            return self.url.clone();
        }
        let separator = if self.url.contains('?') { '&' } else { '?' };
        format!("{}{}{}", self.url, separator, build_query_string(&self.params))
    }
}

/// A received response described as data
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub reason: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    /// Response with a raw text body
    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            reason: reason_phrase(status),
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// Response with a JSON body
    pub fn json(status: u16, body: &Value) -> Self {
        Self::text(status, body.to_string())
            .with_header("Content-Type", "application/json")
    }

    /// Empty 204 response
    pub fn no_content() -> Self {
        Self::text(204, "")
    }

    /// Add a response header
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// 2xx status
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Something that can carry an [`HttpRequest`] to the server
///
/// Implementations must be safe to share across concurrent calls; headers
/// travel with each request rather than living on the transport.
#[async_trait::async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    /// Send the request and return whatever the server answered.
    ///
    /// Only failures to obtain a response are errors here; status codes are
    /// interpreted by the caller.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// reqwest-backed transport
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Wrap an existing reqwest client (custom TLS, proxies, retries...)
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client honouring the configured timeout
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self::new(client))
    }

    /// Get the underlying HTTP client
    pub fn client(&self) -> &Client {
        &self.client
    }
}

#[async_trait::async_trait]
impl Transport for HttpClient {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let url = request.full_url();
        debug!("{} {}", request.method, url);

        let mut builder = self.client.request(request.method.to_reqwest(), &url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
            .collect();
        let body = response.text().await?;

        Ok(HttpResponse {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body,
        })
    }
}

/// Build query string from filters
pub fn build_query_string(params: &[(String, String)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

fn reason_phrase(status: u16) -> String {
    StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(url: &str, params: &[(&str, &str)]) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Get,
            url: url.to_string(),
            params: params.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            headers: vec![("Accept".to_string(), "application/json".to_string())],
            body: None,
        }
    }

    #[test]
    fn test_full_url_encodes_params() {
        let req = request(
            "http://nb/api/dcim/devices/",
            &[("name", "sw 1"), ("role", "leaf&spine")],
        );
        assert_eq!(
            req.full_url(),
            "http://nb/api/dcim/devices/?name=sw%201&role=leaf%26spine"
        );
    }

    #[test]
    fn test_full_url_appends_to_existing_query() {
        let req = request("http://nb/api/dcim/devices/?limit=50&offset=50", &[("q", "a")]);
        assert_eq!(req.full_url(), "http://nb/api/dcim/devices/?limit=50&offset=50&q=a");
        assert_eq!(request("http://nb/api/", &[]).full_url(), "http://nb/api/");
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let req = request("http://nb/api/", &[]);
        assert_eq!(req.header("accept"), Some("application/json"));
        let resp = HttpResponse::json(200, &json!({})).with_header("API-Version", "2.4");
        assert_eq!(resp.header("api-version"), Some("2.4"));
    }

    #[test]
    fn test_response_helpers() {
        let resp = HttpResponse::json(201, &json!({"id": 1}));
        assert!(resp.is_success());
        assert_eq!(resp.reason, "Created");
        assert_eq!(resp.body, r#"{"id":1}"#);

        let resp = HttpResponse::no_content();
        assert_eq!(resp.status, 204);
        assert!(resp.body.is_empty());
        assert!(!HttpResponse::text(404, "").is_success());
    }
}
