//! Nautobot client errors

use serde_json::Value;
use thiserror::Error;

/// Result alias used throughout the client
pub type Result<T> = std::result::Result<T, NautobotError>;

/// Errors that can occur when interacting with the Nautobot API
#[derive(Debug, Error)]
pub enum NautobotError {
    /// The server answered with a non-2xx status
    ///
    /// `body` holds the decoded JSON error body when the server sent one.
    #[error("{message}")]
    Request {
        status: u16,
        reason: String,
        url: String,
        body: Option<Value>,
        message: String,
    },

    /// The HTTP client gave up before a response arrived (connect error,
    /// timeout, retry budget exhausted)
    #[error("Request to Nautobot failed: {0}")]
    RequestFromException(#[from] reqwest::Error),

    /// A POST returned 204: nothing left to allocate
    #[error("The requested allocation could not be fulfilled.")]
    Allocation { url: String },

    /// 2xx response whose body is not JSON
    #[error("The server returned invalid (non-json) data. Maybe not a Nautobot server?")]
    Content { url: String },

    /// Invalid call detected before any request was sent
    #[error("Invalid request: {0}")]
    Validation(String),

    /// Record has no such field, even after fetching its full details
    #[error("object has no attribute \"{0}\"")]
    Attribute(String),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid client configuration
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl NautobotError {
    /// Build a `Request` error from a failed response
    pub(crate) fn from_response(status: u16, reason: &str, url: &str, text: &str) -> Self {
        let body = serde_json::from_str::<Value>(text).ok();
        let message = if status == 404 {
            format!("The requested url: {url} could not be found.")
        } else if let Some(json) = &body {
            format!("The request failed with code {status} {reason}: {json}")
        } else {
            format!(
                "The request failed with code {status} {reason} but more specific \
                 details were not returned in json. Check the Nautobot Logs \
                 or investigate this exception's error attribute."
            )
        };

        NautobotError::Request {
            status,
            reason: reason.to_string(),
            url: url.to_string(),
            body,
            message,
        }
    }

    /// HTTP status carried by a `Request` error
    pub fn status(&self) -> Option<u16> {
        match self {
            NautobotError::Request { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True when the server reported 404
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_error_with_json_body() {
        let err = NautobotError::from_response(
            400,
            "Bad Request",
            "http://nb/api/dcim/devices/",
            r#"{"name": ["This field is required."]}"#,
        );
        assert_eq!(err.status(), Some(400));
        match &err {
            NautobotError::Request { body, .. } => {
                assert_eq!(body.as_ref(), Some(&json!({"name": ["This field is required."]})));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().starts_with("The request failed with code 400 Bad Request:"));
    }

    #[test]
    fn test_request_error_without_json_body() {
        let err =
            NautobotError::from_response(500, "Internal Server Error", "http://nb/api/", "<html>");
        assert!(err.to_string().contains("were not returned in json"));
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_not_found_message() {
        let err = NautobotError::from_response(404, "Not Found", "http://nb/api/dcim/sites/1/", "");
        assert!(err.is_not_found());
        assert_eq!(
            err.to_string(),
            "The requested url: http://nb/api/dcim/sites/1/ could not be found."
        );
    }
}
