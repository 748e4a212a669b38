//! Error types for the OpenSearch client.

use serde::Deserialize;
use toolbelt_core::EnvError;

/// Result type for client operations.
pub type OpenSearchResult<T> = Result<T, OpenSearchError>;

#[derive(Debug, thiserror::Error)]
pub enum OpenSearchError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The cluster returned an error response.
    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// Connection settings missing from the environment.
    #[error(transparent)]
    Env(#[from] EnvError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// No client could be built; carries the underlying reason.
    #[error("{0}")]
    Unavailable(String),
}

impl OpenSearchError {
    /// Build an API error from a status code and response body.
    ///
    /// OpenSearch reports failures as `{"error": {"type", "reason"}, "status"}`;
    /// some endpoints use a plain string for `error`. Anything else is kept
    /// verbatim.
    pub fn from_response(status: u16, body: &str) -> Self {
        let message = match serde_json::from_str::<ErrorResponse>(body) {
            Ok(ErrorResponse {
                error: ErrorBody::Detailed { error_type, reason },
            }) => match reason {
                Some(reason) => format!("{}: {}", error_type, reason),
                None => error_type,
            },
            Ok(ErrorResponse {
                error: ErrorBody::Plain(message),
            }) => message,
            Err(_) if body.trim().is_empty() => "empty response body".to_string(),
            Err(_) => body.to_string(),
        };

        Self::Api { status, message }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorBody {
    Detailed {
        #[serde(rename = "type")]
        error_type: String,
        reason: Option<String>,
    },
    Plain(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_detailed_response() {
        let body = r#"{"error":{"type":"resource_already_exists_exception","reason":"index [docs/abc] already exists"},"status":400}"#;
        let err = OpenSearchError::from_response(400, body);

        assert_eq!(err.status(), Some(400));
        assert_eq!(
            err.to_string(),
            "API error (status 400): resource_already_exists_exception: index [docs/abc] already exists"
        );
    }

    #[test]
    fn test_from_plain_response() {
        let err = OpenSearchError::from_response(405, r#"{"error":"Incorrect HTTP method"}"#);
        assert_eq!(err.to_string(), "API error (status 405): Incorrect HTTP method");
    }

    #[test]
    fn test_from_unstructured_response() {
        let err = OpenSearchError::from_response(502, "Bad Gateway");
        assert_eq!(err.to_string(), "API error (status 502): Bad Gateway");

        let err = OpenSearchError::from_response(500, "");
        assert_eq!(err.to_string(), "API error (status 500): empty response body");
    }
}
