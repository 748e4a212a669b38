//! HTTP transport for the OpenSearch REST API.

use crate::config::ClientConfig;
use crate::error::{OpenSearchError, OpenSearchResult};
use reqwest::{Client, Method, Response, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// HTTP transport for making cluster requests.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    config: Arc<ClientConfig>,
}

impl HttpTransport {
    /// Create a new HTTP transport with the given configuration.
    pub fn new(config: Arc<ClientConfig>) -> OpenSearchResult<Self> {
        config.validate()?;

        let client = Client::builder()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(!config.verify_certs)
            .build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Build a URL from path segments. Each segment is percent-encoded, so
    /// document ids may contain `/` or spaces.
    pub fn endpoint(&self, segments: &[&str]) -> OpenSearchResult<Url> {
        let mut url = self.config.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| OpenSearchError::Config("Base URL cannot carry a path".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Build a URL from a raw path (which may include a query string).
    ///
    /// The result always stays on the configured cluster: absolute URLs and
    /// anything that resolves to another origin are rejected, since requests
    /// carry the cluster credentials.
    pub fn build_url(&self, path: &str) -> OpenSearchResult<Url> {
        if Url::parse(path).is_ok() || path.starts_with("//") {
            return Err(OpenSearchError::InvalidInput(format!(
                "path must be relative to the cluster root, got {}",
                path
            )));
        }

        let base = &self.config.base_url;
        let url = base.join(path.trim_start_matches('/'))?;
        if url.origin() != base.origin() {
            return Err(OpenSearchError::InvalidInput(format!(
                "path {} resolves outside the cluster",
                path
            )));
        }
        Ok(url)
    }

    /// Send a request and fail on any non-success status.
    async fn send(&self, method: Method, url: Url, body: Option<&Value>) -> OpenSearchResult<Response> {
        debug!(method = %method, url = %url, "OpenSearch request");

        let mut request = self.client.request(method, url);
        if let Some(credentials) = &self.config.credentials {
            request = request.basic_auth(&credentials.username, Some(&credentials.password));
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(OpenSearchError::from_response(status, &body))
    }

    /// Execute a request and decode the response body.
    ///
    /// JSON bodies are parsed; anything else (e.g. `_cat` output) comes back
    /// as a string, and an empty body as `null`.
    pub async fn request(&self, method: Method, url: Url, body: Option<&Value>) -> OpenSearchResult<Value> {
        let response = self.send(method, url, body).await?;
        let text = response.text().await?;

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
    }

    /// HEAD request used for existence checks: 2xx is `true`, 404 is `false`.
    pub async fn exists(&self, url: Url) -> OpenSearchResult<bool> {
        debug!(url = %url, "OpenSearch existence check");

        let mut request = self.client.head(url);
        if let Some(credentials) = &self.config.credentials {
            request = request.basic_auth(&credentials.username, Some(&credentials.password));
        }

        let response = request.send().await?;
        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(OpenSearchError::Api {
                status: status.as_u16(),
                message: status
                    .canonical_reason()
                    .unwrap_or("unexpected status")
                    .to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn create_config(base_url: &str) -> Arc<ClientConfig> {
        Arc::new(ClientConfig::new(Url::parse(base_url).unwrap()))
    }

    #[tokio::test]
    async fn test_endpoint_encodes_segments() {
        let transport = HttpTransport::new(create_config("http://localhost:9200")).unwrap();

        let url = transport.endpoint(&["docs", "_doc", "a b/c"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:9200/docs/_doc/a%20b%2Fc");
    }

    #[tokio::test]
    async fn test_build_url_keeps_query() {
        let transport = HttpTransport::new(create_config("http://localhost:9200")).unwrap();

        let url = transport.build_url("/_cat/indices?format=json").unwrap();
        assert_eq!(url.as_str(), "http://localhost:9200/_cat/indices?format=json");
    }

    #[tokio::test]
    async fn test_build_url_stays_on_cluster() {
        let transport = HttpTransport::new(create_config("http://localhost:9200")).unwrap();

        for path in [
            "http://127.0.0.1:9300/steal",
            "https://evil.example/_search",
            "//evil.example/_search",
            "\\\\evil.example/_search",
        ] {
            let err = transport.build_url(path).unwrap_err();
            assert!(
                matches!(err, OpenSearchError::InvalidInput(_)),
                "{} should be rejected, got {:?}",
                path,
                err
            );
        }
    }

    #[tokio::test]
    async fn test_rejects_non_http_scheme() {
        let result = HttpTransport::new(create_config("ftp://localhost:9200"));
        assert!(matches!(result, Err(OpenSearchError::Config(_))));
    }

    #[tokio::test]
    async fn test_request_with_json_body() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/docs/_search"))
            .and(body_json(json!({"query": {"match_all": {}}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"took": 1})))
            .mount(&server)
            .await;

        let transport = HttpTransport::new(create_config(&server.uri())).unwrap();
        let url = transport.endpoint(&["docs", "_search"]).unwrap();

        let result = transport
            .request(Method::POST, url, Some(&json!({"query": {"match_all": {}}})))
            .await
            .unwrap();
        assert_eq!(result, json!({"took": 1}));
    }

    #[tokio::test]
    async fn test_basic_auth_header() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/_cluster/health"))
            .and(header("authorization", "Basic YWRtaW46c2VjcmV0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "green"})))
            .mount(&server)
            .await;

        let config = ClientConfig::new(Url::parse(&server.uri()).unwrap())
            .with_credentials("admin", "secret");
        let transport = HttpTransport::new(Arc::new(config)).unwrap();
        let url = transport.endpoint(&["_cluster", "health"]).unwrap();

        let result = transport.request(Method::GET, url, None).await.unwrap();
        assert_eq!(result["status"], "green");
    }

    #[tokio::test]
    async fn test_plain_text_body() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/_cat/indices"))
            .respond_with(ResponseTemplate::new(200).set_body_string("green open docs\n"))
            .mount(&server)
            .await;

        let transport = HttpTransport::new(create_config(&server.uri())).unwrap();
        let url = transport.build_url("_cat/indices").unwrap();

        let result = transport.request(Method::GET, url, None).await.unwrap();
        assert_eq!(result, Value::String("green open docs\n".to_string()));
    }

    #[tokio::test]
    async fn test_error_status() {
        let server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path("/docs"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {"type": "illegal_argument_exception", "reason": "bad mapping"},
                "status": 400
            })))
            .mount(&server)
            .await;

        let transport = HttpTransport::new(create_config(&server.uri())).unwrap();
        let url = transport.endpoint(&["docs"]).unwrap();

        let result = transport.request(Method::PUT, url, Some(&json!({}))).await;
        match result {
            Err(OpenSearchError::Api { status, message }) => {
                assert_eq!(status, 400);
                assert_eq!(message, "illegal_argument_exception: bad mapping");
            }
            other => panic!("Expected Api error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_exists() {
        let server = MockServer::start().await;

        Mock::given(method("HEAD"))
            .and(path("/present"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/absent"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/forbidden"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let transport = HttpTransport::new(create_config(&server.uri())).unwrap();

        assert!(transport.exists(transport.endpoint(&["present"]).unwrap()).await.unwrap());
        assert!(!transport.exists(transport.endpoint(&["absent"]).unwrap()).await.unwrap());

        let err = transport
            .exists(transport.endpoint(&["forbidden"]).unwrap())
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(403));
    }
}
