//! OpenSearch client.

use crate::config::ClientConfig;
use crate::error::{OpenSearchError, OpenSearchResult};
use crate::transport::HttpTransport;
use reqwest::Method;
use serde_json::Value;
use std::sync::Arc;
use toolbelt_core::EnvSource;
use url::Url;

/// Client for a single OpenSearch cluster.
#[derive(Debug, Clone)]
pub struct OpenSearchClient {
    http: HttpTransport,
}

impl OpenSearchClient {
    pub fn new(config: ClientConfig) -> OpenSearchResult<Self> {
        let http = HttpTransport::new(Arc::new(config))?;
        Ok(Self { http })
    }

    /// Build a client from `OPENSEARCH_*` environment variables.
    pub fn from_env(env: &dyn EnvSource) -> OpenSearchResult<Self> {
        Self::new(ClientConfig::from_env(env)?)
    }

    pub fn base_url(&self) -> &Url {
        &self.http.config().base_url
    }

    pub async fn cluster_health(&self) -> OpenSearchResult<Value> {
        let url = self.http.endpoint(&["_cluster", "health"])?;
        self.http.request(Method::GET, url, None).await
    }

    pub async fn index_exists(&self, index: &str) -> OpenSearchResult<bool> {
        let url = self.http.endpoint(&[check_name("index", index)?])?;
        self.http.exists(url).await
    }

    /// Create an index; `body` holds settings and mappings (may be `{}`).
    pub async fn create_index(&self, index: &str, body: &Value) -> OpenSearchResult<Value> {
        let url = self.http.endpoint(&[check_name("index", index)?])?;
        self.http.request(Method::PUT, url, Some(body)).await
    }

    /// Index a document. Without an id the cluster generates one.
    pub async fn index_document(
        &self,
        index: &str,
        document: &Value,
        id: Option<&str>,
        refresh: bool,
    ) -> OpenSearchResult<Value> {
        let index = check_name("index", index)?;
        let (method, mut url) = match id {
            Some(id) => (
                Method::PUT,
                self.http.endpoint(&[index, "_doc", check_name("document id", id)?])?,
            ),
            None => (Method::POST, self.http.endpoint(&[index, "_doc"])?),
        };
        with_refresh(&mut url, refresh);

        self.http.request(method, url, Some(document)).await
    }

    pub async fn document_exists(&self, index: &str, id: &str) -> OpenSearchResult<bool> {
        let url = self.http.endpoint(&[
            check_name("index", index)?,
            "_doc",
            check_name("document id", id)?,
        ])?;
        self.http.exists(url).await
    }

    pub async fn delete_document(&self, index: &str, id: &str, refresh: bool) -> OpenSearchResult<Value> {
        let mut url = self.http.endpoint(&[
            check_name("index", index)?,
            "_doc",
            check_name("document id", id)?,
        ])?;
        with_refresh(&mut url, refresh);

        self.http.request(Method::DELETE, url, None).await
    }

    /// Run a query DSL search against one index.
    pub async fn search(&self, index: &str, query: &Value) -> OpenSearchResult<Value> {
        let url = self.http.endpoint(&[check_name("index", index)?, "_search"])?;
        self.http.request(Method::POST, url, Some(query)).await
    }

    /// Raw passthrough: any method, any path relative to the cluster root.
    pub async fn perform_request(
        &self,
        method: &str,
        path: &str,
        body: Option<&Value>,
    ) -> OpenSearchResult<Value> {
        let method = parse_method(method)?;
        let url = self.http.build_url(path)?;
        self.http.request(method, url, body).await
    }
}

fn check_name<'a>(what: &str, value: &'a str) -> OpenSearchResult<&'a str> {
    if value.trim().is_empty() {
        return Err(OpenSearchError::InvalidInput(format!("{} must not be empty", what)));
    }
    Ok(value)
}

fn with_refresh(url: &mut Url, refresh: bool) {
    if refresh {
        url.query_pairs_mut().append_pair("refresh", "true");
    }
}

fn parse_method(method: &str) -> OpenSearchResult<Method> {
    match method.trim().to_ascii_uppercase().as_str() {
        "GET" => Ok(Method::GET),
        "POST" => Ok(Method::POST),
        "PUT" => Ok(Method::PUT),
        "DELETE" => Ok(Method::DELETE),
        "HEAD" => Ok(Method::HEAD),
        "PATCH" => Ok(Method::PATCH),
        other => Err(OpenSearchError::InvalidInput(format!(
            "Unsupported HTTP method: {}",
            other
        ))),
    }
}
