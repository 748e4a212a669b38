// OpenSearch tools: index management, document CRUD, search and raw requests

use crate::protocol::ToolSchema;
use crate::tools::{
    json_schema_free_object, json_schema_object, json_schema_string, parse_arguments, Tool,
    ToolTier,
};
use anyhow::Result;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use toolbelt_core::{EnvSource, Envelope};
use toolbelt_opensearch::query::{self, SearchResults};
use toolbelt_opensearch::{OpenSearchClient, OpenSearchError, OpenSearchResult};

/// A client, or the reason one could not be built.
///
/// A missing `OPENSEARCH_HOST` must not stop the other toolsets from
/// starting, so the failure is kept and reported by every call instead.
pub enum OpenSearchConnection {
    Ready(OpenSearchClient),
    Unavailable(String),
}

impl OpenSearchConnection {
    pub fn from_env(env: &dyn EnvSource) -> Self {
        match OpenSearchClient::from_env(env) {
            Ok(client) => {
                tracing::info!(url = %client.base_url(), "OpenSearch client configured");
                Self::Ready(client)
            }
            Err(e) => {
                tracing::warn!(error = %e, "OpenSearch client unavailable");
                Self::Unavailable(e.to_string())
            }
        }
    }

    fn client(&self) -> OpenSearchResult<&OpenSearchClient> {
        match self {
            Self::Ready(client) => Ok(client),
            Self::Unavailable(reason) => Err(OpenSearchError::Unavailable(reason.clone())),
        }
    }
}

/// The operations behind the OpenSearch tools. Every method returns an
/// envelope; client errors become `"<prefix>: <error>"` messages.
pub struct OpenSearchOps {
    connection: OpenSearchConnection,
}

impl OpenSearchOps {
    pub fn new(connection: OpenSearchConnection) -> Self {
        Self { connection }
    }

    pub async fn create_index(&self, index_name: &str, mapping: Option<&Value>) -> Envelope {
        let result: OpenSearchResult<Envelope> = async {
            let client = self.connection.client()?;
            if client.index_exists(index_name).await? {
                return Ok(Envelope::error(format!("Index '{}' already exists.", index_name)));
            }

            let empty = json!({});
            let body = match mapping {
                Some(mapping) if !mapping.is_null() => mapping,
                _ => &empty,
            };
            let response = client.create_index(index_name, body).await?;

            Ok(Envelope::success()
                .with("result", format!("Index '{}' created successfully.", index_name))
                .with("response", response))
        }
        .await;

        result.unwrap_or_else(|e| Envelope::failure("Failed to create index", e))
    }

    pub async fn index_document(
        &self,
        index_name: &str,
        document: &Value,
        doc_id: Option<&str>,
    ) -> Envelope {
        let result: OpenSearchResult<Envelope> = async {
            require_object("document", document)?;
            let client = self.connection.client()?;
            if !client.index_exists(index_name).await? {
                return Ok(missing_index(index_name));
            }

            // Refresh so the document is searchable straight away
            let doc_id = doc_id.filter(|id| !id.is_empty());
            let response = client.index_document(index_name, document, doc_id, true).await?;

            Ok(Envelope::success()
                .with("result", "Document indexed successfully.")
                .with("response", response))
        }
        .await;

        result.unwrap_or_else(|e| Envelope::failure("Failed to index document", e))
    }

    pub async fn search_documents(&self, index_name: &str, query: &Value) -> Envelope {
        let result: OpenSearchResult<Envelope> = async {
            require_object("query", query)?;
            let client = self.connection.client()?;
            if !client.index_exists(index_name).await? {
                return Ok(missing_index(index_name));
            }

            let response = client.search(index_name, query).await?;
            let SearchResults { total_hits, results } = SearchResults::from_response(&response);

            Ok(Envelope::success()
                .with("total_hits", total_hits)
                .with("results", serde_json::to_value(results)?))
        }
        .await;

        result.unwrap_or_else(|e| Envelope::failure("Search failed", e))
    }

    pub async fn simple_search(&self, index_name: &str, query_string: &str) -> Envelope {
        self.search_documents(index_name, &query::multi_match(query_string))
            .await
    }

    pub async fn delete_document(&self, index_name: &str, doc_id: &str) -> Envelope {
        let result: OpenSearchResult<Envelope> = async {
            let client = self.connection.client()?;
            if !client.index_exists(index_name).await? {
                return Ok(missing_index(index_name));
            }
            if !client.document_exists(index_name, doc_id).await? {
                return Ok(Envelope::error(format!(
                    "Document with ID '{}' does not exist in index '{}'.",
                    doc_id, index_name
                )));
            }

            let response = client.delete_document(index_name, doc_id, true).await?;

            Ok(Envelope::success()
                .with("result", format!("Document with ID '{}' deleted successfully.", doc_id))
                .with("response", response))
        }
        .await;

        result.unwrap_or_else(|e| Envelope::failure("Failed to delete document", e))
    }

    pub async fn request(&self, method: &str, path: &str, body: Option<&Value>) -> Envelope {
        let result: OpenSearchResult<Envelope> = async {
            let client = self.connection.client()?;
            let body = body.filter(|b| !b.is_null());
            let response = client.perform_request(method, path, body).await?;
            Ok(Envelope::success().with("response", response))
        }
        .await;

        result.unwrap_or_else(|e| Envelope::failure("API request failed", e))
    }
}

fn missing_index(index_name: &str) -> Envelope {
    Envelope::error(format!("Index '{}' does not exist.", index_name))
}

fn require_object(what: &str, value: &Value) -> OpenSearchResult<()> {
    if value.is_object() {
        Ok(())
    } else {
        Err(OpenSearchError::InvalidInput(format!("{} must be a JSON object", what)))
    }
}

/// All OpenSearch tools sharing one connection.
pub fn opensearch_tools(connection: OpenSearchConnection) -> Vec<Arc<dyn Tool>> {
    let ops = Arc::new(OpenSearchOps::new(connection));
    vec![
        Arc::new(CreateIndexTool(ops.clone())),
        Arc::new(IndexDocumentTool(ops.clone())),
        Arc::new(SearchDocumentsTool(ops.clone())),
        Arc::new(SimpleSearchTool(ops.clone())),
        Arc::new(DeleteDocumentTool(ops.clone())),
        Arc::new(OpenSearchRequestTool(ops)),
    ]
}

fn index_name_schema() -> Value {
    json_schema_string("Name of the OpenSearch index")
}

pub struct CreateIndexTool(Arc<OpenSearchOps>);

#[derive(Debug, Deserialize)]
struct CreateIndexArgs {
    index_name: String,
    #[serde(default)]
    mapping: Option<Value>,
}

#[async_trait::async_trait]
impl Tool for CreateIndexTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "create_index".to_string(),
            description: "Create an OpenSearch index, optionally with settings and mappings".to_string(),
            input_schema: json_schema_object(
                json!({
                    "index_name": index_name_schema(),
                    "mapping": json_schema_free_object("Index body with settings/mappings (optional)")
                }),
                vec!["index_name"],
            ),
        }
    }

    async fn execute(&self, arguments: Value) -> Result<Envelope> {
        let args: CreateIndexArgs = parse_arguments("create_index", arguments)?;
        Ok(self.0.create_index(&args.index_name, args.mapping.as_ref()).await)
    }

    fn tier(&self) -> ToolTier {
        ToolTier::Tier1
    }
}

pub struct IndexDocumentTool(Arc<OpenSearchOps>);

#[derive(Debug, Deserialize)]
struct IndexDocumentArgs {
    index_name: String,
    document: Value,
    #[serde(default)]
    doc_id: Option<String>,
}

#[async_trait::async_trait]
impl Tool for IndexDocumentTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "index_document".to_string(),
            description: "Add a document to an existing index; the id is generated when omitted".to_string(),
            input_schema: json_schema_object(
                json!({
                    "index_name": index_name_schema(),
                    "document": json_schema_free_object("The document to index"),
                    "doc_id": json_schema_string("Document id (optional)")
                }),
                vec!["index_name", "document"],
            ),
        }
    }

    async fn execute(&self, arguments: Value) -> Result<Envelope> {
        let args: IndexDocumentArgs = parse_arguments("index_document", arguments)?;
        Ok(self
            .0
            .index_document(&args.index_name, &args.document, args.doc_id.as_deref())
            .await)
    }

    fn tier(&self) -> ToolTier {
        ToolTier::Tier1
    }
}

pub struct SearchDocumentsTool(Arc<OpenSearchOps>);

#[derive(Debug, Deserialize)]
struct SearchDocumentsArgs {
    index_name: String,
    query: Value,
}

#[async_trait::async_trait]
impl Tool for SearchDocumentsTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "search_documents".to_string(),
            description: "Search an index with an OpenSearch query DSL body".to_string(),
            input_schema: json_schema_object(
                json!({
                    "index_name": index_name_schema(),
                    "query": json_schema_free_object("Query DSL, e.g. {\"query\": {\"match_all\": {}}}")
                }),
                vec!["index_name", "query"],
            ),
        }
    }

    async fn execute(&self, arguments: Value) -> Result<Envelope> {
        let args: SearchDocumentsArgs = parse_arguments("search_documents", arguments)?;
        Ok(self.0.search_documents(&args.index_name, &args.query).await)
    }
}

pub struct SimpleSearchTool(Arc<OpenSearchOps>);

#[derive(Debug, Deserialize)]
struct SimpleSearchArgs {
    index_name: String,
    query_string: String,
}

#[async_trait::async_trait]
impl Tool for SimpleSearchTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "simple_search".to_string(),
            description: "Fuzzy full-text search across all fields of an index".to_string(),
            input_schema: json_schema_object(
                json!({
                    "index_name": index_name_schema(),
                    "query_string": json_schema_string("Free text to search for")
                }),
                vec!["index_name", "query_string"],
            ),
        }
    }

    async fn execute(&self, arguments: Value) -> Result<Envelope> {
        let args: SimpleSearchArgs = parse_arguments("simple_search", arguments)?;
        Ok(self.0.simple_search(&args.index_name, &args.query_string).await)
    }
}

pub struct DeleteDocumentTool(Arc<OpenSearchOps>);

#[derive(Debug, Deserialize)]
struct DeleteDocumentArgs {
    index_name: String,
    doc_id: String,
}

#[async_trait::async_trait]
impl Tool for DeleteDocumentTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "delete_document".to_string(),
            description: "Delete a document by id".to_string(),
            input_schema: json_schema_object(
                json!({
                    "index_name": index_name_schema(),
                    "doc_id": json_schema_string("Id of the document to delete")
                }),
                vec!["index_name", "doc_id"],
            ),
        }
    }

    async fn execute(&self, arguments: Value) -> Result<Envelope> {
        let args: DeleteDocumentArgs = parse_arguments("delete_document", arguments)?;
        Ok(self.0.delete_document(&args.index_name, &args.doc_id).await)
    }

    fn tier(&self) -> ToolTier {
        ToolTier::Tier1
    }
}

pub struct OpenSearchRequestTool(Arc<OpenSearchOps>);

#[derive(Debug, Deserialize)]
struct OpenSearchRequestArgs {
    method: String,
    path: String,
    #[serde(default)]
    body: Option<Value>,
}

#[async_trait::async_trait]
impl Tool for OpenSearchRequestTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "opensearch_request".to_string(),
            description: "Send a raw request to the OpenSearch REST API".to_string(),
            input_schema: json_schema_object(
                json!({
                    "method": {
                        "type": "string",
                        "enum": ["GET", "POST", "PUT", "DELETE", "HEAD", "PATCH"],
                        "description": "HTTP method"
                    },
                    "path": json_schema_string("Path relative to the cluster root, e.g. /_cat/indices?format=json"),
                    "body": json_schema_free_object("JSON request body (optional)")
                }),
                vec!["method", "path"],
            ),
        }
    }

    async fn execute(&self, arguments: Value) -> Result<Envelope> {
        let args: OpenSearchRequestArgs = parse_arguments("opensearch_request", arguments)?;
        Ok(self.0.request(&args.method, &args.path, args.body.as_ref()).await)
    }

    fn tier(&self) -> ToolTier {
        ToolTier::Tier2
    }
}
