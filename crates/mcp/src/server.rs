// MCP server: JSON-RPC 2.0, one message per line over stdio

use crate::protocol::{
    CallToolParams, CallToolResult, Implementation, InitializeResult, JsonRpcError,
    JsonRpcRequest, JsonRpcResponse, ListToolsResult, ServerCapabilities, ToolsCapability,
    MAX_LINE_LENGTH, PROTOCOL_VERSION,
};
use crate::tools::ToolRegistry;
use anyhow::{Context, Result};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{
    AnyDelimiterCodec, AnyDelimiterCodecError, FramedRead, FramedWrite, LinesCodec,
};

pub struct McpServer {
    registry: ToolRegistry,
    max_line_length: usize,
}

impl McpServer {
    pub fn new(registry: ToolRegistry) -> Self {
        Self {
            registry,
            max_line_length: MAX_LINE_LENGTH,
        }
    }

    pub fn with_max_line_length(mut self, max_line_length: usize) -> Self {
        self.max_line_length = max_line_length;
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Serve on the process's stdin/stdout until stdin closes.
    pub async fn start(&self) -> Result<()> {
        tracing::info!(tools = self.registry.len(), "MCP server listening on stdio");
        self.serve(tokio::io::stdin(), tokio::io::stdout()).await
    }

    /// Serve requests read from `reader`, writing responses to `writer`.
    /// Returns when the reader reaches end of input.
    ///
    /// Lines that are not UTF-8 or exceed the length limit are answered
    /// with a parse error; the connection stays open.
    pub async fn serve<R, W>(&self, reader: R, writer: W) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let newline = b"\n".to_vec();
        let codec =
            AnyDelimiterCodec::new_with_max_length(newline.clone(), newline, self.max_line_length);
        let mut frames = FramedRead::new(reader, codec);
        let mut out = FramedWrite::new(writer, LinesCodec::new());
        let mut resume_after_error = false;

        loop {
            let frame = match frames.next().await {
                Some(Ok(frame)) => frame,
                Some(Err(AnyDelimiterCodecError::MaxChunkLengthExceeded)) => {
                    tracing::warn!(limit = self.max_line_length, "MCP message too long");
                    send(&mut out, &parse_error()).await?;
                    resume_after_error = true;
                    continue;
                }
                Some(Err(e)) => return Err(e).context("Failed to read from MCP client"),
                // FramedRead yields one `None` after a decode error; the
                // reader itself is still open
                None if std::mem::take(&mut resume_after_error) => continue,
                None => break,
            };

            let line = match std::str::from_utf8(&frame) {
                Ok(line) => line,
                Err(e) => {
                    tracing::warn!(error = %e, "MCP message is not valid UTF-8");
                    send(&mut out, &parse_error()).await?;
                    continue;
                }
            };
            if line.trim().is_empty() {
                continue;
            }

            if let Some(response) = self.handle_line(line).await {
                send(&mut out, &response).await?;
            }
        }

        tracing::info!("MCP client disconnected");
        Ok(())
    }

    /// Handle one raw line. Notifications produce no response.
    pub async fn handle_line(&self, line: &str) -> Option<JsonRpcResponse> {
        let value: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, "Unparseable JSON-RPC message");
                return Some(parse_error());
            }
        };

        let id = value.get("id").cloned();
        match serde_json::from_value::<JsonRpcRequest>(value) {
            Ok(request) => self.handle_request(request).await,
            Err(e) => {
                tracing::warn!(error = %e, "Malformed JSON-RPC request");
                Some(JsonRpcResponse::error(
                    id.unwrap_or(Value::Null),
                    JsonRpcError::invalid_request(),
                ))
            }
        }
    }

    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let Some(id) = request.id.clone() else {
            self.handle_notification(&request);
            return None;
        };

        tracing::debug!(method = %request.method, id = %id, "Handling MCP request");
        let response = match self.dispatch(&request.method, request.params).await {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(error) => {
                tracing::warn!(method = %request.method, error = %error, "MCP request failed");
                JsonRpcResponse::error(id, error)
            }
        };
        Some(response)
    }

    fn handle_notification(&self, request: &JsonRpcRequest) {
        match request.method.as_str() {
            "notifications/initialized" => tracing::info!("MCP client initialized"),
            other => tracing::debug!(method = %other, "Ignoring notification"),
        }
    }

    async fn dispatch(&self, method: &str, params: Option<Value>) -> Result<Value, JsonRpcError> {
        match method {
            "initialize" => {
                if let Some(client) = params.as_ref().and_then(|p| p.get("clientInfo")) {
                    tracing::info!(client = %client, "MCP client connecting");
                }
                to_result(&InitializeResult {
                    protocol_version: PROTOCOL_VERSION.to_string(),
                    capabilities: ServerCapabilities {
                        tools: Some(ToolsCapability {
                            list_changed: false,
                        }),
                        ..Default::default()
                    },
                    server_info: Implementation::toolbelt(),
                })
            }
            "ping" => Ok(json!({})),
            "tools/list" => to_result(&ListToolsResult {
                tools: self.registry.list_schemas(),
                next_cursor: None,
            }),
            "tools/call" => {
                let params: CallToolParams = params
                    .ok_or_else(|| JsonRpcError::invalid_params("Missing params for tools/call"))
                    .and_then(|p| {
                        serde_json::from_value(p).map_err(|e| {
                            JsonRpcError::invalid_params(format!("Invalid tools/call params: {}", e))
                        })
                    })?;

                let envelope = self.registry.call(&params.name, params.arguments).await;
                to_result(&CallToolResult::from(&envelope))
            }
            other => Err(JsonRpcError::method_not_found(other)),
        }
    }
}

fn parse_error() -> JsonRpcResponse {
    JsonRpcResponse::error(Value::Null, JsonRpcError::parse_error())
}

async fn send<W>(out: &mut FramedWrite<W, LinesCodec>, response: &JsonRpcResponse) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let encoded = serde_json::to_string(response)?;
    out.send(encoded)
        .await
        .context("Failed to write MCP response")
}

fn to_result<T: serde::Serialize>(value: &T) -> Result<Value, JsonRpcError> {
    serde_json::to_value(value).map_err(|e| JsonRpcError::internal_error(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{CurrentTimeTool, WeatherTool};
    use std::sync::Arc;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

    fn server() -> McpServer {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(WeatherTool));
        registry.register(Arc::new(CurrentTimeTool::new()));
        McpServer::new(registry)
    }

    async fn respond(server: &McpServer, line: &str) -> Value {
        let response = server.handle_line(line).await.expect("response expected");
        serde_json::to_value(response).unwrap()
    }

    #[tokio::test]
    async fn test_initialize() {
        let response = respond(
            &server(),
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2024-11-05","capabilities":{},"clientInfo":{"name":"test","version":"0"}}}"#,
        )
        .await;

        assert_eq!(response["id"], json!(1));
        assert_eq!(response["result"]["protocolVersion"], json!(PROTOCOL_VERSION));
        assert_eq!(response["result"]["serverInfo"]["name"], json!("toolbelt"));
        assert!(response["result"]["capabilities"]["tools"].is_object());
    }

    #[tokio::test]
    async fn test_tools_list() {
        let response = respond(&server(), r#"{"jsonrpc":"2.0","id":"a","method":"tools/list"}"#).await;

        let names: Vec<_> = response["result"]["tools"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["get_current_time", "get_weather"]);
        assert!(response["result"]["tools"][0]["inputSchema"].is_object());
    }

    #[tokio::test]
    async fn test_tools_call_success() {
        let response = respond(
            &server(),
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/call","params":{"name":"get_weather","arguments":{"city":"New York"}}}"#,
        )
        .await;

        let result = &response["result"];
        assert!(result.get("isError").is_none());
        let text = result["content"][0]["text"].as_str().unwrap();
        let envelope: Value = serde_json::from_str(text).unwrap();
        assert_eq!(envelope["status"], json!("success"));
        assert!(envelope["report"].as_str().unwrap().contains("sunny"));
    }

    #[tokio::test]
    async fn test_tools_call_error_envelope() {
        let response = respond(
            &server(),
            r#"{"jsonrpc":"2.0","id":3,"method":"tools/call","params":{"name":"nope","arguments":{}}}"#,
        )
        .await;

        assert_eq!(response["result"]["isError"], json!(true));
        let text = response["result"]["content"][0]["text"].as_str().unwrap();
        assert!(text.contains("Unknown tool: nope"));
    }

    #[tokio::test]
    async fn test_error_codes() {
        let server = server();

        let response = respond(&server, "{not json").await;
        assert_eq!(response["error"]["code"], json!(-32700));
        assert_eq!(response["id"], Value::Null);

        let response = respond(&server, r#"{"jsonrpc":"2.0","id":4,"method":"prompts/list"}"#).await;
        assert_eq!(response["error"]["code"], json!(-32601));

        let response = respond(&server, r#"{"jsonrpc":"2.0","id":5,"method":"tools/call"}"#).await;
        assert_eq!(response["error"]["code"], json!(-32602));

        let response = respond(&server, r#"{"jsonrpc":"2.0","id":6}"#).await;
        assert_eq!(response["error"]["code"], json!(-32600));
        assert_eq!(response["id"], json!(6));
    }

    #[tokio::test]
    async fn test_notifications_get_no_response() {
        let server = server();
        assert!(server
            .handle_line(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
            .await
            .is_none());
        assert!(server
            .handle_line(r#"{"jsonrpc":"2.0","method":"notifications/cancelled","params":{}}"#)
            .await
            .is_none());
    }

    /// Write `input` to a running server and collect the responses it sends
    /// before the input closes.
    async fn exchange(server: McpServer, input: &[u8]) -> Vec<Value> {
        let (client, server_side) = tokio::io::duplex(1 << 16);
        let (server_read, server_write) = tokio::io::split(server_side);
        let handle = tokio::spawn(async move { server.serve(server_read, server_write).await });

        let (client_read, mut client_write) = tokio::io::split(client);
        client_write.write_all(input).await.unwrap();
        client_write.shutdown().await.unwrap();

        let mut responses = Vec::new();
        let mut lines = BufReader::new(client_read).lines();
        while let Some(line) = lines.next_line().await.unwrap() {
            responses.push(serde_json::from_str(&line).unwrap());
        }
        handle.await.unwrap().unwrap();
        responses
    }

    #[tokio::test]
    async fn test_invalid_utf8_gets_parse_error_and_serving_continues() {
        let mut input = b"{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"\xff\"}\n".to_vec();
        input.extend_from_slice(b"{\"jsonrpc\":\"2.0\",\"id\":2,\"method\":\"ping\"}\n");

        let responses = exchange(server(), &input).await;
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0]["error"]["code"], json!(-32700));
        assert_eq!(responses[0]["id"], Value::Null);
        assert_eq!(responses[1], json!({"jsonrpc": "2.0", "id": 2, "result": {}}));
    }

    #[tokio::test]
    async fn test_oversized_line_gets_parse_error_and_serving_continues() {
        let mut input = format!("{{\"padding\":\"{}\"}}\n", "x".repeat(256)).into_bytes();
        input.extend_from_slice(b"{\"jsonrpc\":\"2.0\",\"id\":3,\"method\":\"ping\"}\n");

        let responses = exchange(server().with_max_line_length(128), &input).await;
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0]["error"]["code"], json!(-32700));
        assert_eq!(responses[1]["id"], json!(3));
        assert_eq!(responses[1]["result"], json!({}));
    }

    #[tokio::test]
    async fn test_serve_over_stream() {
        let (client, server_side) = tokio::io::duplex(4096);
        let (server_read, server_write) = tokio::io::split(server_side);
        let handle = tokio::spawn(async move { server().serve(server_read, server_write).await });

        let (client_read, mut client_write) = tokio::io::split(client);
        client_write
            .write_all(b"{\"jsonrpc\":\"2.0\",\"method\":\"notifications/initialized\"}\n\n{\"jsonrpc\":\"2.0\",\"id\":7,\"method\":\"ping\"}\n")
            .await
            .unwrap();

        let mut lines = BufReader::new(client_read).lines();
        let line = lines.next_line().await.unwrap().unwrap();
        let response: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(response, json!({"jsonrpc": "2.0", "id": 7, "result": {}}));

        drop(client_write);
        drop(lines);
        handle.await.unwrap().unwrap();
    }
}
