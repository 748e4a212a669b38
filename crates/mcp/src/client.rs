// MCP client over newline-delimited JSON-RPC (child process stdio)

use crate::protocol::{
    CallToolParams, CallToolResult, ClientCapabilities, Implementation, InitializeParams,
    InitializeResult, JsonRpcError, JsonRpcMessage, JsonRpcRequest, ListToolsResult, ToolSchema,
    MAX_LINE_LENGTH, PROTOCOL_VERSION,
};
use futures::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::pin::Pin;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec, LinesCodecError};

type Reader = FramedRead<Pin<Box<dyn AsyncRead + Send>>, LinesCodec>;
type Writer = FramedWrite<Pin<Box<dyn AsyncWrite + Send>>, LinesCodec>;

#[derive(Debug, thiserror::Error)]
pub enum McpClientError {
    #[error("Failed to launch MCP server '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Transport error: {0}")]
    Transport(#[from] LinesCodecError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Server returned an error: {0}")]
    Rpc(JsonRpcError),

    #[error("MCP server closed the connection")]
    Closed,

    #[error("Response to {method} carried no result")]
    EmptyResult { method: String },
}

pub type McpClientResult<T> = Result<T, McpClientError>;

/// How to launch a stdio MCP server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerCommand {
    pub command: String,
    pub args: Vec<String>,
    /// Environment for the child. Nothing else is inherited except `PATH`.
    pub env: BTreeMap<String, String>,
}

impl ServerCommand {
    /// Shell-style rendering, values of `env` omitted.
    pub fn display(&self) -> String {
        std::iter::once(self.command.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

struct Connection {
    reader: Reader,
    writer: Writer,
}

/// One connection to an MCP server. Requests are serialized: each call
/// holds the connection until its response arrives.
pub struct McpClient {
    connection: Mutex<Connection>,
    next_id: AtomicU64,
    // Keeps the child alive (and killed on drop) for spawned servers
    _child: Option<Child>,
}

impl McpClient {
    /// Talk to a server over an arbitrary byte stream pair.
    pub fn connect<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + 'static,
        W: AsyncWrite + Send + 'static,
    {
        let reader: Pin<Box<dyn AsyncRead + Send>> = Box::pin(reader);
        let writer: Pin<Box<dyn AsyncWrite + Send>> = Box::pin(writer);
        Self {
            connection: Mutex::new(Connection {
                reader: FramedRead::new(reader, LinesCodec::new_with_max_length(MAX_LINE_LENGTH)),
                writer: FramedWrite::new(writer, LinesCodec::new()),
            }),
            next_id: AtomicU64::new(1),
            _child: None,
        }
    }

    /// Launch `server` as a child process and talk to it over stdio.
    pub fn spawn(server: &ServerCommand) -> McpClientResult<Self> {
        let mut cmd = Command::new(&server.command);
        cmd.args(&server.args)
            .env_clear()
            .envs(&server.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        if let Ok(path) = std::env::var("PATH") {
            cmd.env("PATH", path);
        }

        let spawn_error = |source| McpClientError::Spawn {
            command: server.command.clone(),
            source,
        };
        let mut child = cmd.spawn().map_err(spawn_error)?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            return Err(spawn_error(std::io::Error::other("child stdio was not captured")));
        };

        tracing::info!(command = %server.display(), "Launched MCP server");
        let mut client = Self::connect(stdout, stdin);
        client._child = Some(child);
        Ok(client)
    }

    /// Send a request and wait for the matching response.
    pub async fn request(&self, method: &str, params: Option<Value>) -> McpClientResult<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = JsonRpcRequest::new(id, method, params);

        let mut conn = self.connection.lock().await;
        conn.writer.send(serde_json::to_string(&request)?).await?;
        tracing::debug!(id, method, "Sent MCP request");

        while let Some(line) = conn.reader.next().await {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            match serde_json::from_str::<JsonRpcMessage>(&line) {
                Ok(JsonRpcMessage::Response(response)) if response.id == json!(id) => {
                    if let Some(error) = response.error {
                        return Err(McpClientError::Rpc(error));
                    }
                    return response.result.ok_or_else(|| McpClientError::EmptyResult {
                        method: method.to_string(),
                    });
                }
                Ok(JsonRpcMessage::Response(response)) => {
                    tracing::debug!(id = %response.id, "Ignoring response to another request");
                }
                Ok(JsonRpcMessage::Request(incoming)) => {
                    tracing::debug!(method = %incoming.method, "Ignoring server-initiated message");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Ignoring unparseable line from MCP server");
                }
            }
        }

        Err(McpClientError::Closed)
    }

    async fn request_as<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> McpClientResult<T> {
        let value = self.request(method, params).await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn notify(&self, method: &str, params: Option<Value>) -> McpClientResult<()> {
        let notification = JsonRpcRequest::notification(method, params);
        let mut conn = self.connection.lock().await;
        conn.writer.send(serde_json::to_string(&notification)?).await?;
        Ok(())
    }

    /// Handshake: `initialize` followed by `notifications/initialized`.
    pub async fn initialize(&self) -> McpClientResult<InitializeResult> {
        let params = InitializeParams {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: ClientCapabilities::default(),
            client_info: Implementation::toolbelt(),
        };

        let result: InitializeResult = self
            .request_as("initialize", Some(serde_json::to_value(params)?))
            .await?;
        tracing::info!(
            server = %result.server_info.name,
            version = %result.server_info.version,
            protocol = %result.protocol_version,
            "MCP server initialized"
        );

        self.notify("notifications/initialized", None).await?;
        Ok(result)
    }

    /// All tools, following `nextCursor` pages.
    pub async fn list_tools(&self) -> McpClientResult<Vec<ToolSchema>> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let params = cursor.as_ref().map(|c| json!({ "cursor": c }));
            let page: ListToolsResult = self.request_as("tools/list", params).await?;
            tools.extend(page.tools);

            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }

        Ok(tools)
    }

    pub async fn call_tool(&self, name: &str, arguments: Value) -> McpClientResult<CallToolResult> {
        let params = CallToolParams {
            name: name.to_string(),
            arguments,
        };
        self.request_as("tools/call", Some(serde_json::to_value(params)?))
            .await
    }
}
