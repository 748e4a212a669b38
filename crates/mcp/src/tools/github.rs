// GitHub MCP server launched through Docker, with its tools proxied into the registry

use crate::client::{McpClient, McpClientResult, ServerCommand};
use crate::protocol::ToolSchema;
use crate::tools::{Tool, ToolTier};
use anyhow::Result;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use toolbelt_core::{EnvSource, Envelope};

pub const TOKEN_VAR: &str = "GITHUB_PERSONAL_ACCESS_TOKEN";
pub const TOOLSETS_VAR: &str = "GITHUB_TOOLSETS";
pub const DYNAMIC_TOOLSETS_VAR: &str = "GITHUB_DYNAMIC_TOOLSETS";
pub const HOST_VAR: &str = "GITHUB_HOST";

pub const DOCKER_IMAGE: &str = "ghcr.io/github/github-mcp-server";

/// Variables forwarded into the container, in `-e` order.
const FORWARDED_VARS: [&str; 4] = [TOKEN_VAR, TOOLSETS_VAR, DYNAMIC_TOOLSETS_VAR, HOST_VAR];

/// Launch settings for the GitHub MCP server.
#[derive(Clone, PartialEq, Eq)]
pub struct GithubMcpConfig {
    pub token: Option<String>,
    pub toolsets: Option<String>,
    pub dynamic_toolsets: Option<String>,
    pub host: Option<String>,
    /// Only these remote tools are exposed, when set.
    pub tool_filter: Option<Vec<String>>,
}

impl std::fmt::Debug for GithubMcpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GithubMcpConfig")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("toolsets", &self.toolsets)
            .field("dynamic_toolsets", &self.dynamic_toolsets)
            .field("host", &self.host)
            .field("tool_filter", &self.tool_filter)
            .finish()
    }
}

impl GithubMcpConfig {
    /// Read the four `GITHUB_*` variables. A missing token is logged, not fatal.
    pub fn from_env(env: &dyn EnvSource) -> Self {
        let token = env.optional(TOKEN_VAR);
        if token.is_none() {
            tracing::warn!(
                "{} environment variable not set. The GitHub MCP Server will not be able to authenticate.",
                TOKEN_VAR
            );
        }

        Self {
            token,
            toolsets: env.optional(TOOLSETS_VAR),
            dynamic_toolsets: env.optional(DYNAMIC_TOOLSETS_VAR),
            host: env.optional(HOST_VAR),
            tool_filter: None,
        }
    }

    pub fn with_tool_filter(mut self, tools: Vec<String>) -> Self {
        self.tool_filter = Some(tools);
        self
    }

    /// `docker run -i --rm -e ... ghcr.io/github/github-mcp-server`, with a
    /// child environment holding only the variables that are set.
    pub fn server_command(&self) -> ServerCommand {
        let mut args: Vec<String> = vec!["run".into(), "-i".into(), "--rm".into()];
        for var in FORWARDED_VARS {
            args.push("-e".into());
            args.push(var.into());
        }
        args.push(DOCKER_IMAGE.into());

        let values = [&self.token, &self.toolsets, &self.dynamic_toolsets, &self.host];
        let env: BTreeMap<String, String> = FORWARDED_VARS
            .iter()
            .zip(values)
            .filter_map(|(name, value)| value.as_ref().map(|v| (name.to_string(), v.clone())))
            .collect();

        ServerCommand {
            command: "docker".to_string(),
            args,
            env,
        }
    }

    fn exposes(&self, tool: &str) -> bool {
        self.tool_filter
            .as_ref()
            .map_or(true, |allowed| allowed.iter().any(|t| t == tool))
    }
}

/// Launch the server, handshake, and wrap every exposed remote tool.
pub async fn connect_github(config: &GithubMcpConfig) -> McpClientResult<Vec<Arc<dyn Tool>>> {
    let client = Arc::new(McpClient::spawn(&config.server_command())?);
    client.initialize().await?;
    remote_tools(client, |name| config.exposes(name)).await
}

/// Discover the tools behind `client`, keeping those `keep` accepts.
pub async fn remote_tools(
    client: Arc<McpClient>,
    keep: impl Fn(&str) -> bool,
) -> McpClientResult<Vec<Arc<dyn Tool>>> {
    let schemas = client.list_tools().await?;
    tracing::info!(count = schemas.len(), "Discovered remote MCP tools");

    Ok(schemas
        .into_iter()
        .filter(|schema| keep(&schema.name))
        .map(|schema| {
            Arc::new(RemoteTool {
                client: client.clone(),
                schema,
            }) as Arc<dyn Tool>
        })
        .collect())
}

/// A tool living on another MCP server.
pub struct RemoteTool {
    client: Arc<McpClient>,
    schema: ToolSchema,
}

#[async_trait::async_trait]
impl Tool for RemoteTool {
    fn schema(&self) -> ToolSchema {
        self.schema.clone()
    }

    async fn execute(&self, arguments: Value) -> Result<Envelope> {
        let arguments = if arguments.is_null() {
            Value::Object(Default::default())
        } else {
            arguments
        };

        match self.client.call_tool(&self.schema.name, arguments).await {
            Ok(result) => Ok(Envelope::from(&result)),
            Err(e) => Ok(Envelope::failure(
                &format!("Remote tool {} failed", self.schema.name),
                e,
            )),
        }
    }

    // Remote tools can write to GitHub; nothing tells us which ones don't
    fn tier(&self) -> ToolTier {
        ToolTier::Tier2
    }
}
