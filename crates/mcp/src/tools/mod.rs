pub mod github;
pub mod opensearch;
pub mod repo;
pub mod weather;
mod registry;

pub use github::{connect_github, GithubMcpConfig, RemoteTool};
pub use opensearch::{opensearch_tools, OpenSearchConnection};
pub use repo::{repo_tools, ClaudeCode};
pub use registry::{
    json_schema_array, json_schema_free_object, json_schema_object, json_schema_string,
    parse_arguments, Tool, ToolRegistry, ToolTier,
};
pub use weather::{CurrentTimeTool, WeatherTool};
