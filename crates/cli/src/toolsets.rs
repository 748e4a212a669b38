use crate::config::ToolbeltConfig;
use std::sync::Arc;
use toolbelt_core::EnvSource;
use toolbelt_mcp::tools::{
    connect_github, opensearch_tools, repo_tools, CurrentTimeTool, OpenSearchConnection,
    ToolRegistry, WeatherTool,
};

/// Register every enabled toolset.
///
/// A toolset that cannot start (no OpenSearch host, Docker missing) is
/// logged and skipped or degraded; the remaining toolsets still come up.
pub async fn build_registry(config: &ToolbeltConfig, env: &dyn EnvSource) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    let toolsets = &config.toolsets;

    if toolsets.weather {
        registry.register(Arc::new(WeatherTool));
        registry.register(Arc::new(CurrentTimeTool::new()));
    }

    if toolsets.opensearch {
        registry.register_all(opensearch_tools(OpenSearchConnection::from_env(env)));
    }

    if toolsets.repo {
        registry.register_all(repo_tools(config.claude_code(env)));
    }

    if toolsets.github {
        match connect_github(&config.github(env)).await {
            Ok(tools) => registry.register_all(tools),
            Err(e) => tracing::error!(error = %e, "GitHub toolset unavailable"),
        }
    }

    tracing::info!(tools = registry.len(), "Tool registry ready");
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ToolsetConfig;
    use toolbelt_core::MapEnv;

    #[tokio::test]
    async fn test_default_toolsets() {
        let registry = build_registry(&ToolbeltConfig::default(), &MapEnv::new()).await;

        for name in [
            "get_weather",
            "get_current_time",
            "create_index",
            "index_document",
            "search_documents",
            "simple_search",
            "delete_document",
            "opensearch_request",
            "search_repository",
            "explain_code",
            "modify_code",
            "execute_task",
        ] {
            assert!(registry.contains(name), "missing {}", name);
        }
        assert_eq!(registry.len(), 12);
    }

    #[tokio::test]
    async fn test_disabled_toolsets() {
        let config = ToolbeltConfig {
            toolsets: ToolsetConfig {
                weather: true,
                opensearch: false,
                repo: false,
                github: false,
            },
            ..Default::default()
        };

        let registry = build_registry(&config, &MapEnv::new()).await;
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn test_opensearch_without_host_reports_errors() {
        let registry = build_registry(&ToolbeltConfig::default(), &MapEnv::new()).await;

        let envelope = registry
            .call("search_documents", serde_json::json!({"index_name": "docs", "query": {}}))
            .await;
        assert_eq!(
            envelope.error_message(),
            Some("Search failed: OPENSEARCH_HOST environment variable must be set")
        );
    }
}
