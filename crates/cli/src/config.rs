use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use toolbelt_core::EnvSource;
use toolbelt_mcp::tools::repo::{self, ClaudeCode};
use toolbelt_mcp::tools::GithubMcpConfig;

/// Contents of `toolbelt.toml`. Every section is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolbeltConfig {
    #[serde(default)]
    pub toolsets: ToolsetConfig,

    #[serde(default)]
    pub repo: RepoConfig,

    #[serde(default)]
    pub github: GithubConfig,
}

/// Which toolsets are registered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsetConfig {
    #[serde(default = "enabled")]
    pub weather: bool,

    #[serde(default = "enabled")]
    pub opensearch: bool,

    #[serde(default = "enabled")]
    pub repo: bool,

    /// Off by default: it launches a Docker container.
    #[serde(default)]
    pub github: bool,
}

fn enabled() -> bool {
    true
}

impl Default for ToolsetConfig {
    fn default() -> Self {
        Self {
            weather: true,
            opensearch: true,
            repo: true,
            github: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepoConfig {
    /// Used when `CLAUDE_CODE_CMD` is not set.
    #[serde(default)]
    pub claude_command: Option<String>,

    /// Used when neither the call nor `REPO_PATH` names a repository.
    #[serde(default)]
    pub default_repo: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GithubConfig {
    /// Expose only these remote tools.
    #[serde(default)]
    pub tools: Option<Vec<String>>,
}

impl ToolbeltConfig {
    pub fn load(config_path: &Path) -> Result<Self> {
        // Load config file if it exists, otherwise use defaults
        if config_path.exists() {
            let content = std::fs::read_to_string(config_path)
                .with_context(|| format!("Failed to read {}", config_path.display()))?;
            toml::from_str(&content).context("Failed to parse configuration file")
        } else {
            tracing::debug!(path = %config_path.display(), "Configuration file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// The Claude Code runner. Environment variables win over the file.
    pub fn claude_code(&self, env: &dyn EnvSource) -> ClaudeCode {
        let command = env
            .optional(repo::COMMAND_VAR)
            .or_else(|| self.repo.claude_command.clone())
            .unwrap_or_else(|| repo::DEFAULT_COMMAND.to_string());
        let runner = ClaudeCode::new(command);

        match env
            .optional(repo::REPO_PATH_VAR)
            .or_else(|| self.repo.default_repo.clone())
        {
            Some(repo_path) => runner.with_default_repo(repo_path),
            None => runner,
        }
    }

    pub fn github(&self, env: &dyn EnvSource) -> GithubMcpConfig {
        let config = GithubMcpConfig::from_env(env);
        match &self.github.tools {
            Some(tools) => config.with_tool_filter(tools.clone()),
            None => config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use toolbelt_core::MapEnv;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config = ToolbeltConfig::load(&dir.path().join("toolbelt.toml")).unwrap();

        assert!(config.toolsets.weather);
        assert!(config.toolsets.opensearch);
        assert!(config.toolsets.repo);
        assert!(!config.toolsets.github);
        assert!(config.repo.claude_command.is_none());
    }

    #[test]
    fn test_partial_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("toolbelt.toml");
        std::fs::write(
            &path,
            r#"
[toolsets]
opensearch = false
github = true

[repo]
claude_command = "claude-beta"

[github]
tools = ["get_issue", "list_pull_requests"]
"#,
        )
        .unwrap();

        let config = ToolbeltConfig::load(&path).unwrap();
        assert!(config.toolsets.weather);
        assert!(!config.toolsets.opensearch);
        assert!(config.toolsets.github);
        assert_eq!(config.repo.claude_command.as_deref(), Some("claude-beta"));

        let github = config.github(&MapEnv::new());
        assert_eq!(
            github.tool_filter,
            Some(vec!["get_issue".to_string(), "list_pull_requests".to_string()])
        );
    }

    #[test]
    fn test_invalid_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("toolbelt.toml");
        std::fs::write(&path, "[toolsets]\nweather = \"yes\"\n").unwrap();

        let err = ToolbeltConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse configuration file"));
    }

    #[test]
    fn test_env_overrides_claude_command() {
        let mut config = ToolbeltConfig::default();
        config.repo.claude_command = Some("from-file".to_string());

        let runner = config.claude_code(&MapEnv::new());
        assert_eq!(runner.command(), "from-file");

        let runner = config.claude_code(&MapEnv::new().with(repo::COMMAND_VAR, "from-env"));
        assert_eq!(runner.command(), "from-env");
    }
}
