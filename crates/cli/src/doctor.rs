// Environment checks for `toolbelt doctor`

use crate::config::ToolbeltConfig;
use std::path::Path;
use toolbelt_core::EnvSource;
use toolbelt_mcp::tools::github;
use toolbelt_opensearch::OpenSearchClient;

#[derive(Debug)]
pub struct Check {
    pub name: &'static str,
    pub outcome: Result<String, String>,
}

impl Check {
    pub fn passed(&self) -> bool {
        self.outcome.is_ok()
    }
}

impl std::fmt::Display for Check {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.outcome {
            Ok(detail) => write!(f, "[ok]   {}: {}", self.name, detail),
            Err(detail) => write!(f, "[fail] {}: {}", self.name, detail),
        }
    }
}

pub async fn run(config: &ToolbeltConfig, env: &dyn EnvSource, repo: Option<&Path>) -> Vec<Check> {
    let mut checks = vec![
        Check {
            name: "opensearch",
            outcome: check_opensearch(env).await,
        },
        Check {
            name: "claude",
            outcome: config.claude_code(env).version().await,
        },
    ];

    if let Some(repo) = repo {
        let outcome = if repo.is_dir() {
            Ok(repo.display().to_string())
        } else {
            Err(format!("Repository path does not exist: {}", repo.display()))
        };
        checks.push(Check {
            name: "repository",
            outcome,
        });
    }

    checks.push(Check {
        name: "github",
        outcome: match env.optional(github::TOKEN_VAR) {
            Some(_) => Ok(format!("{} is set", github::TOKEN_VAR)),
            None => Err(format!("{} is not set", github::TOKEN_VAR)),
        },
    });

    checks
}

async fn check_opensearch(env: &dyn EnvSource) -> Result<String, String> {
    let client = OpenSearchClient::from_env(env).map_err(|e| e.to_string())?;
    let health = client.cluster_health().await.map_err(|e| e.to_string())?;

    let status = health
        .get("status")
        .and_then(|s| s.as_str())
        .unwrap_or("unknown");
    Ok(format!("{} (cluster status {})", client.base_url(), status))
}
