use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use toolbelt_core::ProcessEnv;
use toolbelt_mcp::tools::ToolTier;
use toolbelt_mcp::McpServer;

mod config;
mod doctor;
mod toolsets;

use config::ToolbeltConfig;

#[derive(Parser, Debug)]
#[command(name = "toolbelt", version)]
#[command(about = "Agent tools for weather, OpenSearch, Claude Code and GitHub, served over MCP", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "toolbelt.toml", env = "TOOLBELT_CONFIG")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the enabled tools over MCP on stdin/stdout
    Serve {
        /// Expose read-only tools only
        #[arg(long)]
        read_only: bool,

        /// Also proxy the GitHub MCP server (requires Docker)
        #[arg(long)]
        github: bool,
    },

    /// List available tools
    Tools,

    /// Invoke one tool and print its result
    Call {
        /// Tool name, e.g. get_weather
        tool: String,

        /// Arguments as a JSON object
        #[arg(long, default_value = "{}")]
        args: String,
    },

    /// Check OpenSearch, the Claude Code CLI and GitHub credentials
    Doctor {
        /// Repository path to verify
        #[arg(long, env = "REPO_PATH")]
        repo: Option<PathBuf>,
    },

    /// Print the command used to launch the GitHub MCP server
    GithubCommand,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Existing variables take precedence over .env
    let dotenv = dotenvy::dotenv();

    // stdout carries MCP traffic and command output, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "toolbelt=info".into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    if let Some(e) = dotenv_failure(dotenv) {
        tracing::warn!(error = %e, "Failed to load .env file");
    }

    let args = Args::parse();
    let mut config = ToolbeltConfig::load(&args.config)?;
    let env = ProcessEnv;

    match args.command {
        Command::Serve { read_only, github } => {
            config.toolsets.github |= github;
            let mut registry = toolsets::build_registry(&config, &env).await;
            if read_only {
                registry.restrict_to(ToolTier::Tier0);
            }

            tracing::info!("Starting toolbelt MCP server");
            McpServer::new(registry).start().await?;
        }

        Command::Tools => {
            let registry = toolsets::build_registry(&config, &env).await;
            for schema in registry.list_schemas() {
                let tier = registry
                    .get(&schema.name)
                    .map(|tool| tool.tier().to_string())
                    .unwrap_or_default();
                println!("{:<20} [{}] {}", schema.name, tier, schema.description);
            }
        }

        Command::Call { tool, args } => {
            let arguments: serde_json::Value =
                serde_json::from_str(&args).context("--args must be valid JSON")?;

            let registry = toolsets::build_registry(&config, &env).await;
            let envelope = registry.call(&tool, arguments).await;
            println!("{}", serde_json::to_string_pretty(&envelope)?);

            if !envelope.is_success() {
                return Ok(ExitCode::FAILURE);
            }
        }

        Command::Doctor { repo } => {
            let repo = repo.or_else(|| config.repo.default_repo.as_ref().map(PathBuf::from));
            let checks = doctor::run(&config, &env, repo.as_deref()).await;
            for check in &checks {
                println!("{}", check);
            }
            if !checks.iter().all(|c| c.passed()) {
                return Ok(ExitCode::FAILURE);
            }
        }

        Command::GithubCommand => {
            let command = config.github(&env).server_command();
            println!("{}", command.display());
            for name in command.env.keys() {
                println!("  env {} (set)", name);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// A missing `.env` is normal; anything else (unreadable, malformed) is reported.
fn dotenv_failure(result: dotenvy::Result<PathBuf>) -> Option<dotenvy::Error> {
    match result {
        Err(e) if !e.not_found() => Some(e),
        _ => None,
    }
}
