// Repository tools backed by the Claude Code CLI

use crate::protocol::ToolSchema;
use crate::tools::{
    json_schema_array, json_schema_object, json_schema_string, parse_arguments, Tool, ToolTier,
};
use anyhow::Result;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::{Component, Path, PathBuf};
use std::process::{Output, Stdio};
use std::sync::Arc;
use tokio::process::Command;
use toolbelt_core::{EnvSource, Envelope};

pub const COMMAND_VAR: &str = "CLAUDE_CODE_CMD";
pub const REPO_PATH_VAR: &str = "REPO_PATH";
pub const DEFAULT_COMMAND: &str = "claude";

/// zsh when installed (so user aliases resolve), bash otherwise.
pub fn default_shell() -> PathBuf {
    let zsh = Path::new("/bin/zsh");
    if zsh.exists() {
        zsh.to_path_buf()
    } else {
        PathBuf::from("/bin/bash")
    }
}

/// Quote a string for POSIX shells.
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

fn escape_double_quotes(value: &str) -> String {
    value.replace('"', "\\\"")
}

pub fn search_prompt(query: &str, file_patterns: &[String]) -> String {
    let pattern_arg = if file_patterns.is_empty() {
        String::new()
    } else {
        format!(" --include=\"{}\"", file_patterns.join(","))
    };
    format!("search{} \"{}\"", pattern_arg, escape_double_quotes(query))
}

pub fn explain_prompt(file_path: &str, line_range: Option<&str>) -> String {
    match line_range.filter(|r| !r.is_empty()) {
        Some(range) => format!("explain {}:{}", file_path, range),
        None => format!("explain {}", file_path),
    }
}

pub fn modify_prompt(file_path: &str, instruction: &str) -> String {
    format!("edit {} \"{}\"", file_path, escape_double_quotes(instruction))
}

/// Make an absolute `file_path` relative to the repository. Relative paths
/// pass through unchanged. Either kind is rejected when `..` takes it
/// outside the repository.
pub fn relative_to_repo(file_path: &str, repo_path: &str) -> Result<String, String> {
    let outside = || format!("File path {} is not within repository {}", file_path, repo_path);
    let repo = normalize(&std::path::absolute(repo_path).map_err(|_| outside())?);

    let file = Path::new(file_path);
    let resolved = if file.is_absolute() {
        normalize(file)
    } else {
        normalize(&repo.join(file))
    };
    let relative = resolved.strip_prefix(&repo).map_err(|_| outside())?;

    if file.is_absolute() {
        Ok(relative.to_string_lossy().into_owned())
    } else {
        Ok(file_path.to_string())
    }
}

/// Resolve `.` and `..` lexically, without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }
    normalized
}

/// Runs the Claude Code CLI through a shell.
#[derive(Debug, Clone)]
pub struct ClaudeCode {
    command: String,
    shell: PathBuf,
    default_repo: Option<String>,
}

impl ClaudeCode {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            shell: default_shell(),
            default_repo: None,
        }
    }

    /// `CLAUDE_CODE_CMD` (default `claude`) and an optional `REPO_PATH`.
    pub fn from_env(env: &dyn EnvSource) -> Self {
        let mut runner = Self::new(
            env.optional(COMMAND_VAR)
                .unwrap_or_else(|| DEFAULT_COMMAND.to_string()),
        );
        runner.default_repo = env.optional(REPO_PATH_VAR);
        runner
    }

    pub fn with_shell(mut self, shell: impl Into<PathBuf>) -> Self {
        self.shell = shell.into();
        self
    }

    pub fn with_default_repo(mut self, repo_path: impl Into<String>) -> Self {
        self.default_repo = Some(repo_path.into());
        self
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    async fn run_shell(&self, script: &str, cwd: Option<&Path>) -> std::io::Result<Output> {
        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c")
            .arg(script)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        tracing::debug!(shell = %self.shell.display(), script = %script, "Running shell command");
        cmd.output().await
    }

    /// `<command> --version`, trimmed. Errors carry a human-readable reason.
    pub async fn version(&self) -> Result<String, String> {
        let script = format!("{} --version", self.command);
        match self.run_shell(&script, None).await {
            Ok(output) if output.status.success() => {
                let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
                text.push_str(&String::from_utf8_lossy(&output.stderr));
                Ok(text.trim().to_string())
            }
            Ok(output) => Err(format!(
                "Command '{}' returned non-zero exit status {}: {}",
                script,
                output.status.code().unwrap_or(-1),
                String::from_utf8_lossy(&output.stderr).trim()
            )),
            Err(e) => Err(e.to_string()),
        }
    }

    fn resolve_repo<'a>(&'a self, repo_path: Option<&'a str>) -> Option<&'a str> {
        repo_path
            .filter(|p| !p.is_empty())
            .or(self.default_repo.as_deref())
    }

    /// Run `<command> -p <prompt>` inside the repository.
    pub async fn execute(&self, prompt: &str, repo_path: &str) -> Envelope {
        let version = match self.version().await {
            Ok(version) => version,
            Err(reason) => {
                return Envelope::error(format!(
                    "{} CLI is not installed or not in PATH. Error: {}",
                    self.command, reason
                ))
            }
        };

        let repo = Path::new(repo_path);
        if !repo.is_dir() {
            return Envelope::error(format!("Repository path does not exist: {}", repo_path));
        }

        let script = format!("{} -p {}", self.command, shell_quote(prompt));
        tracing::info!(repo = %repo_path, "Running Claude Code");

        let output = match self.run_shell(&script, Some(repo)).await {
            Ok(output) => output,
            Err(e) => return Envelope::failure("Failed to execute Claude Code", e),
        };

        if !output.status.success() {
            let code = output.status.code().unwrap_or(-1);
            tracing::warn!(exit_code = code, "Claude Code exited with an error");
            return Envelope::error(format!(
                "Claude Code execution failed: {}",
                String::from_utf8_lossy(&output.stderr)
            ))
            .with("exit_code", code);
        }

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let result = serde_json::from_str::<Value>(&stdout).unwrap_or(Value::String(stdout));

        Envelope::success()
            .with("result", result)
            .with("claude_version", version)
    }
}

/// The four repository tools sharing one runner.
pub fn repo_tools(runner: ClaudeCode) -> Vec<Arc<dyn Tool>> {
    let runner = Arc::new(runner);
    vec![
        Arc::new(SearchRepositoryTool(runner.clone())),
        Arc::new(ExplainCodeTool(runner.clone())),
        Arc::new(ModifyCodeTool(runner.clone())),
        Arc::new(ExecuteTaskTool(runner)),
    ]
}

fn repo_path_schema() -> Value {
    json_schema_string("Path to the repository (defaults to REPO_PATH when omitted)")
}

fn missing_repo() -> Envelope {
    Envelope::error("repo_path is required (or set REPO_PATH)")
}

pub struct SearchRepositoryTool(Arc<ClaudeCode>);

#[derive(Debug, Deserialize)]
struct SearchRepositoryArgs {
    query: String,
    #[serde(default)]
    repo_path: Option<String>,
    #[serde(default)]
    file_patterns: Option<Vec<String>>,
}

#[async_trait::async_trait]
impl Tool for SearchRepositoryTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "search_repository".to_string(),
            description: "Search a repository for code, patterns or concepts".to_string(),
            input_schema: json_schema_object(
                json!({
                    "query": json_schema_string("What to search for"),
                    "repo_path": repo_path_schema(),
                    "file_patterns": json_schema_array(
                        json_schema_string("Glob pattern"),
                        "Only search files matching these patterns (optional)"
                    )
                }),
                vec!["query"],
            ),
        }
    }

    async fn execute(&self, arguments: Value) -> Result<Envelope> {
        let args: SearchRepositoryArgs = parse_arguments("search_repository", arguments)?;
        let Some(repo) = self.0.resolve_repo(args.repo_path.as_deref()) else {
            return Ok(missing_repo());
        };

        let prompt = search_prompt(&args.query, args.file_patterns.as_deref().unwrap_or_default());
        Ok(self.0.execute(&prompt, repo).await)
    }
}

pub struct ExplainCodeTool(Arc<ClaudeCode>);

#[derive(Debug, Deserialize)]
struct ExplainCodeArgs {
    file_path: String,
    #[serde(default)]
    repo_path: Option<String>,
    #[serde(default)]
    line_range: Option<String>,
}

#[async_trait::async_trait]
impl Tool for ExplainCodeTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "explain_code".to_string(),
            description: "Explain the code in a file, optionally limited to a line range".to_string(),
            input_schema: json_schema_object(
                json!({
                    "file_path": json_schema_string("File to explain, relative to the repository"),
                    "repo_path": repo_path_schema(),
                    "line_range": json_schema_string("Line range such as 10-20 (optional)")
                }),
                vec!["file_path"],
            ),
        }
    }

    async fn execute(&self, arguments: Value) -> Result<Envelope> {
        let args: ExplainCodeArgs = parse_arguments("explain_code", arguments)?;
        let Some(repo) = self.0.resolve_repo(args.repo_path.as_deref()) else {
            return Ok(missing_repo());
        };

        let file = match relative_to_repo(&args.file_path, repo) {
            Ok(file) => file,
            Err(message) => return Ok(Envelope::error(message)),
        };
        let prompt = explain_prompt(&file, args.line_range.as_deref());
        Ok(self.0.execute(&prompt, repo).await)
    }
}

pub struct ModifyCodeTool(Arc<ClaudeCode>);

#[derive(Debug, Deserialize)]
struct ModifyCodeArgs {
    instruction: String,
    file_path: String,
    #[serde(default)]
    repo_path: Option<String>,
}

#[async_trait::async_trait]
impl Tool for ModifyCodeTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "modify_code".to_string(),
            description: "Edit a file in the repository according to an instruction".to_string(),
            input_schema: json_schema_object(
                json!({
                    "instruction": json_schema_string("How the code should change"),
                    "file_path": json_schema_string("File to modify, relative to the repository"),
                    "repo_path": repo_path_schema()
                }),
                vec!["instruction", "file_path"],
            ),
        }
    }

    async fn execute(&self, arguments: Value) -> Result<Envelope> {
        let args: ModifyCodeArgs = parse_arguments("modify_code", arguments)?;
        let Some(repo) = self.0.resolve_repo(args.repo_path.as_deref()) else {
            return Ok(missing_repo());
        };

        let file = match relative_to_repo(&args.file_path, repo) {
            Ok(file) => file,
            Err(message) => return Ok(Envelope::error(message)),
        };
        let prompt = modify_prompt(&file, &args.instruction);
        Ok(self.0.execute(&prompt, repo).await)
    }

    fn tier(&self) -> ToolTier {
        ToolTier::Tier2
    }
}

pub struct ExecuteTaskTool(Arc<ClaudeCode>);

#[derive(Debug, Deserialize)]
struct ExecuteTaskArgs {
    task: String,
    #[serde(default)]
    repo_path: Option<String>,
}

#[async_trait::async_trait]
impl Tool for ExecuteTaskTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "execute_task".to_string(),
            description: "Hand a free-form task to Claude Code inside the repository".to_string(),
            input_schema: json_schema_object(
                json!({
                    "task": json_schema_string("The task to perform"),
                    "repo_path": repo_path_schema()
                }),
                vec!["task"],
            ),
        }
    }

    async fn execute(&self, arguments: Value) -> Result<Envelope> {
        let args: ExecuteTaskArgs = parse_arguments("execute_task", arguments)?;
        let Some(repo) = self.0.resolve_repo(args.repo_path.as_deref()) else {
            return Ok(missing_repo());
        };
        Ok(self.0.execute(&args.task, repo).await)
    }

    fn tier(&self) -> ToolTier {
        ToolTier::Tier2
    }
}
