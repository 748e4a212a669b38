// Tool trait, registry and schema helpers

use crate::protocol::ToolSchema;
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::sync::Arc;
use toolbelt_core::Envelope;

/// Tool executor trait
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool schema for MCP
    fn schema(&self) -> ToolSchema;

    /// Execute the tool with given arguments.
    ///
    /// Failures of the wrapped system are reported inside the envelope;
    /// `Err` is reserved for arguments that could not be understood.
    async fn execute(&self, arguments: serde_json::Value) -> Result<Envelope>;

    /// Get the tool's tier (for policy enforcement)
    fn tier(&self) -> ToolTier {
        ToolTier::Tier0
    }
}

/// Tool security tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ToolTier {
    /// Read-only operations
    Tier0,
    /// Writes to an external system (index/delete documents)
    Tier1,
    /// Arbitrary effects (raw API calls, code edits, free-form tasks)
    Tier2,
}

impl std::fmt::Display for ToolTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Tier0 => "read-only",
            Self::Tier1 => "write",
            Self::Tier2 => "unrestricted",
        };
        f.write_str(label)
    }
}

/// Tool registry for managing available tools
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    /// Register a tool. A later tool with the same name replaces the earlier one.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let schema = tool.schema();
        if self.tools.insert(schema.name.clone(), tool).is_some() {
            tracing::warn!(tool = %schema.name, "Replacing previously registered tool");
        }
    }

    pub fn register_all(&mut self, tools: impl IntoIterator<Item = Arc<dyn Tool>>) {
        for tool in tools {
            self.register(tool);
        }
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// List all tool schemas, ordered by name
    pub fn list_schemas(&self) -> Vec<ToolSchema> {
        self.tools.values().map(|t| t.schema()).collect()
    }

    /// Check if a tool exists
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Drop every tool above `max`.
    pub fn restrict_to(&mut self, max: ToolTier) {
        self.tools.retain(|name, tool| {
            let keep = tool.tier() <= max;
            if !keep {
                tracing::debug!(tool = %name, tier = %tool.tier(), "Tool excluded by tier limit");
            }
            keep
        });
    }

    /// Invoke a tool by name. Unknown tools and unparseable arguments come
    /// back as error envelopes like any other failure.
    pub async fn call(&self, name: &str, arguments: serde_json::Value) -> Envelope {
        let Some(tool) = self.get(name) else {
            tracing::warn!(tool = %name, "Unknown tool requested");
            return Envelope::error(format!("Unknown tool: {}", name));
        };

        tracing::info!(tool = %name, "Executing tool");
        let envelope = match tool.execute(arguments).await {
            Ok(envelope) => envelope,
            Err(e) => Envelope::error(format!("{:#}", e)),
        };

        if let Some(message) = envelope.error_message() {
            tracing::warn!(tool = %name, error = %message, "Tool returned an error");
        } else {
            tracing::debug!(tool = %name, "Tool completed");
        }
        envelope
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode tool arguments, naming the tool in the error.
pub fn parse_arguments<T: DeserializeOwned>(tool: &str, arguments: serde_json::Value) -> Result<T> {
    // MCP clients send `{}` or omit arguments entirely for no-arg calls
    let arguments = if arguments.is_null() {
        serde_json::Value::Object(Default::default())
    } else {
        arguments
    };
    serde_json::from_value(arguments).with_context(|| format!("Invalid arguments for {}", tool))
}

// Helper functions for creating tool schemas

pub fn json_schema_object(properties: serde_json::Value, required: Vec<&str>) -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": properties,
        "required": required
    })
}

pub fn json_schema_string(description: &str) -> serde_json::Value {
    serde_json::json!({
        "type": "string",
        "description": description
    })
}

pub fn json_schema_free_object(description: &str) -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "description": description
    })
}

pub fn json_schema_array(items: serde_json::Value, description: &str) -> serde_json::Value {
    serde_json::json!({
        "type": "array",
        "items": items,
        "description": description
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    struct EchoTool {
        name: &'static str,
        tier: ToolTier,
    }

    #[derive(Deserialize)]
    struct EchoArgs {
        text: String,
    }

    #[async_trait::async_trait]
    impl Tool for EchoTool {
        fn schema(&self) -> ToolSchema {
            ToolSchema {
                name: self.name.to_string(),
                description: "Echo the input".to_string(),
                input_schema: json_schema_object(
                    json!({"text": json_schema_string("Text to echo")}),
                    vec!["text"],
                ),
            }
        }

        async fn execute(&self, arguments: serde_json::Value) -> Result<Envelope> {
            let args: EchoArgs = parse_arguments(self.name, arguments)?;
            Ok(Envelope::report(args.text))
        }

        fn tier(&self) -> ToolTier {
            self.tier
        }
    }

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool { name: "echo", tier: ToolTier::Tier0 }));
        registry.register(Arc::new(EchoTool { name: "danger", tier: ToolTier::Tier2 }));
        registry
    }

    #[tokio::test]
    async fn test_call_known_tool() {
        let envelope = registry().call("echo", json!({"text": "hi"})).await;
        assert_eq!(envelope.report_text(), Some("hi"));
    }

    #[tokio::test]
    async fn test_call_unknown_tool() {
        let envelope = registry().call("missing", json!({})).await;
        assert_eq!(envelope.error_message(), Some("Unknown tool: missing"));
    }

    #[tokio::test]
    async fn test_call_with_bad_arguments() {
        let envelope = registry().call("echo", json!({"text": 5})).await;
        let message = envelope.error_message().unwrap();
        assert!(message.starts_with("Invalid arguments for echo"));
    }

    #[test]
    fn test_list_schemas_sorted() {
        let names: Vec<_> = registry().list_schemas().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["danger", "echo"]);
    }

    #[test]
    fn test_restrict_to_tier() {
        let mut registry = registry();
        registry.restrict_to(ToolTier::Tier0);

        assert!(registry.contains("echo"));
        assert!(!registry.contains("danger"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_parse_arguments_null() {
        #[derive(Deserialize)]
        struct NoArgs {
            #[serde(default)]
            flag: bool,
        }

        let args: NoArgs = parse_arguments("noop", serde_json::Value::Null).unwrap();
        assert!(!args.flag);
    }
}
