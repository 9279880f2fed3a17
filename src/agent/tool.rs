//! Tool types and the tool registry.
//!
//! Tools are named capabilities a worker can expose to the model for
//! function calling. The registry owns every tool; workers only carry the
//! names of the subset they are allowed to use.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AgentError;

/// Maximum raw byte length of tool argument JSON from the LLM.
pub const MAX_TOOL_ARGS_LEN: usize = 100_000;

/// A tool definition that can be sent to an LLM for function-calling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name.
    pub name: String,
    /// Human-readable description of what the tool does.
    pub description: String,
    /// JSON Schema object describing the tool's parameters.
    pub parameters: serde_json::Value,
}

/// A tool call requested by the LLM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique identifier for this call (assigned by the provider).
    pub id: String,
    /// Name of the tool to invoke.
    pub name: String,
    /// JSON-encoded arguments for the tool.
    pub arguments: String,
}

/// Outcome of a tool invocation.
///
/// A tool that ran but could not produce an answer (bad expression, missing
/// argument) reports it through `error` rather than returning `Err`; `Err`
/// is reserved for the tool being unable to run at all.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    /// Result text handed back to the model.
    pub output: String,
    /// Tool-level failure message, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Extra structured information about the run.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl ToolOutput {
    /// Successful output.
    #[must_use]
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            ..Self::default()
        }
    }

    /// Tool-level failure.
    #[must_use]
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// Attaches a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Returns `true` when no tool-level error was reported.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

impl fmt::Display for ToolOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error {
            Some(err) => write!(f, "Error: {err}"),
            None => f.write_str(&self.output),
        }
    }
}

/// A capability the model can call.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique tool name used by the model to select it.
    fn name(&self) -> &str;

    /// What the tool does, shown to the model.
    fn description(&self) -> &str;

    /// JSON Schema for the arguments object.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Runs the tool on JSON-encoded arguments.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ToolExecution`] if the tool cannot run.
    async fn execute(&self, arguments: &str) -> Result<ToolOutput, AgentError>;

    /// Definition sent to the provider.
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// Name-ordered collection of tools.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in tools.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut tools: BTreeMap<String, Arc<dyn Tool>> = BTreeMap::new();
        let calc = super::calculator::Calculator;
        tools.insert(calc.name().to_string(), Arc::new(calc));
        Self { tools }
    }

    /// Adds a tool.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::DuplicateTool`] if the name is taken.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), AgentError> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(AgentError::DuplicateTool { name });
        }
        self.tools.insert(name, tool);
        Ok(())
    }

    /// Looks up a tool by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    /// Registered tool names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    /// Number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Returns `true` if no tools are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Definitions for every registered tool.
    #[must_use]
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.definition()).collect()
    }

    /// Definitions for the named subset, in the order given.
    ///
    /// Names that are not registered are skipped.
    #[must_use]
    pub fn definitions_for<S: AsRef<str>>(&self, names: &[S]) -> Vec<ToolDefinition> {
        names
            .iter()
            .filter_map(|n| self.tools.get(n.as_ref()))
            .map(|t| t.definition())
            .collect()
    }

    /// Dispatches a tool call.
    ///
    /// Validates raw argument size before dispatch.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ToolExecution`] for unknown tools, oversized
    /// arguments, or a tool that fails to run.
    pub async fn execute(&self, call: &ToolCall) -> Result<ToolOutput, AgentError> {
        if call.arguments.len() > MAX_TOOL_ARGS_LEN {
            return Err(AgentError::ToolExecution {
                name: call.name.clone(),
                message: format!(
                    "tool arguments too large ({} bytes, max {MAX_TOOL_ARGS_LEN})",
                    call.arguments.len()
                ),
            });
        }

        let tool = self
            .tools
            .get(&call.name)
            .ok_or_else(|| AgentError::ToolExecution {
                name: call.name.clone(),
                message: "unknown tool".to_string(),
            })?;
        tool.execute(&call.arguments).await
    }
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Echo;

    #[async_trait]
    impl Tool for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echoes its arguments."
        }

        fn parameters_schema(&self) -> serde_json::Value {
            json!({"type": "object", "properties": {}})
        }

        async fn execute(&self, arguments: &str) -> Result<ToolOutput, AgentError> {
            Ok(ToolOutput::success(arguments))
        }
    }

    fn call(name: &str, arguments: &str) -> ToolCall {
        ToolCall {
            id: "call_1".to_string(),
            name: name.to_string(),
            arguments: arguments.to_string(),
        }
    }

    #[test]
    fn test_register_rejects_duplicates() {
        let mut registry = ToolRegistry::new();
        assert!(registry.register(Arc::new(Echo)).is_ok());
        let err = registry.register(Arc::new(Echo));
        assert!(matches!(err, Err(AgentError::DuplicateTool { ref name }) if name == "echo"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_builtins_and_ordering() {
        let mut registry = ToolRegistry::with_builtins();
        assert!(registry.register(Arc::new(Echo)).is_ok());
        assert_eq!(registry.names(), vec!["calculator", "echo"]);
    }

    #[test]
    fn test_definitions_for_subset() {
        let mut registry = ToolRegistry::with_builtins();
        assert!(registry.register(Arc::new(Echo)).is_ok());
        let defs = registry.definitions_for(&["echo", "missing"]);
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].name, "echo");
        assert_eq!(defs[0].parameters["type"], "object");
        assert!(registry.definitions_for::<&str>(&[]).is_empty());
    }

    #[tokio::test]
    async fn test_execute_dispatches() {
        let mut registry = ToolRegistry::new();
        assert!(registry.register(Arc::new(Echo)).is_ok());
        let out = registry.execute(&call("echo", "{}")).await;
        assert_eq!(out.map(|o| o.output).unwrap_or_default(), "{}");
    }

    #[tokio::test]
    async fn test_execute_unknown_tool() {
        let registry = ToolRegistry::new();
        let err = registry.execute(&call("nope", "{}")).await;
        assert!(matches!(
            err,
            Err(AgentError::ToolExecution { ref message, .. }) if message == "unknown tool"
        ));
    }

    #[tokio::test]
    async fn test_execute_rejects_oversized_arguments() {
        let mut registry = ToolRegistry::new();
        assert!(registry.register(Arc::new(Echo)).is_ok());
        let huge = "x".repeat(MAX_TOOL_ARGS_LEN + 1);
        let err = registry.execute(&call("echo", &huge)).await;
        assert!(matches!(err, Err(AgentError::ToolExecution { .. })));
    }

    #[test]
    fn test_tool_output_display() {
        assert_eq!(ToolOutput::success("20").to_string(), "20");
        assert_eq!(
            ToolOutput::failure("division by zero").to_string(),
            "Error: division by zero"
        );
        assert!(!ToolOutput::failure("x").is_success());
    }
}
