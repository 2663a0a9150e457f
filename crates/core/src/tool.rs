//! The tool trait and registry, the abstraction over assistant capabilities.
//!
//! Tools are what let the model act on the codebase: read and edit files,
//! search, run git operations, convert documents, fetch URLs. Each tool is
//! registered once at startup in the `ToolRegistry` and looked up by name
//! when the model requests it through the wire protocol.

use std::time::Duration;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{RegistryError, ToolError};

/// Arguments to a tool invocation, in the order they appeared on the wire.
///
/// Values are plain strings at this boundary; each tool performs its own
/// typed coercion at the edge of its handler.
pub type ToolArgs = IndexMap<String, String>;

/// One declared parameter of a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterSpec {
    /// Parameter name as it appears on the wire.
    pub name: String,
    /// Filled in by the dispatcher when the model omits the parameter.
    /// `None` means the parameter is required-or-optional per the tool's
    /// own handling (an absent key stays absent).
    pub default: Option<String>,
}

impl ParameterSpec {
    /// A parameter the model must supply.
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default: None,
        }
    }

    /// A parameter the tool treats as optional. The dispatcher leaves an
    /// absent key absent; the tool decides what absence means.
    pub fn optional(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default: None,
        }
    }

    /// A parameter filled from a default when omitted.
    pub fn with_default(name: impl Into<String>, default: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default: Some(default.into()),
        }
    }
}

/// A tool's registry entry as shown to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescription {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ParameterSpec>,
}

/// Outcome status of one tool invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    Success,
    Failure,
}

/// The result of one tool invocation, fed back into the conversation.
///
/// Failures carry a human-readable description, never a raw internal error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// Unique id for this invocation, assigned by the dispatcher.
    pub invocation_id: String,
    pub status: ToolStatus,
    pub output: String,
}

impl ToolResult {
    pub fn success(invocation_id: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            invocation_id: invocation_id.into(),
            status: ToolStatus::Success,
            output: output.into(),
        }
    }

    pub fn failure(invocation_id: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            invocation_id: invocation_id.into(),
            status: ToolStatus::Failure,
            output: output.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ToolStatus::Success
    }
}

/// The core Tool trait.
///
/// Each built-in (file_read, file_edit, git_commit, fetch_url, ...)
/// implements this trait and is registered in the `ToolRegistry`.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "file_read").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// The declared parameters, in wire order.
    fn parameters(&self) -> Vec<ParameterSpec>;

    /// Whether undeclared arguments should be passed through rather than
    /// dropped with a warning.
    fn accepts_extra_args(&self) -> bool {
        false
    }

    /// Whether this tool mutates the workspace. Mutating tools are
    /// refused while planning mode is active.
    fn mutates_workspace(&self) -> bool {
        false
    }

    /// Per-invocation execution deadline enforced by the dispatcher.
    fn timeout(&self) -> Duration {
        Duration::from_secs(30)
    }

    /// Execute the tool with the given arguments.
    async fn execute(&self, args: ToolArgs) -> Result<String, ToolError>;
}

/// A registry of available tools.
///
/// Populated once at startup; read-only thereafter. The turn loop uses it
/// to build tool descriptions for the model and to resolve invocations.
pub struct ToolRegistry {
    tools: IndexMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: IndexMap::new(),
        }
    }

    /// Register a tool. Name collisions are a fatal registration error.
    pub fn register(&mut self, tool: Box<dyn Tool>) -> Result<(), RegistryError> {
        let name = tool.name().to_string();
        if name.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if self.tools.contains_key(&name) {
            return Err(RegistryError::DuplicateTool(name));
        }
        self.tools.insert(name, tool);
        Ok(())
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// Descriptions of all tools, in registration order.
    pub fn descriptions(&self) -> Vec<ToolDescription> {
        self.tools
            .values()
            .map(|t| ToolDescription {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.parameters(),
            })
            .collect()
    }

    /// List all registered tool names.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A simple test tool for unit tests.
    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echoes back the input"
        }
        fn parameters(&self) -> Vec<ParameterSpec> {
            vec![ParameterSpec::required("text")]
        }
        async fn execute(&self, args: ToolArgs) -> Result<String, ToolError> {
            Ok(args.get("text").cloned().unwrap_or_default())
        }
    }

    #[test]
    fn registry_register_and_lookup() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool)).unwrap();
        assert!(registry.get("echo").is_some());
        assert!(registry.get("nonexistent").is_none());
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool)).unwrap();
        let err = registry.register(Box::new(EchoTool)).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateTool(name) if name == "echo"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn registry_descriptions() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool)).unwrap();
        let descs = registry.descriptions();
        assert_eq!(descs.len(), 1);
        assert_eq!(descs[0].name, "echo");
        assert_eq!(descs[0].parameters[0].name, "text");
    }

    #[tokio::test]
    async fn execute_echo() {
        let tool = EchoTool;
        let mut args = ToolArgs::new();
        args.insert("text".into(), "hello world".into());
        let out = tool.execute(args).await.unwrap();
        assert_eq!(out, "hello world");
    }

    #[test]
    fn parameter_spec_constructors() {
        assert!(ParameterSpec::required("a").default.is_none());
        assert!(ParameterSpec::optional("b").default.is_none());
        assert_eq!(
            ParameterSpec::with_default("c", "1").default.as_deref(),
            Some("1")
        );
    }

    #[test]
    fn tool_result_constructors() {
        let ok = ToolResult::success("inv_1", "done");
        assert!(ok.is_success());
        let bad = ToolResult::failure("inv_2", "boom");
        assert_eq!(bad.status, ToolStatus::Failure);
        assert_eq!(bad.output, "boom");
    }
}
