//! Named registry of [`Tool`]s with replace-on-collision registration.
//!
//! The registry is the thing an [`crate::AgentLoop`] (and an extension's
//! `register_tool`) actually holds: a map from name to [`Tool`], kept behind
//! a lock so it can be shared between the loop and anything registering
//! tools into it concurrently.

use crate::error::Error;
use crate::tools::Tool;
use crate::Result;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Thread-safe map of tool name to [`Tool`].
///
/// Registering a tool under a name that's already taken replaces the
/// previous entry; there is no separate "already registered" error. This
/// matches the common case of a caller reloading its own tool set and
/// lets extensions safely override a builtin tool by name.
#[derive(Default)]
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Tool>>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap this registry in an `Arc` for sharing across the agent loop and extensions.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Register a tool, replacing any existing tool with the same name.
    pub async fn register(&self, tool: Tool) {
        self.tools.write().await.insert(tool.name().to_string(), tool);
    }

    /// Remove a tool by name. No error if it wasn't registered.
    pub async fn unregister(&self, name: &str) {
        self.tools.write().await.remove(name);
    }

    /// Look up a tool by name.
    pub async fn get(&self, name: &str) -> Option<Tool> {
        self.tools.read().await.get(name).cloned()
    }

    /// `true` if a tool with this name is registered.
    pub async fn contains(&self, name: &str) -> bool {
        self.tools.read().await.contains_key(name)
    }

    /// Number of registered tools.
    pub async fn len(&self) -> usize {
        self.tools.read().await.len()
    }

    /// `true` if no tools are registered.
    pub async fn is_empty(&self) -> bool {
        self.tools.read().await.is_empty()
    }

    /// List all registered tools, in no particular order.
    pub async fn list_tools(&self) -> Vec<Tool> {
        self.tools.read().await.values().cloned().collect()
    }

    /// OpenAI-format function-calling schemas for every registered tool.
    ///
    /// This is what gets attached to the `tools` field of a provider request.
    pub async fn list_schemas(&self) -> Vec<Value> {
        self.tools
            .read()
            .await
            .values()
            .map(Tool::to_openai_format)
            .collect()
    }

    /// Execute a tool by name.
    ///
    /// Returns [`Error::Tool`] if no tool is registered under `name`; the
    /// agent loop converts this into a tool-result message rather than
    /// aborting the turn.
    pub async fn execute(&self, name: &str, arguments: Value) -> Result<Value> {
        let tool = self
            .get(name)
            .await
            .ok_or_else(|| Error::tool(format!("tool '{name}' not found in registry")))?;
        tool.execute(arguments).await
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn echo_tool(name: &str) -> Tool {
        Tool::new(name, "echo tool", json!({}), |args| async move { Ok(args) })
    }

    #[tokio::test]
    async fn register_and_get() {
        let registry = ToolRegistry::new();
        registry.register(echo_tool("echo")).await;
        assert!(registry.contains("echo").await);
        assert!(registry.get("echo").await.is_some());
    }

    #[tokio::test]
    async fn register_replaces_on_name_collision() {
        let registry = ToolRegistry::new();
        registry
            .register(Tool::new("dup", "first", json!({}), |_| async {
                Ok(json!({"version": 1}))
            }))
            .await;
        registry
            .register(Tool::new("dup", "second", json!({}), |_| async {
                Ok(json!({"version": 2}))
            }))
            .await;

        assert_eq!(registry.len().await, 1);
        let result = registry.execute("dup", json!({})).await.unwrap();
        assert_eq!(result["version"], 2);
    }

    #[tokio::test]
    async fn unregister_removes_tool() {
        let registry = ToolRegistry::new();
        registry.register(echo_tool("echo")).await;
        registry.unregister("echo").await;
        assert!(!registry.contains("echo").await);
    }

    #[tokio::test]
    async fn unregister_missing_tool_is_a_noop() {
        let registry = ToolRegistry::new();
        registry.unregister("nope").await;
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn execute_missing_tool_returns_tool_error() {
        let registry = ToolRegistry::new();
        let err = registry.execute("missing", json!({})).await.unwrap_err();
        assert!(matches!(err, Error::Tool(_)));
    }

    #[tokio::test]
    async fn list_schemas_covers_every_registered_tool() {
        let registry = ToolRegistry::new();
        registry.register(echo_tool("a")).await;
        registry.register(echo_tool("b")).await;

        let schemas = registry.list_schemas().await;
        assert_eq!(schemas.len(), 2);
        let names: Vec<_> = schemas.iter().map(|s| s["function"]["name"].clone()).collect();
        assert!(names.contains(&json!("a")));
        assert!(names.contains(&json!("b")));
    }

    #[tokio::test]
    async fn execute_runs_the_registered_handler() {
        let registry = ToolRegistry::new();
        registry
            .register(Tool::new("add", "add", json!({}), |args| async move {
                let a = args["a"].as_f64().unwrap_or(0.0);
                let b = args["b"].as_f64().unwrap_or(0.0);
                Ok(json!({"result": a + b}))
            }))
            .await;

        let result = registry.execute("add", json!({"a": 2.0, "b": 3.0})).await.unwrap();
        assert_eq!(result["result"], 5.0);
    }
}
