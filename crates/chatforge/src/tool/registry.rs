//! Tool registry for managing and executing tools.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use super::ToolHandler;
use crate::chat::{ToolCall, ToolResult};
use crate::provider::ToolDefinition;

/// A registry of tool handlers, indexed by name.
///
/// Registration has replace semantics: registering a second handler
/// under an existing name drops the first one.
pub struct ToolRegistry<Ctx = ()>
where
    Ctx: Send + Sync + 'static,
{
    handlers: HashMap<String, Arc<dyn ToolHandler<Ctx>>>,
}

impl<Ctx> Default for ToolRegistry<Ctx>
where
    Ctx: Send + Sync + 'static,
{
    fn default() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }
}

impl<Ctx> Clone for ToolRegistry<Ctx>
where
    Ctx: Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            handlers: self.handlers.clone(),
        }
    }
}

impl<Ctx> std::fmt::Debug for ToolRegistry<Ctx>
where
    Ctx: Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.handlers.keys().collect();
        names.sort();
        f.debug_struct("ToolRegistry").field("tools", &names).finish()
    }
}

impl<Ctx: Send + Sync + 'static> ToolRegistry<Ctx> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tool handler, replacing any handler with the same name.
    pub fn register(&mut self, handler: impl ToolHandler<Ctx> + 'static) -> &mut Self {
        let name = handler.definition().name;
        self.handlers.insert(name, Arc::new(handler));
        self
    }

    /// Returns whether a tool with the given name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Definitions of all registered tools, sorted by name so that
    /// requests built from them are deterministic.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<_> = self.handlers.values().map(|h| h.definition()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Returns the number of registered tools.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns true if no tools are registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Executes a single tool call.
    ///
    /// Always yields a [`ToolResult`]; unknown tools and handler errors
    /// come back with `is_error` set.
    pub async fn execute(&self, call: &ToolCall, ctx: &Ctx) -> ToolResult {
        self.execute_by_name(&call.name, &call.id, call.arguments.clone(), ctx)
            .await
    }

    pub(crate) async fn execute_by_name(
        &self,
        name: &str,
        call_id: &str,
        arguments: Value,
        ctx: &Ctx,
    ) -> ToolResult {
        let Some(handler) = self.handlers.get(name) else {
            tracing::warn!(tool = name, "model called an unregistered tool");
            return ToolResult {
                tool_call_id: call_id.to_string(),
                content: format!("Unknown tool: {name}"),
                is_error: true,
            };
        };

        match handler.execute(arguments, ctx).await {
            Ok(output) => ToolResult {
                tool_call_id: call_id.to_string(),
                content: output.content,
                is_error: false,
            },
            Err(e) => ToolResult {
                tool_call_id: call_id.to_string(),
                content: e.message,
                is_error: true,
            },
        }
    }
}
