//! Tool handler trait.

use std::future::Future;
use std::pin::Pin;

use serde_json::Value;

use super::{ToolError, ToolOutput};
use crate::provider::ToolDefinition;

/// A single tool that can be invoked by the model.
///
/// Generic over a context type `Ctx` passed to every `execute` call
/// (default `()`). The trait is object-safe so handlers can be stored
/// as `Arc<dyn ToolHandler<Ctx>>` in a [`ToolRegistry`](super::ToolRegistry).
///
/// ```rust
/// use chatforge::tool::{ToolError, ToolHandler, ToolOutput};
/// use chatforge::{JsonSchema, ToolDefinition};
/// use serde_json::{Value, json};
/// use std::future::Future;
/// use std::pin::Pin;
///
/// struct Clock;
///
/// impl ToolHandler for Clock {
///     fn definition(&self) -> ToolDefinition {
///         ToolDefinition {
///             name: "clock".into(),
///             description: "Current time".into(),
///             parameters: JsonSchema::new(json!({"type": "object"})),
///         }
///     }
///
///     fn execute<'a>(
///         &'a self,
///         _input: Value,
///         _ctx: &'a (),
///     ) -> Pin<Box<dyn Future<Output = Result<ToolOutput, ToolError>> + Send + 'a>> {
///         Box::pin(async { Ok(ToolOutput::new("12:00")) })
///     }
/// }
/// ```
pub trait ToolHandler<Ctx = ()>: Send + Sync {
    /// Returns the tool's definition (name, description, parameter schema).
    fn definition(&self) -> ToolDefinition;

    /// Executes the tool with the given JSON arguments and context.
    fn execute<'a>(
        &'a self,
        input: Value,
        ctx: &'a Ctx,
    ) -> Pin<Box<dyn Future<Output = Result<ToolOutput, ToolError>> + Send + 'a>>;
}
