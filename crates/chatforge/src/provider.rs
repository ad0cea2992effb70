//! Provider trait and request types.
//!
//! - **[`Provider`]** is the trait every backend implements. It uses
//!   native async-fn-in-traits, so implementations are plain `async fn`s.
//! - **[`DynProvider`]** is the object-safe mirror with boxed futures. A
//!   blanket `impl<T: Provider> DynProvider for T` bridges the two, so a
//!   concrete provider can be stored as `Arc<dyn DynProvider>` (which is
//!   what the tool loop takes).
//!
//! All request configuration lives in [`ChatParams`]. The transport-only
//! fields [`timeout`](ChatParams::timeout) and
//! [`extra_headers`](ChatParams::extra_headers) are skipped during
//! serialization.

use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::chat::ChatMessage;
use crate::error::LlmError;
use crate::stream::ChatStream;

/// The core trait every model backend implements.
///
/// `Provider` is **not** object-safe because its methods return
/// `impl Future`. Use [`DynProvider`] for dynamic dispatch.
pub trait Provider: Send + Sync {
    /// Sends a chat request and returns a stream of events.
    ///
    /// Events are yielded as soon as they are parsed from the wire.
    fn stream(
        &self,
        params: &ChatParams,
    ) -> impl Future<Output = Result<ChatStream, LlmError>> + Send;

    /// Returns static metadata describing this provider instance.
    fn metadata(&self) -> ProviderMetadata;
}

/// Object-safe counterpart of [`Provider`].
pub trait DynProvider: Send + Sync {
    /// Boxed-future version of [`Provider::stream`].
    fn stream_boxed<'a>(
        &'a self,
        params: &'a ChatParams,
    ) -> Pin<Box<dyn Future<Output = Result<ChatStream, LlmError>> + Send + 'a>>;

    /// Returns static metadata describing this provider instance.
    fn metadata(&self) -> ProviderMetadata;
}

impl<T: Provider> DynProvider for T {
    fn stream_boxed<'a>(
        &'a self,
        params: &'a ChatParams,
    ) -> Pin<Box<dyn Future<Output = Result<ChatStream, LlmError>> + Send + 'a>> {
        Box::pin(self.stream(params))
    }

    fn metadata(&self) -> ProviderMetadata {
        Provider::metadata(self)
    }
}

/// Describes a provider instance: its name, model, and capabilities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderMetadata {
    /// Provider name (`"openai"`, `"google"`).
    pub name: Cow<'static, str>,
    /// The model identifier.
    pub model: String,
    /// Maximum context window size in tokens.
    pub context_window: u64,
    /// Features this provider supports.
    pub capabilities: HashSet<Capability>,
}

/// A feature that a provider may or may not support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum Capability {
    /// Function/tool calling.
    Tools,
    /// Extended chain-of-thought reasoning.
    Reasoning,
}

/// Parameters for a chat request.
///
/// ```rust
/// use chatforge::{ChatMessage, ChatParams};
///
/// let params = ChatParams {
///     messages: vec![ChatMessage::user("Hello")],
///     temperature: Some(0.7),
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChatParams {
    /// The conversation history.
    pub messages: Vec<ChatMessage>,
    /// Tool definitions the model may invoke.
    pub tools: Option<Vec<ToolDefinition>>,
    /// Controls whether and how the model uses tools.
    pub tool_choice: Option<ToolChoice>,
    /// Sampling temperature.
    pub temperature: Option<f32>,
    /// Upper bound on generated tokens.
    pub max_tokens: Option<u32>,
    /// System prompt, for providers that accept it separately from the
    /// message list.
    pub system: Option<String>,
    /// Per-request timeout. Skipped during serialization.
    #[serde(skip)]
    pub timeout: Option<Duration>,
    /// Extra HTTP headers to send with this request. Skipped during
    /// serialization.
    #[serde(skip)]
    pub extra_headers: Option<http::HeaderMap>,
    /// Arbitrary key-value pairs forwarded to the provider.
    pub metadata: HashMap<String, Value>,
}

/// Controls whether the model should use tools and, if so, which ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ToolChoice {
    /// The model decides whether to call a tool.
    Auto,
    /// The model must not call any tools.
    None,
    /// The model must call at least one tool.
    Required,
    /// The model must call this specific tool.
    Specific(String),
}

/// A tool the model can invoke during generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool's name, matched against [`ToolCall::name`](crate::ToolCall::name).
    pub name: String,
    /// Shown to the model so it knows when to use the tool.
    pub description: String,
    /// JSON Schema describing the tool's input.
    pub parameters: JsonSchema,
}

/// A JSON Schema document used for tool parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonSchema(Value);

impl JsonSchema {
    /// Creates a schema from a raw JSON value.
    pub fn new(schema: Value) -> Self {
        Self(schema)
    }

    /// Returns a reference to the underlying JSON value.
    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_params_defaults() {
        let p = ChatParams::default();
        assert!(p.messages.is_empty());
        assert!(p.tools.is_none());
        assert!(p.tool_choice.is_none());
        assert!(p.temperature.is_none());
        assert!(p.system.is_none());
        assert!(p.timeout.is_none());
        assert!(p.metadata.is_empty());
    }

    #[test]
    fn test_chat_params_serde_skips_transport_fields() {
        let p = ChatParams {
            messages: vec![ChatMessage::user("hi")],
            temperature: Some(0.7),
            timeout: Some(Duration::from_secs(30)),
            extra_headers: Some(http::HeaderMap::new()),
            ..Default::default()
        };
        let json = serde_json::to_string(&p).unwrap();
        let back: ChatParams = serde_json::from_str(&json).unwrap();
        assert_eq!(back.timeout, None);
        assert_eq!(back.extra_headers, None);
        assert_eq!(back.messages.len(), 1);
        assert_eq!(back.temperature, Some(0.7));
    }

    #[test]
    fn test_tool_definition_keeps_schema() {
        let td = ToolDefinition {
            name: "search".into(),
            description: "Search the web".into(),
            parameters: JsonSchema::new(serde_json::json!({"type": "object"})),
        };
        assert_eq!(td.parameters.as_value()["type"], "object");
    }

    #[test]
    fn test_provider_metadata_owned_name() {
        let m = ProviderMetadata {
            name: Cow::Owned(String::from("custom")),
            model: "m".into(),
            context_window: 4096,
            capabilities: HashSet::from([Capability::Tools]),
        };
        assert_eq!(m.name, "custom");
        assert!(m.capabilities.contains(&Capability::Tools));
    }

    #[test]
    fn test_tool_choice_specific() {
        let tc = ToolChoice::Specific("search".into());
        assert_eq!(tc, tc.clone());
        assert_ne!(tc, ToolChoice::Auto);
    }
}
