//! Tool execution engine.
//!
//! ```text
//!   ToolHandler        : one tool (definition + execute)
//!       │
//!   ToolRegistry       : handlers by name, dispatch, last-wins registration
//!       │
//!   tool_loop_stream() : stream → execute → feed back, until the model answers,
//!                        yielding text deltas and lifecycle events as it goes
//! ```
//!
//! Tool failures never abort a loop: a handler error or an unknown tool
//! name becomes a [`ToolResult`](crate::ToolResult) with `is_error` set,
//! which the model sees as an observation and can recover from.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use chatforge::tool::{LoopEvent, ToolLoopConfig, ToolRegistry, tool_loop_stream};
//! use chatforge::{ChatMessage, ChatParams, DynProvider};
//! use futures::StreamExt;
//!
//! # async fn example(provider: Arc<dyn DynProvider>, registry: ToolRegistry) -> Result<(), chatforge::LlmError> {
//! let params = ChatParams {
//!     messages: vec![ChatMessage::user("Shout 'hello'")],
//!     tools: Some(registry.definitions()),
//!     ..Default::default()
//! };
//!
//! let mut events = tool_loop_stream(
//!     provider,
//!     Arc::new(registry),
//!     params,
//!     ToolLoopConfig::default(),
//!     Arc::new(()),
//! );
//! while let Some(event) = events.next().await {
//!     if let LoopEvent::TextDelta(text) = event? {
//!         print!("{text}");
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod execution;
mod handler;
mod loop_core;
mod loop_stream;
mod output;
mod registry;

pub use config::{LoopEvent, LoopStream, TerminationReason, ToolLoopConfig, ToolLoopResult};
pub use error::ToolError;
pub use handler::ToolHandler;
pub use loop_stream::tool_loop_stream;
pub use output::ToolOutput;
pub use registry::ToolRegistry;
