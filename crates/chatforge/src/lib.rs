//! # chatforge
//!
//! Provider-agnostic vocabulary for the chatforge orchestrator: messages,
//! streaming events, the [`Provider`] trait, errors, and the tool loop.
//! Concrete backends live in sibling crates and implement [`Provider`].
//!
//! ```text
//!  ┌──────────────────┐   ┌──────────────────┐
//!  │ chatforge-openai │   │ chatforge-google │
//!  └────────┬─────────┘   └────────┬─────────┘
//!           └───────────┬──────────┘
//!                       ▼
//!        ┌──────────────────────────────┐
//!        │          chatforge           │
//!        │ (Provider, ChatParams, tool) │
//!        └──────────────────────────────┘
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! use chatforge::{ChatMessage, ChatParams, Provider, StreamEvent};
//! use futures::StreamExt;
//!
//! # async fn example(provider: impl Provider) -> Result<(), chatforge::LlmError> {
//! let params = ChatParams {
//!     messages: vec![ChatMessage::user("Explain ownership in Rust")],
//!     ..Default::default()
//! };
//!
//! let mut stream = provider.stream(&params).await?;
//! while let Some(event) = stream.next().await {
//!     if let StreamEvent::TextDelta(text) = event? {
//!         print!("{text}");
//!     }
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod chat;
pub mod error;
pub mod provider;
pub mod sse;
pub mod stream;
pub mod tool;
pub mod usage;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_helpers;

pub use chat::{ChatMessage, ChatResponse, ChatRole, ContentBlock, StopReason, ToolCall, ToolResult};
pub use error::LlmError;
pub use provider::{
    Capability, ChatParams, DynProvider, JsonSchema, Provider, ProviderMetadata, ToolChoice,
    ToolDefinition,
};
pub use stream::{ChatStream, StreamEvent, collect_stream};
pub use tool::{ToolHandler, ToolLoopConfig, ToolRegistry};
pub use usage::Usage;
