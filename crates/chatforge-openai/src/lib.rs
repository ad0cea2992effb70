//! `OpenAI` Chat Completions provider for `chatforge`.
//!
//! ```rust,no_run
//! use chatforge::{ChatMessage, ChatParams, Provider, StreamEvent};
//! use chatforge_openai::{OpenAiConfig, OpenAiProvider};
//! use futures::StreamExt;
//!
//! # async fn example() -> Result<(), chatforge::LlmError> {
//! let provider = OpenAiProvider::new(OpenAiConfig {
//!     api_key: "sk-...".into(),
//!     model: "gpt-4o-mini".into(),
//!     ..Default::default()
//! })?;
//!
//! let params = ChatParams {
//!     messages: vec![ChatMessage::user("Hi")],
//!     ..Default::default()
//! };
//! let mut stream = provider.stream(&params).await?;
//! while let Some(event) = stream.next().await {
//!     if let StreamEvent::TextDelta(t) = event? {
//!         print!("{t}");
//!     }
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod config;
mod convert;
mod provider;
mod stream;
mod types;

pub use config::OpenAiConfig;
pub use provider::OpenAiProvider;
