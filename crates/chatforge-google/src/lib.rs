//! Google Gemini provider for `chatforge`.
//!
//! Uses the `streamGenerateContent?alt=sse` endpoint with function
//! declarations for tool calling.

#![warn(missing_docs)]

mod config;
mod convert;
mod provider;
mod stream;
mod types;

pub use config::GoogleConfig;
pub use provider::GoogleProvider;
