//! # chatforge-server
//!
//! HTTP front end of the chatforge orchestrator. `POST /chat-stream`
//! takes a prompt, a provider key and a list of HTTP actions, runs the
//! model (with the actions as tools when there are any) and streams the
//! generated text back as a plain-text body.
//!
//! ```text
//!  request ─► validate ─► dispatch ─► StreamSession ─► text/plain body
//!                            │
//!              ModelClient ──┤── ToolRegistry<HttpActionTool>
//!                            │
//!                    usage counter (detached)
//! ```

#![warn(missing_docs)]

pub mod action;
pub mod chat;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod server;
pub mod session;
pub mod usage;

pub use action::{ActionSpec, HttpActionTool};
pub use chat::{ChatRequest, SYSTEM_PREAMBLE};
pub use config::ServerConfig;
pub use error::{ApiError, ConfigError};
pub use model::{ModelClient, ProviderKind, ProviderSettings, ReasoningStrategy};
pub use server::{AppState, build_router, run};
pub use session::{StreamSession, TokenSink};
pub use usage::{HttpUsageCounter, NoopUsageCounter, UsageCounter};
