//! The `/chat-stream` controller.
//!
//! A request moves through validation, dispatch and streaming. Failures
//! before the body opens are JSON errors with a status code. Once the
//! body is open every outcome is in-band text, and the stream is closed
//! exactly once by the [`StreamSession`].

use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderValue, header};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use chatforge::tool::{LoopEvent, ToolLoopConfig, ToolRegistry, tool_loop_stream};
use chatforge::{ChatMessage, ChatParams, DynProvider, LlmError, StreamEvent, ToolChoice};
use futures::StreamExt;
use serde::Deserialize;
use tokio_stream::wrappers::ReceiverStream;
use tracing::Instrument;

use crate::action::{ActionSpec, build_registry};
use crate::error::ApiError;
use crate::model::{ModelClient, ProviderKind, ReasoningStrategy};
use crate::server::AppState;
use crate::session::{ChannelSink, StreamSession, TokenSink};
use crate::usage::spawn_increment;

/// System prompt used whenever tools are attached.
pub const SYSTEM_PREAMBLE: &str = "You are a helpful assistant. Answer naturally and use the available tools when they help you answer the user's question.";

/// Body of `POST /chat-stream`.
#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    /// `openai` or `google`.
    #[serde(default)]
    pub provider: Option<String>,
    /// The caller's provider key.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Model identifier.
    #[serde(default)]
    pub model: Option<String>,
    /// Bot whose usage counter is bumped.
    #[serde(default)]
    pub bot_id: Option<String>,
    /// Actions offered to the model as tools.
    #[serde(default)]
    pub actions: Option<Vec<ActionSpec>>,
    /// The user's message.
    #[serde(default)]
    pub prompt: Option<String>,
}

impl std::fmt::Debug for ChatRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatRequest")
            .field("provider", &self.provider)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("model", &self.model)
            .field("bot_id", &self.bot_id)
            .field("actions", &self.actions)
            .field("prompt_len", &self.prompt.as_ref().map(String::len))
            .finish()
    }
}

/// A request that passed validation.
#[derive(Debug)]
pub struct ValidChat {
    /// Selected provider.
    pub kind: ProviderKind,
    /// Provider key, trimmed.
    pub api_key: String,
    /// Model identifier, trimmed.
    pub model: String,
    /// The prompt as sent.
    pub prompt: String,
    /// Bot to count usage for.
    pub bot_id: Option<String>,
    /// Actions, possibly empty.
    pub actions: Vec<ActionSpec>,
}

fn required(value: Option<String>, field: &str) -> Result<String, ApiError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ApiError::Validation(format!("Missing required field: {field}")))
}

impl ChatRequest {
    /// Checks the provider first, then required fields, then action names.
    pub fn validate(self) -> Result<ValidChat, ApiError> {
        let provider = required(self.provider, "provider")?;
        let kind: ProviderKind = provider.trim().parse().map_err(ApiError::Validation)?;

        let api_key = required(self.api_key, "apiKey")?.trim().to_string();
        let model = required(self.model, "model")?.trim().to_string();
        let prompt = required(self.prompt, "prompt")?;

        let actions = self.actions.unwrap_or_default();
        for action in &actions {
            action.validate().map_err(ApiError::Validation)?;
        }

        Ok(ValidChat {
            kind,
            api_key,
            model,
            prompt,
            bot_id: self.bot_id.filter(|b| !b.trim().is_empty()),
            actions,
        })
    }
}

/// Tools and loop settings for a tool-using request.
pub struct ToolPlan {
    /// One tool per action.
    pub registry: Arc<ToolRegistry>,
    /// How tool calls are requested.
    pub strategy: ReasoningStrategy,
    /// Loop limits.
    pub config: ToolLoopConfig,
}

/// Everything the streaming task needs.
pub struct ChatPlan {
    /// The model backend.
    pub provider: Arc<dyn DynProvider>,
    /// The user's message.
    pub prompt: String,
    /// `None` streams a single completion.
    pub tools: Option<ToolPlan>,
}

/// `POST /chat-stream` and `POST /api/ask`.
pub async fn chat_stream(State(state): State<AppState>, body: Bytes) -> Result<Response, ApiError> {
    let request: ChatRequest = serde_json::from_slice(&body)
        .map_err(|e| ApiError::Validation(format!("Invalid request body: {e}")))?;
    let chat = request.validate()?;

    let span = tracing::info_span!(
        "chat",
        provider = %chat.kind,
        model = %chat.model,
        tools = chat.actions.len(),
    );
    let bot_id = chat.bot_id.clone();
    let plan = span.in_scope(|| dispatch(&state, chat))?;

    let (sink, rx) = ChannelSink::channel();
    tokio::spawn(run_chat(StreamSession::new(sink), plan).instrument(span));

    if let Some(bot_id) = bot_id {
        spawn_increment(Arc::clone(&state.usage), bot_id);
    }

    Ok(streaming_response(Body::from_stream(ReceiverStream::new(rx))))
}

/// Builds the tool registry and model client for a validated request.
pub fn dispatch(state: &AppState, chat: ValidChat) -> Result<ChatPlan, ApiError> {
    let client = ModelClient::new(chat.kind, &chat.api_key, &chat.model, &state.providers)
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    let tools = if chat.actions.is_empty() {
        None
    } else {
        Some(ToolPlan {
            registry: Arc::new(build_registry(chat.actions, &state.tool_client)),
            strategy: ReasoningStrategy::for_provider(chat.kind),
            config: state.loop_config.clone(),
        })
    };

    Ok(ChatPlan {
        provider: Arc::new(client),
        prompt: chat.prompt,
        tools,
    })
}

fn streaming_response(body: Body) -> Response {
    (
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain; charset=utf-8"),
            ),
            (header::CACHE_CONTROL, HeaderValue::from_static("no-cache")),
            (
                header::HeaderName::from_static("x-accel-buffering"),
                HeaderValue::from_static("no"),
            ),
        ],
        body,
    )
        .into_response()
}

/// Drives one request to completion and closes the session.
pub async fn run_chat<S: TokenSink>(mut session: StreamSession<S>, plan: ChatPlan) {
    let outcome = match plan.tools {
        None => stream_direct(&mut session, plan.provider.as_ref(), plan.prompt).await,
        Some(tools) => stream_with_tools(&mut session, plan.provider, plan.prompt, tools).await,
    };
    match outcome {
        Ok(()) => session.close(),
        Err(e) => {
            tracing::warn!(error = %e, "chat failed after the stream opened");
            session.fail(&e.to_string()).await;
        }
    }
}

async fn stream_direct<S: TokenSink>(
    session: &mut StreamSession<S>,
    provider: &dyn DynProvider,
    prompt: String,
) -> Result<(), LlmError> {
    let params = ChatParams {
        messages: vec![ChatMessage::user(prompt)],
        ..Default::default()
    };
    let mut stream = provider.stream_boxed(&params).await?;
    while let Some(event) = stream.next().await {
        if let StreamEvent::TextDelta(text) = event? {
            if !session.emit(&text).await {
                return Ok(());
            }
        }
    }
    Ok(())
}

async fn stream_with_tools<S: TokenSink>(
    session: &mut StreamSession<S>,
    provider: Arc<dyn DynProvider>,
    prompt: String,
    tools: ToolPlan,
) -> Result<(), LlmError> {
    let ToolPlan {
        registry,
        strategy,
        config,
    } = tools;
    let params = ChatParams {
        messages: vec![ChatMessage::user(prompt)],
        system: Some(format!("{SYSTEM_PREAMBLE} {}", strategy.preamble_suffix())),
        tools: Some(registry.definitions()),
        tool_choice: Some(ToolChoice::Auto),
        ..Default::default()
    };

    let mut events = tool_loop_stream(provider, registry, params, config, Arc::new(()));
    while let Some(event) = events.next().await {
        match event? {
            LoopEvent::TextDelta(text) => {
                if !session.emit(&text).await {
                    return Ok(());
                }
            }
            LoopEvent::ToolExecutionEnd {
                tool_name,
                result,
                duration,
                ..
            } => {
                tracing::debug!(
                    tool = %tool_name,
                    is_error = result.is_error,
                    ?duration,
                    "tool finished"
                );
            }
            LoopEvent::Done(result) => {
                tracing::info!(
                    iterations = result.iterations,
                    termination = ?result.termination_reason,
                    input_tokens = result.total_usage.input_tokens,
                    output_tokens = result.total_usage.output_tokens,
                    "tool loop finished"
                );
                break;
            }
            _ => {}
        }
    }

    session.warn_if_silent().await;
    Ok(())
}
