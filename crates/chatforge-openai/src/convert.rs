//! Conversion between `chatforge` types and `OpenAI` wire types.

use chatforge::chat::{ChatMessage, ChatRole, ContentBlock, StopReason};
use chatforge::error::LlmError;
use chatforge::provider::{ChatParams, ToolChoice};
use chatforge::usage::Usage;
use serde_json::Value;

use crate::config::OpenAiConfig;
use crate::types::{
    ErrorResponse, FunctionCallRequest, FunctionDef, Message, Request, ResponseUsage,
    StreamOptions, Tool, ToolCallRequest,
};

// ── Request ──────────────────────────────────────────────────────────

/// Builds a streaming Chat Completions request. `params.system` is sent
/// as a leading system message.
pub(crate) fn build_request<'a>(params: &'a ChatParams, config: &'a OpenAiConfig) -> Request<'a> {
    let mut messages = Vec::with_capacity(params.messages.len() + 1);
    if let Some(system) = &params.system {
        messages.push(Message {
            role: "system",
            content: Some(system.clone()),
            tool_calls: None,
            tool_call_id: None,
        });
    }
    messages.extend(params.messages.iter().flat_map(convert_message));

    let tools = params.tools.as_ref().filter(|t| !t.is_empty()).map(|tools| {
        tools
            .iter()
            .map(|t| Tool {
                tool_type: "function",
                function: FunctionDef {
                    name: &t.name,
                    description: &t.description,
                    parameters: t.parameters.as_value(),
                },
            })
            .collect()
    });
    let tool_choice = if tools.is_some() {
        params.tool_choice.as_ref().map(convert_tool_choice)
    } else {
        None
    };

    Request {
        model: &config.model,
        messages,
        temperature: params.temperature.or(config.temperature),
        max_completion_tokens: params.max_tokens,
        stream: true,
        stream_options: StreamOptions {
            include_usage: true,
        },
        tools,
        tool_choice,
    }
}

/// One core message may expand to several wire messages: every tool
/// result becomes its own `tool` message.
fn convert_message(msg: &ChatMessage) -> Vec<Message> {
    match msg.role {
        ChatRole::System => vec![plain("system", msg.text())],
        ChatRole::Assistant => {
            let text = msg.text();
            let tool_calls: Vec<_> = msg
                .content
                .iter()
                .filter_map(|b| match b {
                    ContentBlock::ToolCall(call) => Some(ToolCallRequest {
                        id: call.id.clone(),
                        call_type: "function",
                        function: FunctionCallRequest {
                            name: call.name.clone(),
                            arguments: call.arguments.to_string(),
                        },
                    }),
                    _ => None,
                })
                .collect();
            vec![Message {
                role: "assistant",
                content: (!text.is_empty()).then_some(text),
                tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
                tool_call_id: None,
            }]
        }
        ChatRole::Tool => msg
            .content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::ToolResult(r) => Some(Message {
                    role: "tool",
                    content: Some(r.content.clone()),
                    tool_calls: None,
                    tool_call_id: Some(r.tool_call_id.clone()),
                }),
                _ => None,
            })
            .collect(),
        _ => vec![plain("user", msg.text())],
    }
}

fn plain(role: &'static str, text: String) -> Message {
    Message {
        role,
        content: Some(text),
        tool_calls: None,
        tool_call_id: None,
    }
}

fn convert_tool_choice(choice: &ToolChoice) -> Value {
    match choice {
        ToolChoice::None => Value::String("none".into()),
        ToolChoice::Required => Value::String("required".into()),
        ToolChoice::Specific(name) => serde_json::json!({
            "type": "function",
            "function": { "name": name }
        }),
        _ => Value::String("auto".into()),
    }
}

// ── Stream payloads ──────────────────────────────────────────────────

/// Parses the JSON argument text of a tool call. Malformed JSON is kept
/// as a string so the tool still sees what the model produced.
pub(crate) fn parse_arguments(raw: &str) -> Value {
    if raw.trim().is_empty() {
        return Value::Object(serde_json::Map::new());
    }
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

pub(crate) fn convert_usage(usage: &ResponseUsage) -> Usage {
    Usage {
        input_tokens: usage.prompt_tokens,
        output_tokens: usage.completion_tokens,
        reasoning_tokens: usage
            .completion_tokens_details
            .as_ref()
            .and_then(|d| d.reasoning_tokens),
        cache_read_tokens: usage
            .prompt_tokens_details
            .as_ref()
            .and_then(|d| d.cached_tokens),
    }
}

/// Maps `finish_reason` strings to [`StopReason`].
pub(crate) fn convert_stop_reason(reason: &str) -> StopReason {
    match reason {
        "stop" => StopReason::EndTurn,
        "tool_calls" | "function_call" => StopReason::ToolUse,
        "length" => StopReason::MaxTokens,
        other => {
            tracing::warn!(finish_reason = other, "unexpected OpenAI finish_reason");
            StopReason::EndTurn
        }
    }
}

// ── Errors ───────────────────────────────────────────────────────────

/// Converts an HTTP status plus error body into an [`LlmError`].
pub(crate) fn convert_error(status: http::StatusCode, body: &str) -> LlmError {
    let message = serde_json::from_str::<ErrorResponse>(body)
        .map_or_else(|_| body.to_string(), |e| e.error.message);

    if status == http::StatusCode::UNAUTHORIZED || status == http::StatusCode::FORBIDDEN {
        return LlmError::Auth(message);
    }
    if status == http::StatusCode::BAD_REQUEST {
        return LlmError::InvalidRequest(message);
    }

    LlmError::Http {
        status: Some(status),
        message,
        retryable: matches!(status.as_u16(), 429 | 500 | 502 | 503),
    }
}
