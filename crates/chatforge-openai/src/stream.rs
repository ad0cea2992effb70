//! SSE stream parser for the `OpenAI` Chat Completions API.
//!
//! Converts a `reqwest::Response` byte stream into a `ChatStream`.
//! Tool-call arguments arrive as fragments spread over many chunks and
//! are accumulated per call index until the model finishes.

use std::collections::HashMap;

use bytes::Bytes;
use chatforge::chat::{StopReason, ToolCall};
use chatforge::error::LlmError;
use chatforge::sse::SseDecoder;
use chatforge::stream::{ChatStream, StreamEvent};
use futures::stream::StreamExt;

use crate::convert::{convert_stop_reason, convert_usage, parse_arguments};
use crate::types::StreamChunk;

#[derive(Debug)]
struct ToolCallState {
    id: String,
    name: String,
    arguments_buffer: String,
}

#[derive(Debug, Default)]
struct ParserState {
    decoder: SseDecoder,
    tool_states: HashMap<u32, ToolCallState>,
}

/// Converts a streaming response into a `ChatStream`.
pub(crate) fn into_stream(response: reqwest::Response) -> ChatStream {
    let stream = response
        .bytes_stream()
        .scan(ParserState::default(), |state, chunk| {
            let items = process_chunk(state, chunk);
            async move { Some(items) }
        })
        .flat_map(futures::stream::iter);

    Box::pin(stream)
}

fn process_chunk(
    state: &mut ParserState,
    chunk: Result<Bytes, reqwest::Error>,
) -> Vec<Result<StreamEvent, LlmError>> {
    let bytes = match chunk {
        Ok(bytes) => bytes,
        Err(e) => {
            return vec![Err(LlmError::Http {
                status: None,
                message: format!("Stream read error: {e}"),
                retryable: true,
            })];
        }
    };

    let payloads = match state.decoder.push(&bytes) {
        Ok(p) => p,
        Err(e) => return vec![Err(e)],
    };

    let mut results = Vec::new();
    for data in payloads {
        match parse_payload(&data, &mut state.tool_states) {
            Ok(events) => results.extend(events.into_iter().map(Ok)),
            Err(e) => {
                results.push(Err(e));
                break;
            }
        }
    }
    results
}

/// Parses one `data:` payload into zero or more events.
fn parse_payload(
    data: &str,
    tool_states: &mut HashMap<u32, ToolCallState>,
) -> Result<Vec<StreamEvent>, LlmError> {
    if data == "[DONE]" {
        return Ok(flush_pending_tools(tool_states));
    }

    let Ok(chunk) = serde_json::from_str::<StreamChunk>(data) else {
        tracing::debug!(payload_len = data.len(), "skipping unparseable SSE payload");
        return Ok(vec![]);
    };

    if let Some(error) = chunk.error {
        return Err(LlmError::Provider {
            code: "stream_error".into(),
            message: error.message,
            retryable: false,
        });
    }

    let mut events = Vec::new();

    if let Some(choice) = chunk.choices.first() {
        if let Some(text) = choice.delta.content.as_ref().filter(|t| !t.is_empty()) {
            events.push(StreamEvent::TextDelta(text.clone()));
        }

        for tc in choice.delta.tool_calls.iter().flatten() {
            let index = tc.index;

            if let Some(id) = &tc.id {
                let name = tc
                    .function
                    .as_ref()
                    .and_then(|f| f.name.clone())
                    .unwrap_or_default();
                tool_states.insert(
                    index,
                    ToolCallState {
                        id: id.clone(),
                        name: name.clone(),
                        arguments_buffer: String::new(),
                    },
                );
                events.push(StreamEvent::ToolCallStart {
                    index,
                    id: id.clone(),
                    name,
                });
            }

            if let Some(args) = tc
                .function
                .as_ref()
                .and_then(|f| f.arguments.as_ref())
                .filter(|a| !a.is_empty())
            {
                if let Some(state) = tool_states.get_mut(&index) {
                    state.arguments_buffer.push_str(args);
                }
                events.push(StreamEvent::ToolCallDelta {
                    index,
                    json_chunk: args.clone(),
                });
            }
        }

        if let Some(reason) = &choice.finish_reason {
            let stop_reason = convert_stop_reason(reason);
            if stop_reason == StopReason::ToolUse {
                events.extend(flush_pending_tools(tool_states));
            }
            events.push(StreamEvent::Done { stop_reason });
        }
    }

    if let Some(usage) = &chunk.usage {
        events.push(StreamEvent::Usage(convert_usage(usage)));
    }

    Ok(events)
}

/// Emits a `ToolCallComplete` for every call still being assembled.
fn flush_pending_tools(tool_states: &mut HashMap<u32, ToolCallState>) -> Vec<StreamEvent> {
    let mut indices: Vec<u32> = tool_states.keys().copied().collect();
    indices.sort_unstable();

    indices
        .into_iter()
        .filter_map(|index| {
            tool_states.remove(&index).map(|state| StreamEvent::ToolCallComplete {
                index,
                call: ToolCall {
                    id: state.id,
                    name: state.name,
                    arguments: parse_arguments(&state.arguments_buffer),
                },
            })
        })
        .collect()
}
