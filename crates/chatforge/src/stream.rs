//! Streaming response types.
//!
//! A streaming provider yields [`StreamEvent`]s through a [`ChatStream`]:
//! text deltas as they are generated, tool-call fragments, usage, and a
//! final [`Done`](StreamEvent::Done).
//!
//! Tool calls arrive in three phases: [`ToolCallStart`](StreamEvent::ToolCallStart)
//! announces `id` and `name`, zero or more [`ToolCallDelta`](StreamEvent::ToolCallDelta)s
//! carry argument fragments, and [`ToolCallComplete`](StreamEvent::ToolCallComplete)
//! delivers the assembled [`ToolCall`]. Providers that send whole calls
//! at once (Gemini) emit start and complete back to back.

use std::collections::HashMap;
use std::pin::Pin;

use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};

use crate::chat::{ChatResponse, ContentBlock, StopReason, ToolCall};
use crate::error::LlmError;
use crate::usage::Usage;

/// A pinned, boxed, `Send` stream of [`StreamEvent`] results.
pub type ChatStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, LlmError>> + Send>>;

/// An incremental event emitted during a streaming response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum StreamEvent {
    /// A fragment of the model's text output.
    TextDelta(String),
    /// A fragment of the model's reasoning output.
    ReasoningDelta(String),
    /// A new tool call has started.
    ToolCallStart {
        /// Zero-based index of the call within this response.
        index: u32,
        /// Provider-assigned identifier.
        id: String,
        /// The name of the tool being called.
        name: String,
    },
    /// A JSON fragment of a tool call's arguments.
    ToolCallDelta {
        /// The tool-call index this delta belongs to.
        index: u32,
        /// A chunk of the JSON arguments string.
        json_chunk: String,
    },
    /// The fully assembled tool call.
    ToolCallComplete {
        /// The tool-call index this completion corresponds to.
        index: u32,
        /// The parsed call.
        call: ToolCall,
    },
    /// Token usage for the request so far.
    Usage(Usage),
    /// The stream has ended.
    Done {
        /// Why the model stopped generating.
        stop_reason: StopReason,
    },
}

/// Folds stream events into a [`ChatResponse`].
#[derive(Debug, Default)]
pub(crate) struct ResponseAccumulator {
    text: String,
    tool_calls: Vec<ToolCall>,
    usage: Usage,
    stop_reason: Option<StopReason>,
}

impl ResponseAccumulator {
    pub(crate) fn apply(&mut self, event: &StreamEvent) {
        match event {
            StreamEvent::TextDelta(t) => self.text.push_str(t),
            StreamEvent::ToolCallComplete { call, .. } => self.tool_calls.push(call.clone()),
            StreamEvent::Usage(u) => self.usage += u,
            StreamEvent::Done { stop_reason } => self.stop_reason = Some(*stop_reason),
            _ => {}
        }
    }

    pub(crate) fn into_response(self) -> ChatResponse {
        let mut content = Vec::with_capacity(1 + self.tool_calls.len());
        if !self.text.is_empty() {
            content.push(ContentBlock::Text(self.text));
        }
        let has_calls = !self.tool_calls.is_empty();
        content.extend(self.tool_calls.into_iter().map(ContentBlock::ToolCall));

        // Some backends report `stop` even when they returned calls.
        let stop_reason = match self.stop_reason {
            Some(StopReason::EndTurn) | None if has_calls => StopReason::ToolUse,
            Some(reason) => reason,
            None => StopReason::EndTurn,
        };

        ChatResponse {
            content,
            usage: self.usage,
            stop_reason,
            model: String::new(),
            metadata: HashMap::new(),
        }
    }
}

/// Drains a [`ChatStream`] into a single [`ChatResponse`].
///
/// Stops at the first error.
pub async fn collect_stream(mut stream: ChatStream) -> Result<ChatResponse, LlmError> {
    let mut acc = ResponseAccumulator::default();
    while let Some(event) = stream.next().await {
        acc.apply(&event?);
    }
    Ok(acc.into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weather_call() -> ToolCall {
        ToolCall {
            id: "tc_1".into(),
            name: "weather".into(),
            arguments: serde_json::json!({"input": "Paris"}),
        }
    }

    #[tokio::test]
    async fn test_collect_stream_text() {
        let events = vec![
            Ok(StreamEvent::TextDelta("hello ".into())),
            Ok(StreamEvent::TextDelta("world".into())),
            Ok(StreamEvent::Usage(Usage {
                input_tokens: 3,
                output_tokens: 2,
                ..Usage::default()
            })),
            Ok(StreamEvent::Done {
                stop_reason: StopReason::EndTurn,
            }),
        ];
        let stream: ChatStream = Box::pin(futures::stream::iter(events));
        let resp = collect_stream(stream).await.unwrap();
        assert_eq!(resp.text(), Some("hello world"));
        assert_eq!(resp.usage.output_tokens, 2);
        assert_eq!(resp.stop_reason, StopReason::EndTurn);
    }

    #[tokio::test]
    async fn test_collect_stream_tool_calls_force_tool_use() {
        let events = vec![
            Ok(StreamEvent::ToolCallStart {
                index: 0,
                id: "tc_1".into(),
                name: "weather".into(),
            }),
            Ok(StreamEvent::ToolCallComplete {
                index: 0,
                call: weather_call(),
            }),
            Ok(StreamEvent::Done {
                stop_reason: StopReason::EndTurn,
            }),
        ];
        let stream: ChatStream = Box::pin(futures::stream::iter(events));
        let resp = collect_stream(stream).await.unwrap();
        assert_eq!(resp.stop_reason, StopReason::ToolUse);
        assert_eq!(resp.tool_calls()[0].name, "weather");
    }

    #[tokio::test]
    async fn test_collect_stream_error_mid_stream() {
        let events = vec![
            Ok(StreamEvent::TextDelta("partial".into())),
            Err(LlmError::Http {
                status: Some(http::StatusCode::BAD_GATEWAY),
                message: "upstream".into(),
                retryable: true,
            }),
        ];
        let stream: ChatStream = Box::pin(futures::stream::iter(events));
        let err = collect_stream(stream).await.unwrap_err();
        assert!(matches!(err, LlmError::Http { .. }));
    }

    #[tokio::test]
    async fn test_collect_stream_empty() {
        let stream: ChatStream = Box::pin(futures::stream::empty());
        let resp = collect_stream(stream).await.unwrap();
        assert!(resp.content.is_empty());
        assert_eq!(resp.stop_reason, StopReason::EndTurn);
    }

    #[test]
    fn test_max_tokens_with_calls_is_kept() {
        let mut acc = ResponseAccumulator::default();
        acc.apply(&StreamEvent::ToolCallComplete {
            index: 0,
            call: weather_call(),
        });
        acc.apply(&StreamEvent::Done {
            stop_reason: StopReason::MaxTokens,
        });
        assert_eq!(acc.into_response().stop_reason, StopReason::MaxTokens);
    }

    #[test]
    fn test_chat_stream_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<ChatStream>();
    }
}
