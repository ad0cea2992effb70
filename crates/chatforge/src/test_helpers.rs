//! Pre-built helpers for tests that use `chatforge` types.
//!
//! Available with the `test-utils` feature so downstream crates can reuse
//! them, and always compiled for this crate's own tests.

use std::collections::HashSet;

use futures::StreamExt;

use crate::chat::{StopReason, ToolCall};
use crate::error::LlmError;
use crate::mock::MockProvider;
use crate::provider::{Capability, ProviderMetadata};
use crate::stream::{ChatStream, StreamEvent};

/// Stream events for a text answer split into `chunks`.
pub fn text_stream(chunks: &[&str]) -> Vec<StreamEvent> {
    let mut events: Vec<_> = chunks
        .iter()
        .map(|c| StreamEvent::TextDelta((*c).to_string()))
        .collect();
    events.push(StreamEvent::Done {
        stop_reason: StopReason::EndTurn,
    });
    events
}

/// Stream events for a response that requests the given tool calls.
pub fn tool_call_stream(calls: Vec<ToolCall>) -> Vec<StreamEvent> {
    let mut events = Vec::with_capacity(calls.len() * 2 + 1);
    for (index, call) in (0u32..).zip(calls) {
        events.push(StreamEvent::ToolCallStart {
            index,
            id: call.id.clone(),
            name: call.name.clone(),
        });
        events.push(StreamEvent::ToolCallComplete { index, call });
    }
    events.push(StreamEvent::Done {
        stop_reason: StopReason::ToolUse,
    });
    events
}

/// Collect stream events, keeping errors.
pub async fn collect_stream_results(stream: ChatStream) -> Vec<Result<StreamEvent, LlmError>> {
    stream.collect::<Vec<_>>().await
}

/// Creates a [`MockProvider`] with the given name, model, and [`Capability::Tools`].
pub fn mock_for(provider_name: &str, model: &str) -> MockProvider {
    MockProvider::new(ProviderMetadata {
        name: provider_name.to_owned().into(),
        model: model.into(),
        context_window: 128_000,
        capabilities: HashSet::from([Capability::Tools]),
    })
}
